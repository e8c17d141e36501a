use actor_framework::{KeyedClient, KeyedResource};
use async_trait::async_trait;

/// Trait for resource-specific clients to inherit the plumbing of a [`KeyedClient`].
///
/// Typed clients only implement [`inner`](ActorClient::inner) and build their
/// domain methods on top of [`dispatch`](ActorClient::dispatch).
#[async_trait]
pub trait ActorClient<T: KeyedResource>: Send + Sync {
    /// Access the inner generic KeyedClient.
    fn inner(&self) -> &KeyedClient<T>;

    /// Send one command to the worker for `id`.
    #[tracing::instrument(skip(self, command))]
    async fn dispatch(&self, id: T::Id, command: T::Command) -> Result<T::Reply, T::Error> {
        tracing::debug!(?command, "Sending request");
        self.inner().send(id, command).await
    }

    /// Returns `true` once the actor stopped accepting commands.
    fn is_closed(&self) -> bool {
        self.inner().is_closed()
    }

    fn active_workers(&self) -> usize {
        self.inner().active_workers()
    }
}
