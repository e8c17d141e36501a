//! # Keyed Actor Server
//!
//! This module defines the `KeyedActor`, the server half of the framework. A single
//! router task receives every [`Envelope`] and forwards it to a worker task dedicated to
//! the envelope's key. Workers are spawned lazily on the first command for a key and
//! reaped after they sit idle, so the number of live tasks tracks the number of keys
//! with recent traffic rather than the number of keys ever seen.
//!
//! ```text
//! KeyedClient ──► router (bounded mpsc) ──► worker[delivery_1] ──► KeyedResource::handle
//!                                       ├─► worker[delivery_2]
//!                                       └─► worker[delivery_3]
//! ```
//!
//! **Concurrency Model**:
//! Each worker processes its own queue *sequentially*, which gives a per-key
//! single-writer scope without a lock. Workers for different keys run in parallel.

use crate::client::KeyedClient;
use crate::message::{Envelope, IdleNotice};
use crate::resource::KeyedResource;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// How long a worker waits without a command before offering itself for reaping.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Router-side handle on one worker.
struct Mailbox<T: KeyedResource> {
    sender: mpsc::UnboundedSender<Envelope<T>>,
    /// Commands dispatched to the worker and not yet answered.
    in_flight: Arc<AtomicUsize>,
    generation: u64,
}

/// The generic keyed actor.
///
/// # Usage Pattern
///
/// 1.  **Create**: Call `KeyedActor::new()` to get the `actor` (router) and `client`.
/// 2.  **Wire**: Build the resource `Context` (stores, publishers, other clients).
/// 3.  **Run**: Spawn `actor.run(context)` in a background task.
///
/// ```rust
/// use actor_framework::{FrameworkError, KeyedActor, KeyedResource};
/// use async_trait::async_trait;
///
/// struct Echo;
/// #[derive(Debug, thiserror::Error)]
/// #[error("echo failed")]
/// struct EchoError;
/// impl From<FrameworkError> for EchoError {
///     fn from(_: FrameworkError) -> Self { EchoError }
/// }
///
/// #[async_trait]
/// impl KeyedResource for Echo {
///     type Id = u32;
///     type Command = String;
///     type Reply = String;
///     type Context = ();
///     type Error = EchoError;
///
///     async fn handle(id: &u32, command: String, _: &()) -> Result<String, EchoError> {
///         Ok(format!("{id}:{command}"))
///     }
/// }
///
/// #[tokio::main]
/// async fn main() {
///     let (actor, client) = KeyedActor::<Echo>::new(16);
///     tokio::spawn(actor.run(()));
///     let reply = client.send(7, "ping".to_string()).await.unwrap();
///     assert_eq!(reply, "7:ping");
/// }
/// ```
///
/// # Shutdown
///
/// When every `KeyedClient` clone is dropped the router's channel closes. The router
/// then drops all mailboxes, each worker drains the commands already queued for it,
/// and `run` returns once every worker has exited.
pub struct KeyedActor<T: KeyedResource> {
    receiver: mpsc::Receiver<Envelope<T>>,
    idle_timeout: Duration,
    active: Arc<AtomicUsize>,
}

impl<T: KeyedResource> KeyedActor<T> {
    /// Creates a new `KeyedActor` and its associated `KeyedClient`.
    ///
    /// # Arguments
    ///
    /// * `buffer_size` - Capacity of the router channel. When it is full, `send` on the
    ///   client waits, which is the only backpressure point in the framework.
    pub fn new(buffer_size: usize) -> (Self, KeyedClient<T>) {
        Self::with_idle_timeout(buffer_size, DEFAULT_IDLE_TIMEOUT)
    }

    /// Same as [`KeyedActor::new`] with an explicit worker idle timeout.
    pub fn with_idle_timeout(buffer_size: usize, idle_timeout: Duration) -> (Self, KeyedClient<T>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let active = Arc::new(AtomicUsize::new(0));
        let actor = Self {
            receiver,
            idle_timeout,
            active: active.clone(),
        };
        (actor, KeyedClient::with_gauge(sender, active))
    }

    /// Runs the router loop until every client is dropped.
    ///
    /// # Context Injection
    /// `context` is moved into an `Arc` and shared with every worker, so dependencies
    /// built *after* `new()` can still reach the resource.
    pub async fn run(self, context: T::Context) {
        let resource_type = std::any::type_name::<T>()
            .split("::")
            .last()
            .unwrap_or("Unknown");
        info!(resource_type, "Actor started");

        let Self {
            mut receiver,
            idle_timeout,
            active,
        } = self;
        let (idle_tx, mut idle_rx) = mpsc::unbounded_channel();
        let mut router = Router::<T> {
            resource_type,
            context: Arc::new(context),
            mailboxes: HashMap::new(),
            workers: JoinSet::new(),
            idle_tx,
            idle_timeout,
            next_generation: 0,
            active,
        };

        loop {
            tokio::select! {
                msg = receiver.recv() => match msg {
                    Some(envelope) => router.dispatch(envelope),
                    None => break,
                },
                Some(notice) = idle_rx.recv() => router.reap(notice),
                Some(joined) = router.workers.join_next(), if !router.workers.is_empty() => {
                    if let Err(e) = joined {
                        error!(resource_type, error = %e, "Worker task failed");
                    }
                }
            }
        }

        router.shutdown().await;
    }
}

/// State owned by the router task.
struct Router<T: KeyedResource> {
    resource_type: &'static str,
    context: Arc<T::Context>,
    mailboxes: HashMap<T::Id, Mailbox<T>>,
    workers: JoinSet<()>,
    idle_tx: mpsc::UnboundedSender<IdleNotice<T::Id>>,
    idle_timeout: Duration,
    next_generation: u64,
    active: Arc<AtomicUsize>,
}

impl<T: KeyedResource> Router<T> {
    fn dispatch(&mut self, envelope: Envelope<T>) {
        debug!(resource_type = self.resource_type, id = %envelope.id, command = ?envelope.command, "Dispatch");
        let id = envelope.id.clone();
        if !self.mailboxes.contains_key(&id) {
            let mailbox = self.spawn_worker(id.clone());
            self.mailboxes.insert(id.clone(), mailbox);
        }

        let Some(mailbox) = self.mailboxes.get(&id) else {
            return;
        };
        mailbox.in_flight.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(envelope)) = mailbox.sender.send(envelope) {
            // The worker died without being reaped; replace it and hand over the command.
            warn!(resource_type = self.resource_type, %id, "Worker gone, respawning");
            let mailbox = self.spawn_worker(id.clone());
            mailbox.in_flight.fetch_add(1, Ordering::SeqCst);
            if mailbox.sender.send(envelope).is_err() {
                error!(resource_type = self.resource_type, %id, "Fresh worker rejected command");
            }
            if self.mailboxes.insert(id, mailbox).is_some() {
                self.active.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    fn spawn_worker(&mut self, id: T::Id) -> Mailbox<T> {
        self.next_generation += 1;
        let generation = self.next_generation;
        let (sender, receiver) = mpsc::unbounded_channel();
        let in_flight = Arc::new(AtomicUsize::new(0));

        self.workers.spawn(worker_loop::<T>(
            id.clone(),
            generation,
            receiver,
            in_flight.clone(),
            self.context.clone(),
            self.idle_tx.clone(),
            self.idle_timeout,
        ));
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(resource_type = self.resource_type, %id, generation, active, "Worker spawned");

        Mailbox {
            sender,
            in_flight,
            generation,
        }
    }

    fn reap(&mut self, notice: IdleNotice<T::Id>) {
        let idle = self.mailboxes.get(&notice.id).is_some_and(|mailbox| {
            mailbox.generation == notice.generation && mailbox.in_flight.load(Ordering::SeqCst) == 0
        });
        if idle {
            // Dropping the sender ends the worker's receive loop.
            self.mailboxes.remove(&notice.id);
            let active = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
            debug!(resource_type = self.resource_type, id = %notice.id, active, "Worker reaped");
        }
    }

    async fn shutdown(mut self) {
        info!(resource_type = self.resource_type, active = self.mailboxes.len(), "Draining workers");
        self.mailboxes.clear();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                error!(resource_type = self.resource_type, error = %e, "Worker task failed");
            }
        }
        self.active.store(0, Ordering::SeqCst);
        info!(resource_type = self.resource_type, "Shutdown");
    }
}

async fn worker_loop<T: KeyedResource>(
    id: T::Id,
    generation: u64,
    mut receiver: mpsc::UnboundedReceiver<Envelope<T>>,
    in_flight: Arc<AtomicUsize>,
    context: Arc<T::Context>,
    idle_tx: mpsc::UnboundedSender<IdleNotice<T::Id>>,
    idle_timeout: Duration,
) {
    loop {
        match tokio::time::timeout(idle_timeout, receiver.recv()).await {
            Ok(Some(envelope)) => {
                let result = T::handle(&id, envelope.command, &context).await;
                if let Err(e) = &result {
                    debug!(%id, error = %e, "Command rejected");
                }
                let _ = envelope.respond_to.send(result);
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(None) => break,
            Err(_elapsed) => {
                if idle_tx
                    .send(IdleNotice {
                        id: id.clone(),
                        generation,
                    })
                    .is_err()
                {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameworkError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Appends `(id, value)` to a shared log; used to observe ordering.
    struct Journal;

    #[derive(Debug, thiserror::Error)]
    enum JournalError {
        #[error("rejected {0}")]
        Rejected(u32),
        #[error(transparent)]
        Framework(#[from] FrameworkError),
    }

    #[async_trait]
    impl KeyedResource for Journal {
        type Id = String;
        type Command = u32;
        type Reply = usize;
        type Context = Mutex<Vec<(String, u32)>>;
        type Error = JournalError;

        async fn handle(id: &String, value: u32, log: &Self::Context) -> Result<usize, JournalError> {
            if value == 0 {
                return Err(JournalError::Rejected(value));
            }
            tokio::task::yield_now().await;
            let mut log = log.lock().unwrap();
            log.push((id.clone(), value));
            Ok(log.len())
        }
    }

    #[tokio::test]
    async fn test_commands_for_one_key_run_in_order() {
        let (actor, client) = KeyedActor::<Journal>::new(8);
        let handle = tokio::spawn(actor.run(Mutex::new(Vec::new())));

        // join! polls in order, so the envelopes are enqueued as 1, 2, 3.
        let (first, second, third) = tokio::join!(
            client.send("a".to_string(), 1),
            client.send("a".to_string(), 2),
            client.send("a".to_string(), 3),
        );
        assert_eq!(first.unwrap(), 1);
        assert_eq!(second.unwrap(), 2);
        assert_eq!(third.unwrap(), 3);

        let rejected = client.send("a".to_string(), 0).await;
        assert!(matches!(rejected, Err(JournalError::Rejected(0))));

        drop(client);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_idle_worker_is_reaped() {
        let (actor, client) =
            KeyedActor::<Journal>::with_idle_timeout(8, Duration::from_millis(20));
        tokio::spawn(actor.run(Mutex::new(Vec::new())));

        client.send("a".to_string(), 1).await.unwrap();
        client.send("b".to_string(), 1).await.unwrap();
        assert_eq!(client.active_workers(), 2);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(client.active_workers(), 0);

        // A reaped key comes back transparently.
        client.send("a".to_string(), 2).await.unwrap();
        assert_eq!(client.active_workers(), 1);
    }
}
