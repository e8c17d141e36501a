//! # KeyedResource Trait
//!
//! The `KeyedResource` trait defines the contract for anything whose commands must be
//! serialized per key (one delivery, one account, one document). The framework guarantees
//! that for a given `Id`, `handle` is never running twice at the same time, while
//! commands for different ids run in parallel.
//!
//! # Architecture Note
//! Unlike a classic in-memory actor, a keyed resource does not own its state. The
//! authoritative record lives behind the `Context` (a store, a remote service), and
//! every command performs a read-modify-write against it. The actor only provides the
//! single-writer scope around that read-modify-write.
//!
//! We use "Associated Types" (type Id, type Command, etc.) to enforce type safety.
//! A delivery resource accepts a `DeliveryCommand` and nothing else; the compiler
//! rejects any attempt to route another resource's commands through it.

use crate::error::FrameworkError;
use async_trait::async_trait;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Trait that any resource must implement to be driven by a [`KeyedActor`](crate::KeyedActor).
///
/// # Async & Context
/// `handle` is async so it can await stores and other services. The `Context` is
/// injected once when the actor is started (`run(context)`) and shared by reference
/// with every worker. This keeps the "late binding" of dependencies: clients and
/// stores are wired after the actor is constructed.
#[async_trait]
pub trait KeyedResource: Send + Sync + 'static {
    /// The key that commands are serialized on (e.g. a delivery id).
    type Id: Eq + Hash + Clone + Send + Sync + Display + Debug + 'static;

    /// The command enum accepted by this resource.
    type Command: Send + Debug + 'static;

    /// The reply returned for a successfully handled command.
    type Reply: Send + Debug + 'static;

    /// The runtime context (dependencies) shared by every worker.
    /// Use `()` if no dependencies are needed.
    type Context: Send + Sync + 'static;

    /// The error type for this resource.
    ///
    /// # Design Note: Error Granularity
    ///
    /// One error enum per resource rather than one per command. Clients match on a
    /// single type; the cost is that a command's signature admits errors it can never
    /// produce. Framework failures (closed actor, dropped reply) are folded into the same
    /// enum through the `From<FrameworkError>` bound so callers see one `Result`.
    type Error: std::error::Error + From<FrameworkError> + Send + Sync + 'static;

    /// Handle one command for `id`.
    ///
    /// Called from the per-key worker; no other command for the same `id` runs
    /// until this future completes.
    async fn handle(
        id: &Self::Id,
        command: Self::Command,
        ctx: &Self::Context,
    ) -> Result<Self::Reply, Self::Error>;
}
