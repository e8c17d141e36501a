//! # Generic Messages
//!
//! Message types exchanged between the [`KeyedClient`](crate::KeyedClient), the router
//! and the per-key workers.

use crate::resource::KeyedResource;
use tokio::sync::oneshot;

/// One-shot channel carrying the typed result of a command back to the caller.
pub type Response<T> =
    oneshot::Sender<Result<<T as KeyedResource>::Reply, <T as KeyedResource>::Error>>;

/// A command addressed to one key.
///
/// The router reads `id` to pick (or spawn) the worker; the worker hands `command`
/// to [`KeyedResource::handle`] and answers on `respond_to`.
#[derive(Debug)]
pub struct Envelope<T: KeyedResource> {
    pub id: T::Id,
    pub command: T::Command,
    pub respond_to: Response<T>,
}

/// Sent by a worker to the router after it has been idle for the configured period.
///
/// `generation` identifies which worker incarnation went idle, so a notice from a
/// worker that was already replaced cannot reap its successor.
#[derive(Debug)]
pub(crate) struct IdleNotice<Id> {
    pub id: Id,
    pub generation: u64,
}
