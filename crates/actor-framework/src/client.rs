//! # Generic Client
//!
//! This module defines the generic client for sending commands to a [`KeyedActor`](crate::KeyedActor).

use crate::error::FrameworkError;
use crate::message::Envelope;
use crate::resource::KeyedResource;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// ## KeyedClient
///
/// The `KeyedClient<T>` provides a type‑safe, async API for addressing commands to one key
/// of a `KeyedActor<T>`. It forwards the command over a bounded Tokio mpsc channel and
/// awaits the typed result on a oneshot channel. The client is cheap to clone and can be
/// shared across tasks.
pub struct KeyedClient<T: KeyedResource> {
    sender: mpsc::Sender<Envelope<T>>,
    active: Arc<AtomicUsize>,
}

impl<T: KeyedResource> Clone for KeyedClient<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            active: self.active.clone(),
        }
    }
}

impl<T: KeyedResource> KeyedClient<T> {
    /// Wraps a raw sender. Used by the mock module; real actors use [`KeyedActor::new`](crate::KeyedActor::new).
    pub fn new(sender: mpsc::Sender<Envelope<T>>) -> Self {
        Self::with_gauge(sender, Arc::new(AtomicUsize::new(0)))
    }

    pub(crate) fn with_gauge(sender: mpsc::Sender<Envelope<T>>, active: Arc<AtomicUsize>) -> Self {
        Self { sender, active }
    }

    /// Sends `command` to the worker for `id` and waits for its reply.
    ///
    /// Framework failures surface as `T::Error` through its `From<FrameworkError>` impl.
    pub async fn send(&self, id: T::Id, command: T::Command) -> Result<T::Reply, T::Error> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(Envelope {
                id,
                command,
                respond_to,
            })
            .await
            .map_err(|_| FrameworkError::ActorClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    /// Number of per-key workers currently alive.
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Returns `true` once the router has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
