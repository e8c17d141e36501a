//! # Mock Framework & Testing Guide
//!
//! `MockClient<T>` hands out a real [`KeyedClient<T>`] whose commands are answered from a
//! queue of expectations instead of a running actor. Use it to unit test the typed
//! wrappers built on top of a `KeyedClient` (argument mapping, reply unpacking, error
//! translation) without wiring stores or spawning workers.
//!
//! ## When to use Mocks vs Real Actors
//!
//! | Feature | MockClient | Real Actor |
//! |---------|------------|------------|
//! | **Speed** | Instant (in-memory) | Fast (but involves tokio spawn) |
//! | **Determinism** | 100% Deterministic | Subject to scheduler |
//! | **State** | No real state (expectations) | Real store round-trips |
//! | **Use Case** | Unit testing logic *around* the client | Testing the resource itself or full system |
//! | **Error Injection** | Easy (`return_err`) | Hard (requires specific state) |
//!
//! ## Testing Strategies
//!
//! 1. **Client logic**: `MockClient` or [`create_mock_client`] + [`expect_command`].
//! 2. **Single resource**: a real `KeyedActor` over in-memory stores.
//! 3. **Full system**: every component wired together; see the crate-level `tests/`.
//!
//! ```rust
//! use actor_framework::mock::MockClient;
//! use actor_framework::{FrameworkError, KeyedResource};
//! use async_trait::async_trait;
//!
//! struct Counter;
//! #[derive(Debug, thiserror::Error)]
//! enum CounterError {
//!     #[error("overflow")]
//!     Overflow,
//!     #[error(transparent)]
//!     Framework(#[from] FrameworkError),
//! }
//!
//! #[async_trait]
//! impl KeyedResource for Counter {
//!     type Id = u32; type Command = u32; type Reply = u32;
//!     type Context = (); type Error = CounterError;
//!     async fn handle(_: &u32, n: u32, _: &()) -> Result<u32, CounterError> { Ok(n) }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut mock = MockClient::<Counter>::new();
//!     mock.expect(1).return_ok(10);
//!     mock.expect(1).return_err(CounterError::Overflow);
//!
//!     let client = mock.client();
//!     assert_eq!(client.send(1, 5).await.unwrap(), 10);
//!     assert!(matches!(client.send(1, 5).await, Err(CounterError::Overflow)));
//!     mock.verify();
//! }
//! ```

use crate::client::KeyedClient;
use crate::message::{Envelope, Response};
use crate::resource::KeyedResource;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

/// A queued answer for the next command.
struct Expectation<T: KeyedResource> {
    id: T::Id,
    response: Result<T::Reply, T::Error>,
}

/// A mock client with expectation tracking for fluent testing.
///
/// Expectations are consumed in FIFO order. A command for a different key than the
/// next expectation names is recorded as a mismatch and makes [`MockClient::verify`]
/// panic; the caller of that command observes `FrameworkError::ActorDropped`.
pub struct MockClient<T: KeyedResource> {
    client: KeyedClient<T>,
    expectations: Arc<Mutex<VecDeque<Expectation<T>>>>,
    mismatches: Arc<Mutex<Vec<String>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl<T: KeyedResource> Default for MockClient<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: KeyedResource> MockClient<T> {
    /// Creates a new mock client with no expectations.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::channel::<Envelope<T>>(100);
        let expectations: Arc<Mutex<VecDeque<Expectation<T>>>> = Arc::new(Mutex::new(VecDeque::new()));
        let mismatches = Arc::new(Mutex::new(Vec::new()));
        let queued = expectations.clone();
        let failures = mismatches.clone();

        let handle = tokio::spawn(async move {
            while let Some(envelope) = receiver.recv().await {
                let expectation = queued.lock().unwrap().pop_front();
                match expectation {
                    Some(expected) if expected.id == envelope.id => {
                        let _ = envelope.respond_to.send(expected.response);
                    }
                    Some(expected) => {
                        failures.lock().unwrap().push(format!(
                            "expected command for {}, got {} ({:?})",
                            expected.id, envelope.id, envelope.command
                        ));
                    }
                    None => {
                        failures.lock().unwrap().push(format!(
                            "unexpected command for {} ({:?})",
                            envelope.id, envelope.command
                        ));
                    }
                }
            }
        });

        Self {
            client: KeyedClient::new(sender),
            expectations,
            mismatches,
            _handle: handle,
        }
    }

    /// Returns the client for use in tests.
    pub fn client(&self) -> KeyedClient<T> {
        self.client.clone()
    }

    /// Expects one command addressed to `id`.
    pub fn expect(&mut self, id: T::Id) -> ExpectationBuilder<T> {
        ExpectationBuilder {
            id,
            expectations: self.expectations.clone(),
        }
    }

    /// Verifies that all expectations were met and no unexpected command arrived.
    pub fn verify(&self) {
        let mismatches = self.mismatches.lock().unwrap();
        if !mismatches.is_empty() {
            panic!("Mock received unexpected commands: {:?}", *mismatches);
        }
        let remaining = self.expectations.lock().unwrap().len();
        if remaining > 0 {
            panic!("Not all expectations were met. {} remaining", remaining);
        }
    }
}

/// Builder for a single expectation.
pub struct ExpectationBuilder<T: KeyedResource> {
    id: T::Id,
    expectations: Arc<Mutex<VecDeque<Expectation<T>>>>,
}

impl<T: KeyedResource> ExpectationBuilder<T> {
    /// Answers the command with a successful reply.
    pub fn return_ok(self, reply: T::Reply) {
        self.push(Ok(reply));
    }

    /// Answers the command with an error.
    pub fn return_err(self, error: T::Error) {
        self.push(Err(error));
    }

    fn push(self, response: Result<T::Reply, T::Error>) {
        self.expectations.lock().unwrap().push_back(Expectation {
            id: self.id,
            response,
        });
    }
}

// =============================================================================
// CHANNEL-LEVEL HELPERS
// =============================================================================

/// Creates a client and the receiver its commands arrive on.
///
/// Lower level than [`MockClient`]: the test pulls each envelope with
/// [`expect_command`], inspects the command, and answers through the responder.
/// Useful when the assertion is about *what* was sent rather than what comes back.
pub fn create_mock_client<T: KeyedResource>(
    buffer_size: usize,
) -> (KeyedClient<T>, mpsc::Receiver<Envelope<T>>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (KeyedClient::new(sender), receiver)
}

/// Receives the next command, returning its key, payload and responder.
pub async fn expect_command<T: KeyedResource>(
    receiver: &mut mpsc::Receiver<Envelope<T>>,
) -> Option<(T::Id, T::Command, Response<T>)> {
    receiver
        .recv()
        .await
        .map(|envelope| (envelope.id, envelope.command, envelope.respond_to))
}
