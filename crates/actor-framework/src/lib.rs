//! # Actor Framework
//!
//! This crate provides a **keyed actor**: a Tokio-based single-writer scope per key.
//! Commands addressed to the same key are executed one at a time and in arrival order;
//! commands for different keys execute in parallel.
//!
//! ## Why a keyed actor?
//!
//! A classic actor owns its state in memory. Many services instead keep the
//! authoritative record in an external store and only need to make sure that two
//! read-modify-write cycles on the same record never interleave. A keyed actor gives
//! exactly that guarantee without a lock table:
//!
//! - **Isolation**: one worker task per active key, one queue per worker.
//! - **Parallelism**: unrelated keys never wait on each other.
//! - **Bounded footprint**: workers are reaped after an idle period and respawned on demand.
//!
//! **Further Reading**:
//! - [Actor Model (Wikipedia)](https://en.wikipedia.org/wiki/Actor_model)
//! - [Actors in Rust](https://ryhl.io/blog/actors-with-tokio/) - Practical guide to implementing actors with Tokio
//!
//! ## Architecture Overview
//!
//! 1. **Resource Layer** ([`KeyedResource`]) - your command handler and its error type
//! 2. **Runtime Layer** ([`KeyedActor`]) - routing, per-key workers, idle reaping
//! 3. **Interface Layer** ([`KeyedClient`]) - type-safe request/response
//!
//! ## Context Injection Pattern
//!
//! Dependencies are injected at **runtime** via `run(context)`, not at construction
//! time. The actor and its client exist before the stores and publishers it needs, which
//! lets an orchestrator hand the client to other components first and wire everything
//! in one place.
//!
//! ## Testing
//!
//! The [`mock`] module provides `MockClient`, which answers commands from a queue of
//! expectations so typed client wrappers can be tested without spawning workers.

pub mod actor;
pub mod client;
pub mod error;
pub mod message;
pub mod mock;
pub mod resource;

// Re-export core types for convenience
pub use actor::{KeyedActor, DEFAULT_IDLE_TIMEOUT};
pub use client::KeyedClient;
pub use error::FrameworkError;
pub use message::{Envelope, Response};
pub use resource::KeyedResource;
