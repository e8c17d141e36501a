//! # Courier Dispatch
//!
//! > **Coordination core for multi-vendor deliveries.**
//!
//! One buyer order spans products from several shops. A courier collects each product,
//! then carries the lot to the buyer, who releases it with a validation code. Buyers and
//! admins watch all of it live.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### One writer per delivery
//! Every lifecycle command runs on the worker of a [`KeyedActor`](actor_framework::KeyedActor)
//! keyed by delivery id. Two pickups for the same delivery never interleave; pickups for
//! different deliveries never wait on each other. The actor holds no state of its own:
//! each command reads the record, decides, and writes it back.
//!
//! ### Events after writes
//! Events are published only once the store accepted the change, and a failed broadcast
//! never undoes one. A slow connection loses events instead of slowing anybody down.
//!
//! ## 🚀 Core Concepts
//!
//! ```text
//! pending ─► assigned ─► collecting ─► en_route ─► delivered
//!    └──────────┴────────────┴────────────┴──────► failed
//! ```
//!
//! - **Delivery**: one per order, assigned to the least-loaded courier on creation.
//! - **Collection entry**: one per distinct product; progress is the collected share.
//! - **Validation code**: 8 characters, sent to the buyer, required to confirm.
//! - **Position sample**: append-only GPS history, broadcast as it arrives.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Lifecycle ([`delivery_actor`], [`collection_tracker`])
//! - **Role**: the state machine and the per-product pickup records.
//! - **Key items**: [`DeliveryResource`](delivery_actor::DeliveryResource),
//!   [`CollectionTracker`](collection_tracker::CollectionTracker).
//!
//! ### 2. The Interface ([`clients`], [`realtime`])
//! - **Role**: typed async methods over the actor, read-side queries, and JSON sessions
//!   for live clients.
//! - **Key items**: [`DeliveryClient`](clients::DeliveryClient),
//!   [`DeliveryQueries`](clients::DeliveryQueries), [`Session`](realtime::Session).
//!
//! ### 3. Tracking ([`position_stream`], [`geo`])
//! - **Role**: GPS ingestion, last known position, distance and ETA.
//!
//! ### 4. Fan-out ([`registry`])
//! - **Role**: live connections indexed by agent, by delivery, and for admins.
//!
//! ### 5. The Orchestrator ([`lifecycle`])
//! - **Role**: wires stores, registry and actor together; tracing setup; shutdown.
//! - **Key items**: [`DeliverySystem`](lifecycle::DeliverySystem).
//!
//! ### 6. Collaborators ([`store`])
//! - **Role**: traits for everything persisted or sent elsewhere, with retry, plus
//!   in-memory implementations.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run the three-product demo
//! RUST_LOG=info cargo run
//!
//! # Run the tests
//! cargo test --workspace
//! ```

pub mod clients;
pub mod collection_tracker;
pub mod config;
pub mod delivery_actor;
pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod model;
pub mod position_stream;
pub mod realtime;
pub mod registry;
pub mod store;
