//! Startup, wiring and shutdown.

pub mod delivery_system;
pub mod tracing;

pub use delivery_system::DeliverySystem;
