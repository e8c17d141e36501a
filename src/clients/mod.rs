//! Type-safe wrappers around [`KeyedClient`](actor_framework::KeyedClient), plus the
//! read-side query client.

pub mod actor_client;
pub mod delivery_client;
pub mod query_client;

pub use actor_client::*;
pub use delivery_client::*;
pub use query_client::*;
