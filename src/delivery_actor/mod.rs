//! Delivery lifecycle, driven through the keyed actor.
//!
//! ```text
//! pending ─► assigned ─► collecting ─► en_route ─► delivered
//!    └──────────┴────────────┴────────────┴──────► failed
//! ```
//!
//! Every command for one delivery runs on that delivery's worker, so two pickups racing
//! on the same delivery are applied one after the other and the `collecting` and
//! `en_route` transitions each happen exactly once.

mod actions;
pub mod entity;
pub mod error;

pub use actions::*;
pub use entity::{DeliveryContext, DeliveryResource};
pub use error::*;

use crate::clients::DeliveryClient;
use crate::config::ActorConfig;
use actor_framework::KeyedActor;

/// Creates the delivery actor and its client. The actor still needs
/// `run(DeliveryContext)` to be spawned.
pub fn new(config: &ActorConfig) -> (KeyedActor<DeliveryResource>, DeliveryClient) {
    let (actor, generic_client) = KeyedActor::with_idle_timeout(config.buffer, config.idle_timeout());
    let client = DeliveryClient::new(generic_client);

    (actor, client)
}
