//! Plain data types shared by every component.
//!
//! Nothing in here talks to a store or a connection. Records are mutated by the
//! component that owns them (deliveries by the delivery actor, collection entries by the
//! collection tracker) and only read everywhere else.

pub mod code;
pub mod collection;
pub mod delivery;
pub mod event;
pub mod ids;
pub mod order;
pub mod position;

pub use code::*;
pub use collection::*;
pub use delivery::*;
pub use event::*;
pub use ids::*;
pub use order::*;
pub use position::*;
