//! # Real-time surface
//!
//! Transport-agnostic sessions over JSON text frames. A transport (WebSocket, SSE, a test)
//! calls [`Gateway::connect`], feeds inbound frames to [`Session::handle_frame`] and
//! forwards what arrives on the returned receiver. Dropping the receiver ends the
//! connection; the registry prunes it on its own.

pub mod error;
pub mod protocol;
pub mod session;

pub use error::SessionError;
pub use protocol::ClientMessage;
pub use session::Session;

use crate::clients::{DeliveryClient, DeliveryQueries};
use crate::model::ServerEvent;
use crate::position_stream::PositionStream;
use crate::registry::{Connection, ConnectionRegistry};
use tokio::sync::mpsc;

/// Everything a session talks to.
#[derive(Clone)]
pub struct Gateway {
    pub(crate) deliveries: DeliveryClient,
    pub(crate) queries: DeliveryQueries,
    pub(crate) positions: PositionStream,
    pub(crate) registry: ConnectionRegistry,
    outbound_capacity: usize,
}

impl Gateway {
    pub fn new(
        deliveries: DeliveryClient,
        queries: DeliveryQueries,
        positions: PositionStream,
        registry: ConnectionRegistry,
        outbound_capacity: usize,
    ) -> Self {
        Self {
            deliveries,
            queries,
            positions,
            registry,
            outbound_capacity,
        }
    }

    /// Opens a connection with a bounded outbound queue.
    pub fn connect(&self) -> (Session, mpsc::Receiver<ServerEvent>) {
        let (conn, outbound) = Connection::open(self.outbound_capacity);
        (Session::new(self.clone(), conn), outbound)
    }
}
