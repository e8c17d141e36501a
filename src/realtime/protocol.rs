//! JSON text frames exchanged with live clients.
//!
//! Inbound frames are tagged by `type`, like the outbound [`ServerEvent`]s:
//!
//! ```json
//! {"type":"authenticate","identity":"agent-7","role":"agent"}
//! {"type":"report-position","deliveryId":"…","position":{"latitude":-1.28,"longitude":36.82}}
//! ```

use crate::model::{DeliveryId, PositionReport, ProductId, Role, ServerEvent, SuppliedCode};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Must be the first frame of a session. Identity is trusted as asserted.
    Authenticate { identity: String, role: Role },
    JoinDelivery { delivery_id: DeliveryId },
    LeaveDelivery { delivery_id: DeliveryId },
    ReportPosition {
        delivery_id: DeliveryId,
        position: PositionReport,
    },
    ReportCollection {
        delivery_id: DeliveryId,
        product_id: ProductId,
    },
    SetTracking { delivery_id: DeliveryId, active: bool },
    ConfirmDelivery {
        delivery_id: DeliveryId,
        code: SuppliedCode,
    },
}

pub fn parse(frame: &str) -> Result<ClientMessage, serde_json::Error> {
    serde_json::from_str(frame)
}

pub fn encode(event: &ServerEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}
