//! One live client connection.
//!
//! A session starts anonymous; the first frame must be `authenticate`. The role fixes
//! which indexes of the registry the connection lands in:
//!
//! - agents are bound to their own index and learn their live deliveries,
//! - admins join the admin fan-out and receive every admin event,
//! - buyers receive nothing until they `join-delivery`.
//!
//! Commands an agent sends for a delivery it has not joined are acknowledged on the
//! session itself; subscribers of the delivery get the regular events either way.

use super::error::SessionError;
use super::protocol::{self, ClientMessage};
use super::Gateway;
use crate::delivery_actor::DeliveryError;
use crate::model::{
    AgentId, DeliveryId, PositionReport, ProductId, Requester, Role, ServerEvent, SuppliedCode,
    UserId,
};
use crate::registry::{Connection, ConnectionId};
use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

pub struct Session {
    gateway: Gateway,
    conn: Connection,
    requester: Option<Requester>,
    joined: HashSet<DeliveryId>,
}

impl Session {
    pub(crate) fn new(gateway: Gateway, conn: Connection) -> Self {
        Self {
            gateway,
            conn,
            requester: None,
            joined: HashSet::new(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// The authenticated caller, if any.
    pub fn requester(&self) -> Option<&Requester> {
        self.requester.as_ref()
    }

    /// Parses and handles one inbound text frame.
    ///
    /// A failure is sent to the client as an `error` event and also returned.
    #[instrument(skip_all, fields(connection = %self.conn.id()))]
    pub async fn handle_frame(&mut self, frame: &str) -> Result<(), SessionError> {
        let result = match protocol::parse(frame) {
            Ok(message) => self.handle(message).await,
            Err(e) => Err(SessionError::Malformed(e.to_string())),
        };
        if let Err(e) = &result {
            debug!(error = %e, "Frame rejected");
            self.conn.send(ServerEvent::Error {
                kind: e.kind(),
                message: e.to_string(),
            });
        }
        result
    }

    pub async fn handle(&mut self, message: ClientMessage) -> Result<(), SessionError> {
        match message {
            ClientMessage::Authenticate { identity, role } => self.authenticate(identity, role),
            ClientMessage::JoinDelivery { delivery_id } => self.join(delivery_id).await,
            ClientMessage::LeaveDelivery { delivery_id } => self.leave(delivery_id),
            ClientMessage::ReportPosition {
                delivery_id,
                position,
            } => self.report_position(delivery_id, position).await,
            ClientMessage::ReportCollection {
                delivery_id,
                product_id,
            } => self.report_collection(delivery_id, product_id).await,
            ClientMessage::SetTracking {
                delivery_id,
                active,
            } => self.set_tracking(delivery_id, active).await,
            ClientMessage::ConfirmDelivery { delivery_id, code } => {
                self.confirm(delivery_id, code).await
            }
        }
    }

    fn authenticate(&mut self, identity: String, role: Role) -> Result<(), SessionError> {
        if let Some(current) = &self.requester {
            return Err(SessionError::AlreadyAuthenticated(current.identity().to_string()));
        }

        let registry = &self.gateway.registry;
        let requester = Requester::from_role(identity.clone(), role);
        let deliveries = match &requester {
            Requester::Agent(agent_id) => {
                registry.register_agent_connection(agent_id.clone(), self.conn.clone());
                registry.deliveries_for_agent(agent_id)
            }
            Requester::Admin(_) => {
                registry.register_admin(self.conn.clone());
                Vec::new()
            }
            Requester::Buyer(_) => Vec::new(),
        };
        info!(%identity, %role, live = deliveries.len(), "Session authenticated");

        self.conn.send(ServerEvent::Authenticated {
            identity,
            role,
            deliveries,
        });
        self.requester = Some(requester);
        Ok(())
    }

    async fn join(&mut self, delivery_id: DeliveryId) -> Result<(), SessionError> {
        let requester = self.authenticated()?.clone();
        let queries = &self.gateway.queries;
        let delivery = queries.delivery(delivery_id).await?;
        if !queries.can_view(&delivery, &requester).await? {
            warn!(%delivery_id, identity = requester.identity(), role = %requester.role(), "Join denied");
            return Err(DeliveryError::Forbidden(delivery_id).into());
        }

        if self.joined.insert(delivery_id) {
            self.gateway
                .registry
                .register_subscriber(delivery_id, self.conn.clone());
        }
        self.conn.send(ServerEvent::JoinedDelivery {
            delivery_id,
            status: delivery.status,
            progress: delivery.progress(),
        });
        Ok(())
    }

    fn leave(&mut self, delivery_id: DeliveryId) -> Result<(), SessionError> {
        self.authenticated()?;
        if self.joined.remove(&delivery_id) {
            self.gateway.registry.unsubscribe(&delivery_id, self.conn.id());
        }
        self.conn.send(ServerEvent::LeftDelivery { delivery_id });
        Ok(())
    }

    async fn report_position(
        &mut self,
        delivery_id: DeliveryId,
        position: PositionReport,
    ) -> Result<(), SessionError> {
        let agent_id = self.agent("report positions")?;
        self.gateway
            .positions
            .ingest(delivery_id, &agent_id, position, Some(&self.conn))
            .await?;
        Ok(())
    }

    async fn report_collection(
        &mut self,
        delivery_id: DeliveryId,
        product_id: ProductId,
    ) -> Result<(), SessionError> {
        let agent_id = self.agent("report collections")?;
        let receipt = self
            .gateway
            .deliveries
            .record_collection(delivery_id, product_id, agent_id)
            .await?;
        if !self.joined.contains(&delivery_id) {
            self.conn.send(ServerEvent::DeliveryStatusUpdate {
                delivery_id,
                status: receipt.delivery.status,
                progress: receipt.progress(),
            });
        }
        Ok(())
    }

    async fn set_tracking(&mut self, delivery_id: DeliveryId, active: bool) -> Result<(), SessionError> {
        let agent_id = self.agent("switch tracking")?;
        let delivery = self
            .gateway
            .deliveries
            .set_tracking(delivery_id, agent_id, active)
            .await?;
        if !self.joined.contains(&delivery_id) {
            self.conn.send(ServerEvent::TrackingChanged {
                delivery_id,
                active: delivery.gps_active,
            });
        }
        Ok(())
    }

    async fn confirm(&mut self, delivery_id: DeliveryId, code: SuppliedCode) -> Result<(), SessionError> {
        let scanner_id = UserId::new(self.authenticated()?.identity());
        let delivery = self
            .gateway
            .deliveries
            .confirm_delivery(delivery_id, code, scanner_id)
            .await?;
        if !self.joined.contains(&delivery_id) {
            self.conn.send(ServerEvent::DeliveryCompleted {
                delivery_id,
                delivered_at: delivery.delivered_at.unwrap_or_else(Utc::now),
            });
        }
        Ok(())
    }

    fn authenticated(&self) -> Result<&Requester, SessionError> {
        self.requester.as_ref().ok_or(SessionError::NotAuthenticated)
    }

    fn agent(&self, operation: &'static str) -> Result<AgentId, SessionError> {
        match self.authenticated()? {
            Requester::Agent(agent_id) => Ok(agent_id.clone()),
            other => {
                warn!(identity = other.identity(), role = %other.role(), operation, "Agent-only operation refused");
                Err(SessionError::RoleNotAllowed {
                    role: other.role(),
                    operation,
                })
            }
        }
    }
}
