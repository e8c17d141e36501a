//! # Delivery Client
//!
//! Provides a high-level API for the delivery lifecycle. It wraps a
//! `KeyedClient<DeliveryResource>` and turns each command/reply pair into a plain async
//! method.
use crate::clients::actor_client::ActorClient;
use crate::delivery_actor::{
    CollectionReceipt, DeliveryCommand, DeliveryError, DeliveryReply, DeliveryResource,
};
use crate::model::{AgentId, Delivery, DeliveryId, OrderId, ProductId, SuppliedCode, UserId};
use actor_framework::KeyedClient;
use tracing::{debug, info, instrument};

/// Client for interacting with the Delivery actor.
#[derive(Clone)]
pub struct DeliveryClient {
    inner: KeyedClient<DeliveryResource>,
}

impl DeliveryClient {
    pub fn new(inner: KeyedClient<DeliveryResource>) -> Self {
        Self { inner }
    }
}

impl ActorClient<DeliveryResource> for DeliveryClient {
    fn inner(&self) -> &KeyedClient<DeliveryResource> {
        &self.inner
    }
}

fn unexpected(reply: DeliveryReply) -> DeliveryError {
    DeliveryError::ActorCommunicationError(format!("unexpected reply: {reply:?}"))
}

impl DeliveryClient {
    /// Creates the delivery for an order under a fresh id and assigns a courier.
    #[instrument(skip(self))]
    pub async fn create_delivery(&self, order_id: OrderId) -> Result<Delivery, DeliveryError> {
        let delivery_id = DeliveryId::new();
        info!(%delivery_id, "Sending create_delivery to actor");
        match self
            .dispatch(delivery_id, DeliveryCommand::Create { order_id })
            .await?
        {
            DeliveryReply::Created(delivery) => Ok(delivery),
            other => Err(unexpected(other)),
        }
    }

    #[instrument(skip(self))]
    pub async fn reassign(
        &self,
        delivery_id: DeliveryId,
        agent_id: AgentId,
        actor: UserId,
    ) -> Result<Delivery, DeliveryError> {
        info!("Sending reassign to actor");
        match self
            .dispatch(delivery_id, DeliveryCommand::Reassign { agent_id, actor })
            .await?
        {
            DeliveryReply::Reassigned(delivery) => Ok(delivery),
            other => Err(unexpected(other)),
        }
    }

    /// Records one pickup by the assigned agent.
    ///
    /// The receipt lists the status transitions the pickup caused.
    #[instrument(skip(self))]
    pub async fn record_collection(
        &self,
        delivery_id: DeliveryId,
        product_id: ProductId,
        agent_id: AgentId,
    ) -> Result<CollectionReceipt, DeliveryError> {
        debug!("record_collection called");
        match self
            .dispatch(
                delivery_id,
                DeliveryCommand::RecordCollection {
                    product_id,
                    agent_id,
                },
            )
            .await?
        {
            DeliveryReply::Collected(receipt) => Ok(receipt),
            other => Err(unexpected(other)),
        }
    }

    /// Confirms the handoff. Repeating a successful confirmation with the same code
    /// returns the delivered record unchanged.
    #[instrument(skip(self, code))]
    pub async fn confirm_delivery(
        &self,
        delivery_id: DeliveryId,
        code: SuppliedCode,
        scanner_id: UserId,
    ) -> Result<Delivery, DeliveryError> {
        info!("Sending confirm to actor");
        match self
            .dispatch(delivery_id, DeliveryCommand::Confirm { code, scanner_id })
            .await?
        {
            DeliveryReply::Confirmed(delivery) => Ok(delivery),
            other => Err(unexpected(other)),
        }
    }

    #[instrument(skip(self))]
    pub async fn mark_failed(
        &self,
        delivery_id: DeliveryId,
        reason: String,
    ) -> Result<Delivery, DeliveryError> {
        info!("Sending mark_failed to actor");
        match self
            .dispatch(delivery_id, DeliveryCommand::MarkFailed { reason })
            .await?
        {
            DeliveryReply::Failed(delivery) => Ok(delivery),
            other => Err(unexpected(other)),
        }
    }

    #[instrument(skip(self))]
    pub async fn set_tracking(
        &self,
        delivery_id: DeliveryId,
        agent_id: AgentId,
        active: bool,
    ) -> Result<Delivery, DeliveryError> {
        debug!("set_tracking called");
        match self
            .dispatch(delivery_id, DeliveryCommand::SetTracking { agent_id, active })
            .await?
        {
            DeliveryReply::TrackingSet(delivery) => Ok(delivery),
            other => Err(unexpected(other)),
        }
    }
}
