//! KeyedResource implementation for deliveries.
//!
//! Each handler reads the delivery from the store, checks the transition, writes the
//! record back and then publishes events. Publishing happens after the write, so a
//! lost event never leaves the record behind the events, and a failed broadcast never
//! undoes a transition.

use super::actions::{CollectionReceipt, DeliveryCommand, DeliveryReply};
use super::error::DeliveryError;
use crate::collection_tracker::{CollectionError, CollectionTracker};
use crate::model::{
    AgentId, CollectionCounts, Delivery, DeliveryId, DeliveryStatus, OrderId, ProductId,
    ServerEvent, SuppliedCode, Topic, UserId, ValidationCode,
};
use crate::registry::EventPublisher;
use crate::store::{StoreError, Stores};
use actor_framework::KeyedResource;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Who caused a transition when no person did.
const SYSTEM_ACTOR: &str = "system";

/// Dependencies of every delivery worker.
#[derive(Clone)]
pub struct DeliveryContext {
    pub stores: Stores,
    pub tracker: CollectionTracker,
    pub publisher: Arc<dyn EventPublisher>,
    pub code_length: usize,
}

impl DeliveryContext {
    pub fn new(stores: Stores, publisher: Arc<dyn EventPublisher>, code_length: usize) -> Self {
        Self {
            tracker: CollectionTracker::new(stores.clone()),
            stores,
            publisher,
            code_length,
        }
    }

    async fn load(&self, id: DeliveryId) -> Result<Delivery, DeliveryError> {
        self.stores
            .delivery(&id)
            .await?
            .ok_or(DeliveryError::DeliveryNotFound(id))
    }

    /// Status change to the delivery's subscribers and to every admin.
    fn announce_status(&self, delivery: &Delivery, actor: &str) {
        self.publisher.publish(
            Topic::Delivery(delivery.id),
            ServerEvent::DeliveryStatusUpdate {
                delivery_id: delivery.id,
                status: delivery.status,
                progress: delivery.progress(),
            },
        );
        self.publisher.publish(
            Topic::Admins,
            ServerEvent::AdminDeliveryStatusUpdate {
                delivery_id: delivery.id,
                status: delivery.status,
                progress: delivery.progress(),
                actor: actor.to_string(),
            },
        );
    }

    fn announce_tracking(&self, delivery: &Delivery) {
        self.publisher.publish(
            Topic::Delivery(delivery.id),
            ServerEvent::TrackingChanged {
                delivery_id: delivery.id,
                active: delivery.gps_active,
            },
        );
    }

    /// Best-effort name lookup for admin events.
    async fn agent_name(&self, agent_id: &AgentId) -> String {
        match self.stores.agent_name(agent_id).await {
            Ok(name) => name,
            Err(e) => {
                debug!(%agent_id, error = %e, "Agent name unavailable");
                agent_id.to_string()
            }
        }
    }
}

/// Marker type driving [`Delivery`] records through the keyed actor.
pub struct DeliveryResource;

#[async_trait]
impl KeyedResource for DeliveryResource {
    type Id = DeliveryId;
    type Command = DeliveryCommand;
    type Reply = DeliveryReply;
    type Context = DeliveryContext;
    type Error = DeliveryError;

    async fn handle(
        id: &DeliveryId,
        command: DeliveryCommand,
        ctx: &DeliveryContext,
    ) -> Result<DeliveryReply, DeliveryError> {
        let id = *id;
        match command {
            DeliveryCommand::Create { order_id } => create(id, order_id, ctx).await.map(DeliveryReply::Created),
            DeliveryCommand::Reassign { agent_id, actor } => {
                reassign(id, agent_id, actor, ctx).await.map(DeliveryReply::Reassigned)
            }
            DeliveryCommand::RecordCollection {
                product_id,
                agent_id,
            } => record_collection(id, product_id, agent_id, ctx)
                .await
                .map(DeliveryReply::Collected),
            DeliveryCommand::Confirm { code, scanner_id } => {
                confirm(id, code, scanner_id, ctx).await.map(DeliveryReply::Confirmed)
            }
            DeliveryCommand::MarkFailed { reason } => mark_failed(id, reason, ctx).await.map(DeliveryReply::Failed),
            DeliveryCommand::SetTracking { agent_id, active } => {
                set_tracking(id, agent_id, active, ctx).await.map(DeliveryReply::TrackingSet)
            }
        }
    }
}

fn ensure_live(delivery: &Delivery) -> Result<(), DeliveryError> {
    if delivery.status.is_terminal() {
        return Err(DeliveryError::DeliveryTerminal {
            delivery_id: delivery.id,
            status: delivery.status,
        });
    }
    Ok(())
}

fn ensure_assigned(delivery: &Delivery, agent_id: &AgentId) -> Result<(), DeliveryError> {
    if !delivery.is_assigned_to(agent_id) {
        warn!(delivery_id = %delivery.id, %agent_id, "Rejected command from unassigned agent");
        return Err(DeliveryError::UnauthorizedAgent {
            delivery_id: delivery.id,
            agent_id: agent_id.clone(),
        });
    }
    Ok(())
}

/// Moves `delivery` forward to match the tracker's `counts` and returns the statuses
/// entered, in order.
fn advance(delivery: &mut Delivery, counts: CollectionCounts) -> Vec<DeliveryStatus> {
    delivery.collected_products = counts.collected;
    delivery.total_products = counts.total;

    let mut transitions = Vec::new();
    if counts.collected > 0 && matches!(delivery.status, DeliveryStatus::Pending | DeliveryStatus::Assigned) {
        delivery.status = DeliveryStatus::Collecting;
        transitions.push(DeliveryStatus::Collecting);
    }
    if counts.is_complete() && delivery.status == DeliveryStatus::Collecting {
        delivery.status = DeliveryStatus::EnRoute;
        delivery.picked_up_at = Some(Utc::now());
        delivery.gps_active = true;
        transitions.push(DeliveryStatus::EnRoute);
    }
    transitions
}

async fn create(id: DeliveryId, order_id: OrderId, ctx: &DeliveryContext) -> Result<Delivery, DeliveryError> {
    if ctx.stores.delivery_for_order(&order_id).await?.is_some() {
        return Err(DeliveryError::DeliveryAlreadyExists(order_id));
    }
    let order = ctx
        .stores
        .order(&order_id)
        .await?
        .ok_or_else(|| DeliveryError::OrderNotFound(order_id.clone()))?;
    let items = ctx.stores.line_items(&order_id).await?;
    if items.is_empty() {
        return Err(DeliveryError::EmptyOrder(order_id));
    }

    // Resolved before anything is written: no agent, no records.
    let agent_id = ctx
        .stores
        .least_loaded_agent()
        .await?
        .ok_or(DeliveryError::NoAgentAvailable)?;

    // Entries first, then the record in one insert, already assigned. A failure in
    // between leaves only entries under this attempt's id, never a row for the order.
    let total = ctx.tracker.create_entries(id, &items).await?;
    let now = Utc::now();
    let mut delivery = Delivery::new(
        id,
        order_id.clone(),
        total,
        ValidationCode::generate(ctx.code_length),
        now,
    );
    delivery.agent_id = Some(agent_id.clone());
    delivery.status = DeliveryStatus::Assigned;
    delivery.assigned_at = Some(now);
    ctx.stores
        .insert_delivery(&delivery)
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => DeliveryError::DeliveryAlreadyExists(order_id.clone()),
            other => other.into(),
        })?;
    info!(delivery_id = %id, %order_id, %agent_id, total = delivery.total_products, "Delivery created");

    ctx.publisher.register_delivery(id, agent_id.clone());
    ctx.publisher.publish(
        Topic::Agent(agent_id),
        ServerEvent::DeliveryAssigned {
            delivery_id: id,
            order_id,
        },
    );
    ctx.announce_status(&delivery, SYSTEM_ACTOR);

    let notifier = ctx.stores.notifier.clone();
    let code = delivery.validation_code.expose().to_string();
    tokio::spawn(async move {
        if let Err(e) = notifier
            .send_confirmation_code(&order.buyer_contact, &code, &order.summary)
            .await
        {
            warn!(delivery_id = %id, order_id = %order.id, error = %e, "Confirmation code not sent");
        }
    });

    Ok(delivery)
}

async fn reassign(
    id: DeliveryId,
    agent_id: AgentId,
    actor: UserId,
    ctx: &DeliveryContext,
) -> Result<Delivery, DeliveryError> {
    let mut delivery = ctx.load(id).await?;
    ensure_live(&delivery)?;
    if !ctx.stores.is_courier(&agent_id).await? {
        warn!(delivery_id = %id, %agent_id, %actor, "Reassignment to a non-courier");
        return Err(DeliveryError::AgentInvalid(agent_id));
    }

    let previous = delivery.agent_id.replace(agent_id.clone());
    delivery.assigned_at = Some(Utc::now());
    if delivery.status == DeliveryStatus::Pending {
        delivery.status = DeliveryStatus::Assigned;
    }
    ctx.stores.update_delivery(&delivery).await?;
    info!(delivery_id = %id, %agent_id, previous = ?previous, %actor, status = %delivery.status, "Delivery reassigned");

    ctx.publisher.register_delivery(id, agent_id.clone());
    if let Some(previous) = previous.filter(|previous| *previous != agent_id) {
        ctx.publisher
            .publish(Topic::Agent(previous), ServerEvent::DeliveryUnassigned { delivery_id: id });
    }
    ctx.publisher.publish(
        Topic::Agent(agent_id),
        ServerEvent::DeliveryAssigned {
            delivery_id: id,
            order_id: delivery.order_id.clone(),
        },
    );
    ctx.announce_status(&delivery, actor.as_str());
    Ok(delivery)
}

async fn record_collection(
    id: DeliveryId,
    product_id: ProductId,
    agent_id: AgentId,
    ctx: &DeliveryContext,
) -> Result<CollectionReceipt, DeliveryError> {
    let mut delivery = ctx.load(id).await?;
    ensure_live(&delivery)?;
    ensure_assigned(&delivery, &agent_id)?;

    let (entry, counts) = match ctx.tracker.record_collection(id, &product_id, &agent_id).await {
        Ok(outcome) => (outcome.entry, outcome.counts),
        Err(err @ CollectionError::AlreadyCollected { .. }) => {
            // The entry is collected but an earlier delivery write failed: finish that pickup.
            let counts = ctx.tracker.progress(id).await?;
            if counts.collected <= delivery.collected_products {
                return Err(err.into());
            }
            let entry = ctx.stores.entry(&id, &product_id).await?.ok_or(err)?;
            warn!(
                delivery_id = %id,
                %product_id,
                recorded = delivery.collected_products,
                collected = counts.collected,
                "Delivery record behind its collection entries, repairing"
            );
            (entry, counts)
        }
        Err(err) => return Err(err.into()),
    };
    let transitions = advance(&mut delivery, counts);
    ctx.stores.update_delivery(&delivery).await?;
    for status in &transitions {
        info!(delivery_id = %id, %status, "Delivery transitioned");
    }

    let agent_name = ctx.agent_name(&agent_id).await;
    ctx.publisher.publish(
        Topic::Delivery(id),
        ServerEvent::ProductCollected {
            delivery_id: id,
            product_id: product_id.clone(),
            product_name: entry.product_name.clone(),
            collected: counts.collected,
            total: counts.total,
            progress: counts.progress(),
        },
    );
    ctx.publisher.publish(
        Topic::Admins,
        ServerEvent::AdminProductCollected {
            delivery_id: id,
            product_name: entry.product_name,
            shop_name: entry.shop_name,
            agent_id: agent_id.clone(),
            agent_name: agent_name.clone(),
            collected: counts.collected,
            total: counts.total,
            progress: counts.progress(),
        },
    );

    for status in &transitions {
        let mut snapshot = delivery.clone();
        snapshot.status = *status;
        ctx.announce_status(&snapshot, agent_id.as_str());
    }
    if transitions.contains(&DeliveryStatus::EnRoute) {
        ctx.publisher.publish(
            Topic::Delivery(id),
            ServerEvent::DeliveryReady {
                delivery_id: id,
                total_products: counts.total,
            },
        );
        ctx.publisher.publish(
            Topic::Admins,
            ServerEvent::AdminDeliveryReady {
                delivery_id: id,
                total_products: counts.total,
                agent_id,
                agent_name,
            },
        );
        ctx.announce_tracking(&delivery);
    }

    Ok(CollectionReceipt {
        delivery,
        product_id,
        counts,
        transitions,
    })
}

async fn confirm(
    id: DeliveryId,
    code: SuppliedCode,
    scanner_id: UserId,
    ctx: &DeliveryContext,
) -> Result<Delivery, DeliveryError> {
    let mut delivery = ctx.load(id).await?;
    let code_ok = delivery.validation_code.matches(&code);

    match delivery.status {
        DeliveryStatus::Delivered if code_ok => {
            debug!(delivery_id = %id, "Already delivered, confirmation repeated");
            return Ok(delivery);
        }
        DeliveryStatus::Failed => ensure_live(&delivery)?,
        _ => {}
    }
    if !code_ok {
        warn!(delivery_id = %id, %scanner_id, "Invalid validation code presented");
        return Err(DeliveryError::InvalidCode(id));
    }

    let counts = ctx.tracker.progress(id).await?;
    if !counts.is_complete() {
        warn!(delivery_id = %id, collected = counts.collected, total = counts.total, "Confirmation before all products were collected");
        return Err(DeliveryError::IncompleteCollection {
            delivery_id: id,
            collected: counts.collected,
            total: counts.total,
        });
    }

    ctx.stores.mark_order_delivered(&delivery.order_id).await?;

    let delivered_at = Utc::now();
    let was_tracking = delivery.gps_active;
    // Catch up on transitions a failed pickup write never stored.
    let missed = advance(&mut delivery, counts);
    for status in &missed {
        info!(delivery_id = %id, %status, "Delivery transitioned");
    }
    let picked_up = delivery.clone();
    delivery.status = DeliveryStatus::Delivered;
    delivery.delivered_at = Some(delivered_at);
    delivery.gps_active = false;
    delivery.confirmed_by = Some(scanner_id.clone());
    ctx.stores.update_delivery(&delivery).await?;
    info!(delivery_id = %id, %scanner_id, "Delivery confirmed");

    ctx.publisher.release_delivery(&id);
    for status in &missed {
        let mut snapshot = picked_up.clone();
        snapshot.status = *status;
        ctx.announce_status(&snapshot, SYSTEM_ACTOR);
    }
    ctx.announce_status(&delivery, scanner_id.as_str());
    ctx.publisher.publish(
        Topic::Delivery(id),
        ServerEvent::DeliveryCompleted {
            delivery_id: id,
            delivered_at,
        },
    );
    let agent_name = match &delivery.agent_id {
        Some(agent_id) => ctx.agent_name(agent_id).await,
        None => String::new(),
    };
    ctx.publisher.publish(
        Topic::Admins,
        ServerEvent::AdminDeliveryCompleted {
            delivery_id: id,
            agent_id: delivery.agent_id.clone(),
            agent_name,
            confirmed_by: scanner_id,
        },
    );
    if was_tracking {
        ctx.announce_tracking(&delivery);
    }
    Ok(delivery)
}

async fn mark_failed(id: DeliveryId, reason: String, ctx: &DeliveryContext) -> Result<Delivery, DeliveryError> {
    let mut delivery = ctx.load(id).await?;
    ensure_live(&delivery)?;

    let was_tracking = delivery.gps_active;
    let from = delivery.status;
    delivery.status = DeliveryStatus::Failed;
    delivery.gps_active = false;
    delivery.append_note(&reason);
    ctx.stores.update_delivery(&delivery).await?;
    info!(delivery_id = %id, %from, %reason, "Delivery failed");

    ctx.publisher.release_delivery(&id);
    ctx.announce_status(&delivery, SYSTEM_ACTOR);
    if was_tracking {
        ctx.announce_tracking(&delivery);
    }
    Ok(delivery)
}

async fn set_tracking(
    id: DeliveryId,
    agent_id: AgentId,
    active: bool,
    ctx: &DeliveryContext,
) -> Result<Delivery, DeliveryError> {
    let mut delivery = ctx.load(id).await?;
    ensure_live(&delivery)?;
    ensure_assigned(&delivery, &agent_id)?;
    if delivery.gps_active == active {
        return Ok(delivery);
    }

    delivery.gps_active = active;
    ctx.stores.update_delivery(&delivery).await?;
    info!(delivery_id = %id, %agent_id, active, "Tracking switched");
    ctx.announce_tracking(&delivery);
    Ok(delivery)
}
