//! # Courier Dispatch Demo
//!
//! Runs one delivery end to end against in-memory stores:
//!
//! 1. An order with three products from two shops gets a delivery and a courier.
//! 2. An admin, the buyer and the courier open live sessions.
//! 3. The courier collects the products (33.33%, 66.67%, 100%) and reports positions.
//! 4. A wrong code is refused, the right one completes the delivery.
//!
//! Every event each session receives is logged, so `RUST_LOG=info cargo run` shows the
//! whole exchange.

use anyhow::Context;
use courier_dispatch::config::Config;
use courier_dispatch::lifecycle::tracing::setup_tracing;
use courier_dispatch::lifecycle::DeliverySystem;
use courier_dispatch::model::{
    AgentId, Coordinates, DeliveryId, LineItem, Order, OrderId, ProductId, Requester, ServerEvent,
    ShopId, UserId,
};
use courier_dispatch::realtime::protocol;
use courier_dispatch::store::memory::{MemoryAgentDirectory, MemoryStore, RecordingNotifier};
use courier_dispatch::store::retry::RetryPolicy;
use courier_dispatch::store::Stores;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tracing::{info, warn, Instrument};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    setup_tracing(&config.logging);

    info!("Starting courier dispatch demo");

    let store = MemoryStore::new();
    let agents = MemoryAgentDirectory::new(store.clone());
    agents.add_courier(AgentId::new("agent-amina"), "Amina");
    agents.add_courier(AgentId::new("agent-brian"), "Brian");
    let notifier = RecordingNotifier::new();

    let order_id = OrderId::new("order-1001");
    let buyer_id = UserId::new("buyer-42");
    let products = [
        ("rice-5kg", "shop-mama", "Rice 5kg", "Mama Mboga"),
        ("cooking-oil", "shop-mama", "Cooking oil 1L", "Mama Mboga"),
        ("phone-charger", "shop-tech", "USB-C charger", "Tech Corner"),
    ];
    store.add_order(
        Order {
            id: order_id.clone(),
            buyer_id: buyer_id.clone(),
            buyer_contact: "+254711000042".into(),
            destination: Some(Coordinates::new(-1.2921, 36.8219)),
            summary: "3 items from 2 shops".into(),
        },
        products
            .iter()
            .map(|(product, shop, product_name, shop_name)| LineItem {
                product_id: ProductId::new(*product),
                shop_id: ShopId::new(*shop),
                product_name: product_name.to_string(),
                shop_name: shop_name.to_string(),
                quantity: 1,
            })
            .collect(),
    );

    let stores = Stores::in_memory(&store, agents, notifier.clone(), RetryPolicy::from(&config.store));
    let system = DeliverySystem::new(&config, stores);

    let span = tracing::info_span!("delivery_creation");
    let delivery = async {
        info!(%order_id, "Creating delivery");
        system.deliveries.create_delivery(order_id.clone()).await
    }
    .instrument(span)
    .await?;
    let delivery_id = delivery.id;
    let agent_id = delivery
        .agent_id
        .clone()
        .context("a created delivery always has an agent")?;
    info!(%delivery_id, %agent_id, "Delivery assigned");

    // Live sessions
    let (mut admin, mut admin_rx) = system.gateway.connect();
    let (mut buyer, mut buyer_rx) = system.gateway.connect();
    let (mut courier, mut courier_rx) = system.gateway.connect();

    admin
        .handle_frame(r#"{"type":"authenticate","identity":"admin-1","role":"admin"}"#)
        .await?;
    buyer
        .handle_frame(&format!(
            r#"{{"type":"authenticate","identity":"{buyer_id}","role":"buyer"}}"#
        ))
        .await?;
    buyer.handle_frame(&join_frame(delivery_id)).await?;
    courier
        .handle_frame(&format!(
            r#"{{"type":"authenticate","identity":"{agent_id}","role":"agent"}}"#
        ))
        .await?;

    let span = tracing::info_span!("collection");
    async {
        for (product, ..) in &products {
            info!(%product, "Collecting");
            courier
                .handle_frame(&format!(
                    r#"{{"type":"report-collection","deliveryId":"{delivery_id}","productId":"{product}"}}"#
                ))
                .await?;
        }
        anyhow::Ok(())
    }
    .instrument(span)
    .await?;

    let span = tracing::info_span!("transit");
    async {
        for (lat, lon) in [(-1.2650, 36.8030), (-1.2780, 36.8120), (-1.2870, 36.8190)] {
            courier
                .handle_frame(&format!(
                    r#"{{"type":"report-position","deliveryId":"{delivery_id}","position":{{"latitude":{lat},"longitude":{lon},"speed":24.0}}}}"#
                ))
                .await?;
        }
        let estimate = system.positions.estimate_arrival_for_order(delivery_id).await?;
        info!(distance_km = estimate.distance_km, eta_minutes = estimate.eta_minutes, "Arrival estimate");
        anyhow::Ok(())
    }
    .instrument(span)
    .await?;

    // The notifier runs in the background; give it a moment.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let code = notifier
        .sent()
        .first()
        .map(|sent| sent.code.clone())
        .context("the buyer never received a code")?;

    let span = tracing::info_span!("handoff");
    async {
        if let Err(e) = courier.handle_frame(&confirm_frame(delivery_id, "WRONG999")).await {
            warn!(error = %e, "Wrong code refused as expected");
        }
        courier
            .handle_frame(&confirm_frame(delivery_id, &code))
            .await?;
        anyhow::Ok(())
    }
    .instrument(span)
    .await?;

    let details = system
        .queries
        .get_delivery_details(delivery_id, &Requester::Admin(UserId::new("admin-1")))
        .await?;
    info!(
        status = %details.status,
        progress = details.progress,
        delivered_at = ?details.delivered_at,
        "Final state"
    );

    log_events("admin", &mut admin_rx);
    log_events("buyer", &mut buyer_rx);
    log_events("courier", &mut courier_rx);

    // Sessions hold clients; drop them before shutting the actor down.
    drop((admin, buyer, courier));
    system.shutdown().await.map_err(anyhow::Error::msg)?;

    info!("Demo completed successfully");
    Ok(())
}

fn join_frame(delivery_id: DeliveryId) -> String {
    format!(r#"{{"type":"join-delivery","deliveryId":"{delivery_id}"}}"#)
}

fn confirm_frame(delivery_id: DeliveryId, code: &str) -> String {
    format!(r#"{{"type":"confirm-delivery","deliveryId":"{delivery_id}","code":"{code}"}}"#)
}

fn log_events(audience: &str, outbound: &mut Receiver<ServerEvent>) {
    while let Ok(event) = outbound.try_recv() {
        match protocol::encode(&event) {
            Ok(frame) => info!(audience, event = event.event_type(), %frame, "Received"),
            Err(e) => warn!(audience, error = %e, "Unencodable event"),
        }
    }
}
