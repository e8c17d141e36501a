#![allow(dead_code)]

use courier_dispatch::config::Config;
use courier_dispatch::lifecycle::DeliverySystem;
use courier_dispatch::model::{
    AgentId, Coordinates, LineItem, Order, OrderId, ProductId, ServerEvent, ShopId, UserId,
};
use courier_dispatch::store::memory::{MemoryAgentDirectory, MemoryStore, RecordingNotifier};
use courier_dispatch::store::retry::RetryPolicy;
use courier_dispatch::store::Stores;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;

pub const AGENT: &str = "agent-1";
pub const BUYER: &str = "buyer-1";

pub struct Harness {
    pub system: DeliverySystem,
    pub store: MemoryStore,
    pub agents: MemoryAgentDirectory,
    pub notifier: RecordingNotifier,
}

/// A running system over in-memory stores with one available courier.
pub fn harness() -> Harness {
    let store = MemoryStore::new();
    let agents = MemoryAgentDirectory::new(store.clone());
    agents.add_courier(AgentId::new(AGENT), "Amina");
    let notifier = RecordingNotifier::new();
    let retry = RetryPolicy {
        attempts: 3,
        backoff_base: Duration::from_millis(1),
        backoff_max: Duration::from_millis(10),
        timeout: Duration::from_millis(500),
    };
    let stores = Stores::in_memory(&store, agents.clone(), notifier.clone(), retry);
    Harness {
        system: DeliverySystem::new(&Config::default(), stores),
        store,
        agents,
        notifier,
    }
}

impl Harness {
    /// Seeds an order from `BUYER` with one line item per product.
    pub fn seed_order(&self, order_id: &str, products: &[&str]) -> OrderId {
        let order_id = OrderId::new(order_id);
        self.store.add_order(
            Order {
                id: order_id.clone(),
                buyer_id: UserId::new(BUYER),
                buyer_contact: "+254700000100".into(),
                destination: Some(Coordinates::new(-1.2921, 36.8219)),
                summary: format!("{} items", products.len()),
            },
            products
                .iter()
                .map(|product| LineItem {
                    product_id: ProductId::new(*product),
                    shop_id: ShopId::new(format!("shop-{product}")),
                    product_name: product.to_string(),
                    shop_name: format!("Shop {product}"),
                    quantity: 1,
                })
                .collect(),
        );
        order_id
    }
}

pub fn drain(outbound: &mut Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = outbound.try_recv() {
        events.push(event);
    }
    events
}

pub fn types(events: &[ServerEvent]) -> Vec<&'static str> {
    events.iter().map(ServerEvent::event_type).collect()
}

pub fn auth_frame(identity: &str, role: &str) -> String {
    format!(r#"{{"type":"authenticate","identity":"{identity}","role":"{role}"}}"#)
}
