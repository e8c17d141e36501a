mod common;

use common::{harness, AGENT};
use courier_dispatch::delivery_actor::DeliveryError;
use courier_dispatch::model::{AgentId, DeliveryStatus, ProductId};

/// Pickups racing on one delivery are applied one at a time: every pickup counts, and
/// each transition is emitted by exactly one of them.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_collections_on_one_delivery() {
    let h = harness();
    let products = ["p1", "p2", "p3", "p4", "p5", "p6", "p7", "p8"];
    let order_id = h.seed_order("order-race", &products);
    let delivery = h.system.deliveries.create_delivery(order_id).await.unwrap();
    let delivery_id = delivery.id;

    let mut tasks = Vec::new();
    for product in products {
        let client = h.system.deliveries.clone();
        tasks.push(tokio::spawn(async move {
            client
                .record_collection(delivery_id, ProductId::new(product), AgentId::new(AGENT))
                .await
        }));
    }

    let mut receipts = Vec::new();
    for task in tasks {
        receipts.push(task.await.unwrap().expect("every pickup succeeds"));
    }

    let entered = |status: DeliveryStatus| {
        receipts
            .iter()
            .filter(|receipt| receipt.transitions.contains(&status))
            .count()
    };
    assert_eq!(entered(DeliveryStatus::Collecting), 1);
    assert_eq!(entered(DeliveryStatus::EnRoute), 1);

    let mut collected: Vec<u32> = receipts.iter().map(|receipt| receipt.counts.collected).collect();
    collected.sort_unstable();
    assert_eq!(collected, (1..=8).collect::<Vec<u32>>());

    let stored = h.system.queries.delivery(delivery.id).await.unwrap();
    assert_eq!(stored.status, DeliveryStatus::EnRoute);
    assert_eq!(stored.collected_products, 8);
    assert!(stored.collected_products <= stored.total_products);

    h.system.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_pickups_succeed_once() {
    let h = harness();
    let order_id = h.seed_order("order-dup", &["rice", "oil"]);
    let delivery = h.system.deliveries.create_delivery(order_id).await.unwrap();
    let delivery_id = delivery.id;

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let client = h.system.deliveries.clone();
        tasks.push(tokio::spawn(async move {
            client
                .record_collection(delivery_id, ProductId::new("rice"), AgentId::new(AGENT))
                .await
        }));
    }

    let mut ok = 0;
    let mut duplicates = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(receipt) => {
                ok += 1;
                assert_eq!(receipt.counts.collected, 1);
            }
            Err(DeliveryError::AlreadyCollected { .. }) => duplicates += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!((ok, duplicates), (1, 9));

    let stored = h.system.queries.delivery(delivery.id).await.unwrap();
    assert_eq!(stored.collected_products, 1);
    assert_eq!(stored.status, DeliveryStatus::Collecting);

    h.system.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_independent_deliveries_progress_in_parallel() {
    let h = harness();
    let mut ids = Vec::new();
    for n in 0..20 {
        let order_id = h.seed_order(&format!("order-{n}"), &["a", "b"]);
        ids.push(h.system.deliveries.create_delivery(order_id).await.unwrap().id);
    }

    let mut tasks = Vec::new();
    for id in ids.clone() {
        let client = h.system.deliveries.clone();
        tasks.push(tokio::spawn(async move {
            for product in ["a", "b"] {
                client
                    .record_collection(id, ProductId::new(product), AgentId::new(AGENT))
                    .await?;
            }
            Ok::<_, DeliveryError>(())
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    for id in ids {
        let stored = h.system.queries.delivery(id).await.unwrap();
        assert_eq!(stored.status, DeliveryStatus::EnRoute);
    }
    h.system.shutdown().await.unwrap();
}
