mod common;

use common::{harness, AGENT};
use courier_dispatch::model::{progress, AgentId, DeliveryStatus, ProductId};
use proptest::prelude::*;

proptest! {
    #[test]
    fn progress_stays_within_bounds(collected in 0u32..1_000, total in 0u32..1_000) {
        let p = progress(collected, total);
        prop_assert!((0.0..=100.0).contains(&p));
        if total == 0 {
            prop_assert_eq!(p, 0.0);
        }
        if collected >= total && total > 0 {
            prop_assert_eq!(p, 100.0);
        }
    }

    #[test]
    fn progress_has_two_decimals(collected in 0u32..500, total in 1u32..500) {
        let p = progress(collected.min(total), total);
        let scaled = p * 100.0;
        prop_assert!((scaled - scaled.round()).abs() < 1e-6);
    }

    #[test]
    fn progress_is_monotonic(total in 1u32..200, a in 0u32..200, b in 0u32..200) {
        let (low, high) = (a.min(b).min(total), a.max(b).min(total));
        prop_assert!(progress(low, total) <= progress(high, total));
    }
}

/// Whatever order products are picked up in, counts and progress agree after every
/// pickup and the delivery ends en route.
#[test]
fn pickups_in_any_order_keep_counts_consistent() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut runner = proptest::test_runner::TestRunner::new(ProptestConfig::with_cases(16));
    let strategy = (1usize..7).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle());

    runner
        .run(&strategy, |order| {
            runtime.block_on(async {
                let h = harness();
                let products: Vec<String> = (0..order.len()).map(|i| format!("p{i}")).collect();
                let names: Vec<&str> = products.iter().map(String::as_str).collect();
                let order_id = h.seed_order("order-prop", &names);
                let delivery = h.system.deliveries.create_delivery(order_id).await.unwrap();
                let total = order.len() as u32;

                for (step, index) in order.iter().enumerate() {
                    let receipt = h
                        .system
                        .deliveries
                        .record_collection(delivery.id, ProductId::new(&products[*index]), AgentId::new(AGENT))
                        .await
                        .unwrap();
                    let collected = step as u32 + 1;
                    assert_eq!(receipt.counts.collected, collected);
                    assert_eq!(receipt.delivery.collected_products, collected);
                    assert_eq!(receipt.progress(), progress(collected, total));
                    assert!(receipt.delivery.collected_products <= receipt.delivery.total_products);
                }

                let stored = h.system.queries.delivery(delivery.id).await.unwrap();
                assert_eq!(stored.status, DeliveryStatus::EnRoute);
                assert!(stored.picked_up_at.is_some());
                h.system.shutdown().await.unwrap();
            });
            Ok(())
        })
        .unwrap();
}
