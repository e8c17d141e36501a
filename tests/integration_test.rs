mod common;

use common::{auth_frame, drain, harness, types, AGENT, BUYER};
use courier_dispatch::delivery_actor::DeliveryError;
use courier_dispatch::error::ErrorKind;
use courier_dispatch::model::{
    AgentId, DeliveryStatus, ProductId, Requester, ServerEvent, SuppliedCode, UserId,
};
use std::time::Duration;

/// Full end-to-end run with the real actor, registry and sessions:
/// three products, a wrong code, a confirmation, and a repeated confirmation.
#[tokio::test]
async fn test_three_product_delivery_end_to_end() {
    let h = harness();
    let order_id = h.seed_order("order-1", &["rice", "oil", "charger"]);

    let delivery = h
        .system
        .deliveries
        .create_delivery(order_id.clone())
        .await
        .expect("Failed to create delivery");
    assert_eq!(delivery.status, DeliveryStatus::Assigned);
    assert_eq!(delivery.agent_id, Some(AgentId::new(AGENT)));
    assert_eq!(delivery.total_products, 3);

    // Buyer watches the delivery, admin watches everything
    let (mut buyer, mut buyer_rx) = h.system.gateway.connect();
    buyer.handle_frame(&auth_frame(BUYER, "buyer")).await.unwrap();
    buyer
        .handle_frame(&format!(r#"{{"type":"join-delivery","deliveryId":"{}"}}"#, delivery.id))
        .await
        .unwrap();
    let (mut admin, mut admin_rx) = h.system.gateway.connect();
    admin.handle_frame(&auth_frame("admin-1", "admin")).await.unwrap();
    assert_eq!(types(&drain(&mut buyer_rx)), vec!["authenticated", "joined-delivery"]);
    drain(&mut admin_rx);

    // Courier picks everything up
    let mut progress = Vec::new();
    for product in ["rice", "oil", "charger"] {
        let receipt = h
            .system
            .deliveries
            .record_collection(delivery.id, ProductId::new(product), AgentId::new(AGENT))
            .await
            .expect("Failed to record collection");
        progress.push(receipt.progress());
    }
    assert_eq!(progress, vec![33.33, 66.67, 100.0]);

    let buyer_events = drain(&mut buyer_rx);
    assert_eq!(
        types(&buyer_events),
        vec![
            "product-collected",
            "delivery-status-update",
            "product-collected",
            "product-collected",
            "delivery-status-update",
            "delivery-ready",
            "tracking-changed",
        ]
    );
    let statuses: Vec<DeliveryStatus> = buyer_events
        .iter()
        .filter_map(|event| match event {
            ServerEvent::DeliveryStatusUpdate { status, .. } => Some(*status),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec![DeliveryStatus::Collecting, DeliveryStatus::EnRoute]);

    let admin_events = drain(&mut admin_rx);
    assert_eq!(
        admin_events
            .iter()
            .filter(|event| matches!(event, ServerEvent::AdminProductCollected { .. }))
            .count(),
        3
    );
    assert!(admin_events.iter().any(|event| matches!(
        event,
        ServerEvent::AdminDeliveryReady { agent_name, .. } if agent_name == "Amina"
    )));

    // Wrong code: nothing changes
    let err = h
        .system
        .deliveries
        .confirm_delivery(delivery.id, SuppliedCode::new("WRONG999"), UserId::new(AGENT))
        .await
        .unwrap_err();
    assert_eq!(err, DeliveryError::InvalidCode(delivery.id));
    assert!(drain(&mut buyer_rx).is_empty());
    assert!(!h.store.is_order_delivered(&order_id));

    // The code the buyer received completes the delivery
    tokio::time::sleep(Duration::from_millis(20)).await;
    let code = h.notifier.sent()[0].code.clone();
    let delivered = h
        .system
        .deliveries
        .confirm_delivery(delivery.id, SuppliedCode::new(code.clone()), UserId::new(AGENT))
        .await
        .expect("Failed to confirm delivery");
    assert_eq!(delivered.status, DeliveryStatus::Delivered);
    assert!(delivered.delivered_at.is_some());
    assert!(!delivered.gps_active);
    assert!(h.store.is_order_delivered(&order_id));
    assert_eq!(
        types(&drain(&mut buyer_rx)),
        vec!["delivery-status-update", "delivery-completed", "tracking-changed"]
    );
    assert!(drain(&mut admin_rx)
        .iter()
        .any(|event| matches!(event, ServerEvent::AdminDeliveryCompleted { .. })));

    // Repeating the confirmation is a no-op
    let again = h
        .system
        .deliveries
        .confirm_delivery(delivery.id, SuppliedCode::new(code), UserId::new(AGENT))
        .await
        .expect("Repeated confirmation should succeed");
    assert_eq!(again.delivered_at, delivered.delivered_at);
    assert!(drain(&mut buyer_rx).is_empty());

    let details = h
        .system
        .queries
        .get_delivery_details(delivery.id, &Requester::Buyer(UserId::new(BUYER)))
        .await
        .unwrap();
    assert_eq!(details.progress, 100.0);
    assert!(details.collections.iter().all(|entry| entry.is_collected()));

    drop((buyer, admin));
    h.system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_positions_and_eta_through_the_system() {
    let h = harness();
    let order_id = h.seed_order("order-2", &["rice"]);
    let delivery = h.system.deliveries.create_delivery(order_id).await.unwrap();

    let err = h
        .system
        .positions
        .estimate_arrival_for_order(delivery.id)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        courier_dispatch::position_stream::PositionError::NoPositionData(delivery.id)
    );

    h.system
        .deliveries
        .record_collection(delivery.id, ProductId::new("rice"), AgentId::new(AGENT))
        .await
        .unwrap();

    let (mut courier, mut courier_rx) = h.system.gateway.connect();
    courier.handle_frame(&auth_frame(AGENT, "agent")).await.unwrap();
    courier
        .handle_frame(&format!(
            r#"{{"type":"report-position","deliveryId":"{}","position":{{"latitude":-1.2650,"longitude":36.8030}}}}"#,
            delivery.id
        ))
        .await
        .unwrap();
    assert_eq!(types(&drain(&mut courier_rx)), vec!["authenticated", "position-ack"]);

    let last = h
        .system
        .positions
        .last_known_position(delivery.id)
        .await
        .unwrap()
        .expect("a sample was stored");
    assert_eq!((last.latitude, last.longitude), (-1.2650, 36.8030));

    let estimate = h
        .system
        .positions
        .estimate_arrival_for_order(delivery.id)
        .await
        .unwrap();
    assert!(estimate.distance_km > 3.0 && estimate.distance_km < 4.0);
    assert!(estimate.eta_minutes >= 6);

    drop(courier);
    h.system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_delivery_rejects_further_commands() {
    let h = harness();
    let order_id = h.seed_order("order-3", &["rice", "oil"]);
    let delivery = h.system.deliveries.create_delivery(order_id).await.unwrap();

    let failed = h
        .system
        .deliveries
        .mark_failed(delivery.id, "shop closed".into())
        .await
        .unwrap();
    assert_eq!(failed.status, DeliveryStatus::Failed);

    let err = h
        .system
        .deliveries
        .record_collection(delivery.id, ProductId::new("rice"), AgentId::new(AGENT))
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::DeliveryTerminal { .. }));

    let err = h
        .system
        .deliveries
        .reassign(delivery.id, AgentId::new(AGENT), UserId::new("admin-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::DeliveryTerminal { .. }));

    h.system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_no_courier_available() {
    let h = harness();
    h.agents.set_available(&AgentId::new(AGENT), false);
    let order_id = h.seed_order("order-4", &["rice"]);

    let err = h
        .system
        .deliveries
        .create_delivery(order_id)
        .await
        .unwrap_err();
    assert_eq!(err, DeliveryError::NoAgentAvailable);
    assert_eq!(err.kind(), ErrorKind::Unavailable);

    h.system.shutdown().await.unwrap();
}
