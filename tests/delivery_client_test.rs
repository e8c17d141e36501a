use actor_framework::mock::{create_mock_client, expect_command, MockClient};
use chrono::Utc;
use courier_dispatch::clients::DeliveryClient;
use courier_dispatch::delivery_actor::{
    DeliveryCommand, DeliveryError, DeliveryReply, DeliveryResource,
};
use courier_dispatch::model::{
    Delivery, DeliveryId, DeliveryStatus, OrderId, SuppliedCode, UserId, ValidationCode,
};

fn delivered(id: DeliveryId) -> Delivery {
    let mut delivery = Delivery::new(
        id,
        OrderId::new("order-1"),
        2,
        ValidationCode::from_stored("ABCD2345"),
        Utc::now(),
    );
    delivery.status = DeliveryStatus::Delivered;
    delivery.collected_products = 2;
    delivery
}

/// Client test with a mocked actor: the typed client unwraps the matching reply.
#[tokio::test]
async fn test_confirm_unwraps_reply() {
    let mut mock = MockClient::<DeliveryResource>::new();
    let id = DeliveryId::new();
    mock.expect(id).return_ok(DeliveryReply::Confirmed(delivered(id)));

    let client = DeliveryClient::new(mock.client());
    let delivery = client
        .confirm_delivery(id, SuppliedCode::new("ABCD2345"), UserId::new("buyer-1"))
        .await
        .unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Delivered);

    mock.verify();
}

#[tokio::test]
async fn test_domain_errors_pass_through() {
    let mut mock = MockClient::<DeliveryResource>::new();
    let id = DeliveryId::new();
    mock.expect(id).return_err(DeliveryError::InvalidCode(id));

    let client = DeliveryClient::new(mock.client());
    let err = client
        .confirm_delivery(id, SuppliedCode::new("nope"), UserId::new("buyer-1"))
        .await
        .unwrap_err();
    assert_eq!(err, DeliveryError::InvalidCode(id));

    mock.verify();
}

#[tokio::test]
async fn test_mismatched_reply_is_a_communication_error() {
    let mut mock = MockClient::<DeliveryResource>::new();
    let id = DeliveryId::new();
    mock.expect(id).return_ok(DeliveryReply::Failed(delivered(id)));

    let client = DeliveryClient::new(mock.client());
    let err = client
        .set_tracking(id, "agent-1".into(), true)
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::ActorCommunicationError(_)));

    mock.verify();
}

/// Channel-level mock: inspect what the client actually sends.
#[tokio::test]
async fn test_create_sends_order_under_fresh_key() {
    let (inner, mut receiver) = create_mock_client::<DeliveryResource>(4);
    let client = DeliveryClient::new(inner);

    let call = tokio::spawn(async move { client.create_delivery(OrderId::new("order-9")).await });

    let (id, command, respond_to) = expect_command(&mut receiver).await.unwrap();
    match command {
        DeliveryCommand::Create { order_id } => assert_eq!(order_id, OrderId::new("order-9")),
        other => panic!("expected Create, got {other:?}"),
    }
    let mut created = delivered(id);
    created.status = DeliveryStatus::Assigned;
    respond_to.send(Ok(DeliveryReply::Created(created))).unwrap();

    let delivery = call.await.unwrap().unwrap();
    assert_eq!(delivery.id, id);
    assert_eq!(delivery.status, DeliveryStatus::Assigned);
}

#[tokio::test]
async fn test_closed_actor_surfaces_as_communication_error() {
    let (inner, receiver) = create_mock_client::<DeliveryResource>(1);
    drop(receiver);
    let client = DeliveryClient::new(inner);

    let err = client
        .mark_failed(DeliveryId::new(), "agent sick".into())
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::ActorCommunicationError(_)));
}
