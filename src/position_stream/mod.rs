//! # Position Stream
//!
//! Ingests GPS reports from agent connections, persists them as immutable
//! [`PositionSample`]s and rebroadcasts them to the delivery's subscribers. Also answers
//! "where is it now?" and "how long until it arrives?".
//!
//! Ingestion does not go through the per-delivery actor: a position report only *reads*
//! the delivery to check that tracking is on, and samples are append-only. Two reports
//! from the same agent on different connections may therefore be stored in either order;
//! consumers order samples by their own timestamp.
//!
//! Queries run against the store with a single attempt, so their latency is bounded by
//! the store timeout and never by a connection or the actor queue.

pub mod error;

pub use error::*;

use crate::config::TrackingConfig;
use crate::geo;
use crate::model::{
    AgentId, ArrivalEstimate, Coordinates, Delivery, DeliveryId, NewPositionSample,
    PositionReport, PositionSample, ServerEvent, Topic,
};
use crate::registry::{Connection, EventPublisher};
use crate::store::Stores;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Clone)]
pub struct PositionStream {
    stores: Stores,
    queries: Stores,
    publisher: Arc<dyn EventPublisher>,
    average_speed_kmh: f64,
}

impl PositionStream {
    pub fn new(stores: Stores, publisher: Arc<dyn EventPublisher>, tracking: &TrackingConfig) -> Self {
        Self {
            queries: stores.single_attempt(),
            stores,
            publisher,
            average_speed_kmh: tracking.average_speed_kmh,
        }
    }

    /// Stores one report and fans it out.
    ///
    /// `origin` is the connection the report arrived on; it alone receives the
    /// `position-ack`.
    #[instrument(skip_all, fields(%delivery_id, %agent_id))]
    pub async fn ingest(
        &self,
        delivery_id: DeliveryId,
        agent_id: &AgentId,
        report: PositionReport,
        origin: Option<&Connection>,
    ) -> Result<PositionSample, PositionError> {
        let point = report.coordinates();
        if !point.is_valid() {
            return Err(PositionError::InvalidCoordinates {
                lat: point.lat,
                lon: point.lon,
            });
        }

        let delivery = self.load(&self.stores, delivery_id).await?;
        if !delivery.is_assigned_to(agent_id) {
            warn!("Position report from unassigned agent");
            return Err(PositionError::UnauthorizedAgent {
                delivery_id,
                agent_id: agent_id.clone(),
            });
        }
        if !delivery.accepts_positions() {
            return Err(PositionError::TrackingNotActive(delivery_id));
        }

        let recorded_at = report.timestamp.unwrap_or_else(Utc::now);
        let sample = self
            .stores
            .append_position(NewPositionSample {
                delivery_id,
                agent_id: agent_id.clone(),
                report,
                recorded_at,
            })
            .await?;
        debug!(sample_id = sample.id, lat = sample.latitude, lon = sample.longitude, "Position stored");

        self.publisher.publish(
            Topic::Delivery(delivery_id),
            ServerEvent::GpsUpdate {
                delivery_id,
                lat: sample.latitude,
                lon: sample.longitude,
                accuracy: sample.accuracy,
                speed: sample.speed,
                heading: sample.heading,
                timestamp: sample.recorded_at,
            },
        );
        self.publisher.publish(
            Topic::Admins,
            ServerEvent::AdminGpsUpdate {
                delivery_id,
                agent_id: agent_id.clone(),
                lat: sample.latitude,
                lon: sample.longitude,
                timestamp: sample.recorded_at,
            },
        );
        if let Some(origin) = origin {
            origin.send(ServerEvent::PositionAck {
                delivery_id,
                sample_id: sample.id,
                timestamp: sample.recorded_at,
            });
        }

        Ok(sample)
    }

    /// Most recent sample by timestamp. `None` means no data yet, which is not an error.
    pub async fn last_known_position(
        &self,
        delivery_id: DeliveryId,
    ) -> Result<Option<PositionSample>, PositionError> {
        Ok(self.queries.latest_position(&delivery_id).await?)
    }

    /// Distance and ETA from the last known position to `destination`.
    ///
    /// `destination` is `None` when the order carries no delivery coordinates.
    pub async fn estimate_arrival(
        &self,
        delivery_id: DeliveryId,
        destination: Option<Coordinates>,
    ) -> Result<ArrivalEstimate, PositionError> {
        let last = self
            .last_known_position(delivery_id)
            .await?
            .ok_or(PositionError::NoPositionData(delivery_id))?;
        let destination = destination.ok_or(PositionError::DestinationUnknown(delivery_id))?;
        Ok(geo::estimate(last.coordinates(), destination, self.average_speed_kmh))
    }

    /// Same as [`estimate_arrival`](Self::estimate_arrival), with the destination taken
    /// from the delivery's order.
    pub async fn estimate_arrival_for_order(
        &self,
        delivery_id: DeliveryId,
    ) -> Result<ArrivalEstimate, PositionError> {
        let delivery = self.load(&self.queries, delivery_id).await?;
        let destination = self
            .queries
            .order(&delivery.order_id)
            .await?
            .and_then(|order| order.destination);
        self.estimate_arrival(delivery_id, destination).await
    }

    async fn load(&self, stores: &Stores, delivery_id: DeliveryId) -> Result<Delivery, PositionError> {
        stores
            .delivery(&delivery_id)
            .await?
            .ok_or(PositionError::DeliveryNotFound(delivery_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeliveryStatus, Order, OrderId, UserId, ValidationCode};
    use crate::registry::ConnectionRegistry;
    use crate::store::memory::{MemoryAgentDirectory, MemoryStore, RecordingNotifier};
    use crate::store::retry::RetryPolicy;
    use crate::store::{DeliveryStore, StoreError};
    use std::time::Duration;

    struct Fixture {
        stream: PositionStream,
        store: MemoryStore,
        registry: ConnectionRegistry,
        agent: AgentId,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let registry = ConnectionRegistry::new();
        let stores = Stores::in_memory(
            &store,
            MemoryAgentDirectory::new(store.clone()),
            RecordingNotifier::new(),
            RetryPolicy::no_retry(Duration::from_millis(200)),
        );
        let stream = PositionStream::new(stores, Arc::new(registry.clone()), &TrackingConfig::default());
        Fixture {
            stream,
            store,
            registry,
            agent: AgentId::new("agent-1"),
        }
    }

    async fn seed(fx: &Fixture, status: DeliveryStatus, destination: Option<Coordinates>) -> DeliveryId {
        let order_id = OrderId::new(format!("order-{}", DeliveryId::new()));
        fx.store.add_order(
            Order {
                id: order_id.clone(),
                buyer_id: UserId::new("buyer-1"),
                buyer_contact: "+254700000000".into(),
                destination,
                summary: "1 item".into(),
            },
            Vec::new(),
        );
        let mut delivery = Delivery::new(
            DeliveryId::new(),
            order_id,
            1,
            ValidationCode::from_stored("ABCD2345"),
            Utc::now(),
        );
        delivery.agent_id = Some(fx.agent.clone());
        delivery.status = status;
        fx.store.insert(&delivery).await.unwrap();
        delivery.id
    }

    #[tokio::test]
    async fn test_ingest_broadcasts_and_acks_origin_only() {
        let fx = fixture();
        let delivery_id = seed(&fx, DeliveryStatus::EnRoute, None).await;
        let (buyer, mut buyer_rx) = Connection::open(8);
        let (agent_conn, mut agent_rx) = Connection::open(8);
        fx.registry.register_subscriber(delivery_id, buyer);

        let sample = fx
            .stream
            .ingest(delivery_id, &fx.agent, PositionReport::new(-1.28, 36.82), Some(&agent_conn))
            .await
            .unwrap();

        match buyer_rx.recv().await {
            Some(ServerEvent::GpsUpdate { lat, lon, .. }) => {
                assert_eq!((lat, lon), (-1.28, 36.82));
            }
            other => panic!("expected gps-update, got {other:?}"),
        }
        assert!(matches!(
            agent_rx.recv().await,
            Some(ServerEvent::PositionAck { sample_id, .. }) if sample_id == sample.id
        ));
        assert!(buyer_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ingest_requires_active_tracking() {
        let fx = fixture();
        let delivery_id = seed(&fx, DeliveryStatus::Collecting, None).await;
        let err = fx
            .stream
            .ingest(delivery_id, &fx.agent, PositionReport::new(0.0, 0.0), None)
            .await
            .unwrap_err();
        assert_eq!(err, PositionError::TrackingNotActive(delivery_id));
        assert_eq!(fx.store.sample_count(&delivery_id), 0);
    }

    #[tokio::test]
    async fn test_ingest_rejects_other_agents_and_bad_coordinates() {
        let fx = fixture();
        let delivery_id = seed(&fx, DeliveryStatus::EnRoute, None).await;

        let err = fx
            .stream
            .ingest(delivery_id, &AgentId::new("intruder"), PositionReport::new(0.0, 0.0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PositionError::UnauthorizedAgent { .. }));

        let err = fx
            .stream
            .ingest(delivery_id, &fx.agent, PositionReport::new(91.0, 0.0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PositionError::InvalidCoordinates { .. }));
    }

    #[tokio::test]
    async fn test_estimate_without_samples_is_no_position_data() {
        let fx = fixture();
        let delivery_id = seed(&fx, DeliveryStatus::EnRoute, Some(Coordinates::new(-1.3, 36.9))).await;

        assert_eq!(fx.stream.last_known_position(delivery_id).await.unwrap(), None);
        let err = fx.stream.estimate_arrival_for_order(delivery_id).await.unwrap_err();
        assert_eq!(err, PositionError::NoPositionData(delivery_id));
    }

    #[tokio::test]
    async fn test_estimate_uses_last_sample_and_order_destination() {
        let fx = fixture();
        let delivery_id = seed(&fx, DeliveryStatus::EnRoute, Some(Coordinates::new(1.0, 0.0))).await;
        fx.stream
            .ingest(delivery_id, &fx.agent, PositionReport::new(0.0, 0.0), None)
            .await
            .unwrap();

        let estimate = fx.stream.estimate_arrival_for_order(delivery_id).await.unwrap();
        assert_eq!(estimate.distance_km, 111.19);
        // 111.19 km at 30 km/h is 222.4 minutes.
        assert_eq!(estimate.eta_minutes, 223);
    }

    #[tokio::test]
    async fn test_estimate_without_destination() {
        let fx = fixture();
        let delivery_id = seed(&fx, DeliveryStatus::EnRoute, None).await;
        fx.stream
            .ingest(delivery_id, &fx.agent, PositionReport::new(0.0, 0.0), None)
            .await
            .unwrap();
        let err = fx.stream.estimate_arrival_for_order(delivery_id).await.unwrap_err();
        assert_eq!(err, PositionError::DestinationUnknown(delivery_id));
    }

    #[tokio::test]
    async fn test_queries_are_bounded_by_store_timeout() {
        let fx = fixture();
        let delivery_id = seed(&fx, DeliveryStatus::EnRoute, None).await;
        fx.store.set_latency(Duration::from_millis(500));

        let started = std::time::Instant::now();
        let err = fx.stream.last_known_position(delivery_id).await.unwrap_err();
        assert!(matches!(err, PositionError::Store(StoreError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_millis(450));
    }
}
