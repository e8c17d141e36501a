//! Read-side access to deliveries.
//!
//! Queries never go through the actor: they read the store once, bounded by the store
//! timeout, and may observe a record between two commands of the same delivery.

use crate::delivery_actor::DeliveryError;
use crate::model::{Delivery, DeliveryDetails, DeliveryFilter, DeliveryId, Page, Requester};
use crate::store::Stores;
use tracing::{instrument, warn};

#[derive(Clone)]
pub struct DeliveryQueries {
    stores: Stores,
}

impl DeliveryQueries {
    pub fn new(stores: &Stores) -> Self {
        Self {
            stores: stores.single_attempt(),
        }
    }

    /// The delivery with its collection entries.
    ///
    /// Visible to the assigned agent, any admin, and the buyer of the order.
    #[instrument(skip(self))]
    pub async fn get_delivery_details(
        &self,
        delivery_id: DeliveryId,
        requester: &Requester,
    ) -> Result<DeliveryDetails, DeliveryError> {
        let delivery = self.delivery(delivery_id).await?;
        if !self.can_view(&delivery, requester).await? {
            warn!(identity = requester.identity(), role = %requester.role(), "Delivery details denied");
            return Err(DeliveryError::Forbidden(delivery_id));
        }
        let entries = self.stores.entries(&delivery_id).await?;
        Ok(DeliveryDetails::new(&delivery, entries))
    }

    /// Newest first.
    #[instrument(skip(self))]
    pub async fn list_deliveries(
        &self,
        filter: DeliveryFilter,
        page: Page,
    ) -> Result<Vec<DeliveryDetails>, DeliveryError> {
        let deliveries = self.stores.list_deliveries(&filter, page).await?;
        Ok(deliveries
            .iter()
            .map(|delivery| DeliveryDetails::new(delivery, Vec::new()))
            .collect())
    }

    pub async fn delivery(&self, delivery_id: DeliveryId) -> Result<Delivery, DeliveryError> {
        self.stores
            .delivery(&delivery_id)
            .await?
            .ok_or(DeliveryError::DeliveryNotFound(delivery_id))
    }

    /// Whether `requester` may watch or inspect `delivery`.
    pub async fn can_view(&self, delivery: &Delivery, requester: &Requester) -> Result<bool, DeliveryError> {
        Ok(match requester {
            Requester::Admin(_) => true,
            Requester::Agent(agent_id) => delivery.is_assigned_to(agent_id),
            Requester::Buyer(user_id) => self
                .stores
                .order(&delivery.order_id)
                .await?
                .is_some_and(|order| &order.buyer_id == user_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AgentId, CollectionEntry, CollectionStatus, DeliveryStatus, LineItem, Order, OrderId,
        ProductId, ShopId, UserId, ValidationCode,
    };
    use crate::store::memory::{MemoryAgentDirectory, MemoryStore, RecordingNotifier};
    use crate::store::retry::RetryPolicy;
    use crate::store::{CollectionStore, DeliveryStore};
    use chrono::Utc;
    use std::time::Duration;

    async fn seeded() -> (DeliveryQueries, MemoryStore, DeliveryId) {
        let store = MemoryStore::new();
        let stores = Stores::in_memory(
            &store,
            MemoryAgentDirectory::new(store.clone()),
            RecordingNotifier::new(),
            RetryPolicy::no_retry(Duration::from_secs(1)),
        );
        let order_id = OrderId::new("order-1");
        store.add_order(
            Order {
                id: order_id.clone(),
                buyer_id: UserId::new("buyer-1"),
                buyer_contact: "+254700000002".into(),
                destination: None,
                summary: "1 item".into(),
            },
            vec![LineItem {
                product_id: ProductId::new("p-1"),
                shop_id: ShopId::new("s-1"),
                product_name: "Maize flour".into(),
                shop_name: "Duka".into(),
                quantity: 2,
            }],
        );
        let mut delivery = Delivery::new(
            DeliveryId::new(),
            order_id,
            1,
            ValidationCode::from_stored("ZZZZ2222"),
            Utc::now(),
        );
        delivery.agent_id = Some(AgentId::new("agent-1"));
        delivery.status = DeliveryStatus::Assigned;
        DeliveryStore::insert(&store, &delivery).await.unwrap();
        store
            .insert_batch(&[CollectionEntry {
                delivery_id: delivery.id,
                product_id: ProductId::new("p-1"),
                shop_id: ShopId::new("s-1"),
                product_name: "Maize flour".into(),
                shop_name: "Duka".into(),
                status: CollectionStatus::Pending,
                collected_at: None,
                collected_by: None,
            }])
            .await
            .unwrap();
        (DeliveryQueries::new(&stores), store, delivery.id)
    }

    #[tokio::test]
    async fn test_details_visible_to_agent_admin_and_buyer() {
        let (queries, _, id) = seeded().await;
        for requester in [
            Requester::Agent(AgentId::new("agent-1")),
            Requester::Admin(UserId::new("admin-1")),
            Requester::Buyer(UserId::new("buyer-1")),
        ] {
            let details = queries.get_delivery_details(id, &requester).await.unwrap();
            assert_eq!(details.collections.len(), 1);
            assert_eq!(details.progress, 0.0);
        }
    }

    #[tokio::test]
    async fn test_details_forbidden_for_strangers() {
        let (queries, _, id) = seeded().await;
        for requester in [
            Requester::Agent(AgentId::new("agent-2")),
            Requester::Buyer(UserId::new("buyer-2")),
        ] {
            let err = queries.get_delivery_details(id, &requester).await.unwrap_err();
            assert_eq!(err, DeliveryError::Forbidden(id));
        }
    }

    #[tokio::test]
    async fn test_details_never_serialize_the_code() {
        let (queries, _, id) = seeded().await;
        let details = queries
            .get_delivery_details(id, &Requester::Admin(UserId::new("admin-1")))
            .await
            .unwrap();
        let json = serde_json::to_string(&details).unwrap();
        assert!(!json.contains("ZZZZ2222"));
    }

    #[tokio::test]
    async fn test_list_filters_by_agent() {
        let (queries, _, id) = seeded().await;
        let mine = queries
            .list_deliveries(
                DeliveryFilter {
                    status: None,
                    agent_id: Some(AgentId::new("agent-1")),
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, id);

        let theirs = queries
            .list_deliveries(
                DeliveryFilter {
                    status: None,
                    agent_id: Some(AgentId::new("agent-2")),
                },
                Page::default(),
            )
            .await
            .unwrap();
        assert!(theirs.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_delivery() {
        let (queries, _, _) = seeded().await;
        let missing = DeliveryId::new();
        let err = queries
            .get_delivery_details(missing, &Requester::Admin(UserId::new("admin-1")))
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::DeliveryNotFound(missing));
    }
}
