//! Error types for the collection tracker.

use crate::model::{DeliveryId, ProductId};
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollectionError {
    /// The delivery has no entry for this product.
    #[error("product {product_id} is not part of delivery {delivery_id}")]
    ProductNotFound {
        delivery_id: DeliveryId,
        product_id: ProductId,
    },

    /// The product was already picked up. Duplicate reports are rejected, not ignored.
    #[error("product {product_id} of delivery {delivery_id} was already collected")]
    AlreadyCollected {
        delivery_id: DeliveryId,
        product_id: ProductId,
    },

    /// Entries for this delivery were already created.
    #[error("collection entries already exist for delivery {0}")]
    EntriesExist(DeliveryId),

    #[error(transparent)]
    Store(#[from] StoreError),
}
