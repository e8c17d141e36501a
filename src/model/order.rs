use super::{Coordinates, OrderId, ProductId, ShopId, UserId};

/// One ordered product as reported by the order store.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub product_id: ProductId,
    pub shop_id: ShopId,
    pub product_name: String,
    pub shop_name: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: UserId,
    /// Phone number or e-mail the confirmation code is sent to.
    pub buyer_contact: String,
    pub destination: Option<Coordinates>,
    /// Short human-readable description used in notifications.
    pub summary: String,
}
