//! Orders as written by checkout and read by order tracking.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use bloomtable_core::{
    Email, FulfillmentMethod, OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId,
};

/// A full order row.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: OrderId,
    pub tracking_token: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub fulfillment: FulfillmentMethod,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub currency: String,
    pub payment_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// What the public tracking page may see: no contact details.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub tracking_token: Uuid,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub fulfillment: FulfillmentMethod,
    pub subtotal: Decimal,
    pub currency: String,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderSummary {
    #[must_use]
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self {
            tracking_token: order.tracking_token,
            status: order.status,
            payment_status: order.payment_status,
            fulfillment: order.fulfillment,
            subtotal: order.subtotal,
            currency: order.currency,
            items,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// A line to insert with a new order. Name and price are copied from the
/// product so later catalog edits do not rewrite history.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl NewOrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A validated order ready to be written.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub tracking_token: Uuid,
    pub customer_name: String,
    pub customer_email: Email,
    pub customer_phone: Option<String>,
    pub fulfillment: FulfillmentMethod,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
    pub currency: String,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(NewOrderItem::line_total).sum()
    }
}
