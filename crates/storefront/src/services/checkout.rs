//! Checkout: validate the cart, write the order, hand off to the payment
//! provider, and confirm payment on return.
//!
//! Validation is synchronous and happens before anything is written. Once
//! the order exists, a payment-session failure cancels it so no pending
//! order is left behind without a way to pay.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use bloomtable_core::{
    BusinessHours, CurrencyCode, Email, EmailError, FulfillmentMethod, OrderStatus, Price,
    ProductId, SettingKey, setting_keys,
};

use crate::db::{CatalogRepository, OrderRepository, RepositoryError};
use crate::error::AppError;
use crate::models::{Cart, NewOrder, NewOrderItem, Order, Product};
use crate::payments::{CheckoutLine, CheckoutRequest, PaymentError};
use crate::state::AppState;

/// Customer details submitted with checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutForm {
    pub customer_name: String,
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub fulfillment: FulfillmentMethod,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Reasons checkout can fail.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("your cart is empty")]
    EmptyCart,

    #[error("quantity must be between 1 and {max}")]
    InvalidQuantity { max: u32 },

    #[error("a product in your cart is no longer available")]
    UnknownProduct(ProductId),

    #[error("{0} is no longer available")]
    Unavailable(String),

    #[error("name is required")]
    MissingName,

    #[error("invalid email address: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("a delivery address is required")]
    MissingAddress,

    #[error("delivery is not available right now")]
    DeliveryDisabled,

    #[error("delivery orders must be at least {0}")]
    BelowDeliveryMinimum(Price),

    #[error("online ordering is currently turned off")]
    OrderingDisabled,

    #[error("we are closed right now; please order during business hours")]
    Closed,

    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Repository(e) => Self::Database(e),
            CheckoutError::Payment(e) => Self::Payment(e),
            CheckoutError::OrderNotFound(_) => Self::NotFound(err.to_string()),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

/// Delivery options stored in the `deliverySettings` setting.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub minimum_order: Decimal,
}

/// Result of starting a checkout.
#[derive(Debug, Clone, Serialize)]
pub struct StartedCheckout {
    pub tracking_token: Uuid,
    pub redirect_url: String,
}

/// Result of verifying a payment session.
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub paid: bool,
    pub tracking_token: Option<Uuid>,
    pub status: Option<OrderStatus>,
}

/// Reject orders while ordering is switched off or the shop is closed.
///
/// # Errors
///
/// Returns `OrderingDisabled` or `Closed`.
pub fn check_availability(
    ordering_enabled: bool,
    hours: &BusinessHours,
    now: DateTime<Utc>,
) -> Result<(), CheckoutError> {
    if !ordering_enabled {
        return Err(CheckoutError::OrderingDisabled);
    }
    if !hours.is_open_at(now) {
        return Err(CheckoutError::Closed);
    }
    Ok(())
}

/// Turn a cart and the submitted form into an order ready to write.
///
/// `products` must contain every product referenced by the cart; missing or
/// inactive ones are rejected. Prices come from `products`, never the client.
///
/// # Errors
///
/// Returns the first validation failure found.
pub fn build_order(
    cart: &Cart,
    products: &[Product],
    form: CheckoutForm,
    delivery: Option<&DeliverySettings>,
    currency: CurrencyCode,
) -> Result<NewOrder, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let by_id: HashMap<ProductId, &Product> = products.iter().map(|p| (p.id, p)).collect();
    let mut items = Vec::with_capacity(cart.lines.len());
    for line in &cart.lines {
        if line.quantity == 0 || line.quantity > Cart::MAX_QUANTITY {
            return Err(CheckoutError::InvalidQuantity {
                max: Cart::MAX_QUANTITY,
            });
        }
        let product = by_id
            .get(&line.product_id)
            .ok_or(CheckoutError::UnknownProduct(line.product_id))?;
        if !product.is_active {
            return Err(CheckoutError::Unavailable(product.name.clone()));
        }
        items.push(NewOrderItem {
            product_id: product.id,
            product_name: product.name.clone(),
            unit_price: product.price,
            quantity: line.quantity,
        });
    }

    let customer_name = form.customer_name.trim().to_string();
    if customer_name.is_empty() {
        return Err(CheckoutError::MissingName);
    }
    let customer_email = Email::parse(&form.customer_email)?;

    let delivery_address = non_blank(form.delivery_address);
    if form.fulfillment == FulfillmentMethod::Delivery {
        if delivery_address.is_none() {
            return Err(CheckoutError::MissingAddress);
        }
        if let Some(settings) = delivery {
            if !settings.enabled {
                return Err(CheckoutError::DeliveryDisabled);
            }
            let subtotal: Decimal = items.iter().map(NewOrderItem::line_total).sum();
            if subtotal < settings.minimum_order {
                return Err(CheckoutError::BelowDeliveryMinimum(Price::new(
                    settings.minimum_order,
                    currency,
                )));
            }
        }
    }

    Ok(NewOrder {
        tracking_token: Uuid::new_v4(),
        customer_name,
        customer_email,
        customer_phone: non_blank(form.customer_phone),
        fulfillment: form.fulfillment,
        delivery_address: if form.fulfillment == FulfillmentMethod::Delivery {
            delivery_address
        } else {
            None
        },
        notes: non_blank(form.notes),
        currency: currency.code().to_string(),
        items,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Checkout operations bound to the application state.
pub struct CheckoutService<'a> {
    state: &'a AppState,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Validate, write the order, and open a payment session.
    ///
    /// # Errors
    ///
    /// Validation failures are returned before anything is written. A
    /// payment-provider failure cancels the new order and is returned as
    /// `CheckoutError::Payment`.
    #[instrument(skip(self, cart, form), fields(lines = cart.lines.len()))]
    pub async fn start(
        &self,
        cart: &Cart,
        form: CheckoutForm,
    ) -> Result<StartedCheckout, CheckoutError> {
        let settings = self.state.settings();
        let ordering_enabled = settings
            .get_as::<bool>(&SettingKey::from_static(setting_keys::ORDERING_ENABLED))
            .await
            .unwrap_or(true);
        let hours = settings
            .get_as::<BusinessHours>(&SettingKey::from_static(setting_keys::BUSINESS_HOURS))
            .await
            .unwrap_or_default();
        check_availability(ordering_enabled, &hours, Utc::now())?;

        let delivery = settings
            .get_as::<DeliverySettings>(&SettingKey::from_static(setting_keys::DELIVERY_SETTINGS))
            .await;

        let ids: Vec<ProductId> = cart.lines.iter().map(|l| l.product_id).collect();
        let products = CatalogRepository::new(self.state.pool())
            .get_products(&ids)
            .await?;
        let currency = self.state.payments().currency();
        let new_order = build_order(cart, &products, form, delivery.as_ref(), currency)?;

        let orders = OrderRepository::new(self.state.pool());
        let order = orders.create_pending(&new_order).await?;

        let request = self.payment_request(&new_order, currency);
        let session = match self.state.payments().create_checkout_session(&request).await {
            Ok(session) => session,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Payment session failed, cancelling order");
                self.cancel_quietly(&order, "payment session could not be created")
                    .await;
                return Err(e.into());
            }
        };

        if let Err(e) = orders.attach_payment_session(order.id, &session.id).await {
            self.cancel_quietly(&order, "payment session could not be recorded")
                .await;
            return Err(e.into());
        }

        let Some(redirect_url) = session.url else {
            self.cancel_quietly(&order, "payment provider returned no checkout page")
                .await;
            return Err(PaymentError::Api {
                status: 200,
                message: "checkout session has no url".to_string(),
            }
            .into());
        };

        info!(order_id = %order.id, session_id = %session.id, "Checkout started");
        Ok(StartedCheckout {
            tracking_token: order.tracking_token,
            redirect_url,
        })
    }

    /// Confirm a payment session after the customer returns.
    ///
    /// Safe to call repeatedly for the same session.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Payment` if the provider cannot be reached and
    /// `OrderNotFound` if a paid session matches no order.
    #[instrument(skip(self))]
    pub async fn verify(&self, session_id: &str) -> Result<Verification, CheckoutError> {
        let session = self.state.payments().retrieve_session(session_id).await?;
        if !session.is_paid() {
            return Ok(Verification {
                paid: false,
                tracking_token: session
                    .client_reference_id
                    .as_deref()
                    .and_then(|r| Uuid::parse_str(r).ok()),
                status: None,
            });
        }

        let order: Order = OrderRepository::new(self.state.pool())
            .mark_paid_by_session(&session.id)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(session.id.clone()))?;

        Ok(Verification {
            paid: true,
            tracking_token: Some(order.tracking_token),
            status: Some(order.status),
        })
    }

    fn payment_request(&self, order: &NewOrder, currency: CurrencyCode) -> CheckoutRequest {
        let base_url = &self.state.config().base_url;
        CheckoutRequest {
            client_reference_id: order.tracking_token.to_string(),
            customer_email: order.customer_email.to_string(),
            lines: order
                .items
                .iter()
                .map(|item| CheckoutLine {
                    name: item.product_name.clone(),
                    unit_price: Price::new(item.unit_price, currency),
                    quantity: item.quantity,
                })
                .collect(),
            success_url: format!(
                "{base_url}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}"
            ),
            cancel_url: format!("{base_url}/cart"),
        }
    }

    async fn cancel_quietly(&self, order: &Order, reason: &str) {
        if let Err(e) = OrderRepository::new(self.state.pool())
            .cancel_unpaid(order.id, reason)
            .await
        {
            warn!(order_id = %order.id, error = %e, "Failed to cancel order after checkout error");
        }
    }
}
