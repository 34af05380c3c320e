//! Checkout handoff to the payment provider and the return callback.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb};
use crate::models::{Cart, session_keys};
use crate::routes::cart::load_cart;
use crate::services::{CheckoutForm, CheckoutService, StartedCheckout, Verification};
use crate::state::AppState;

/// Create the order and a payment session for the session cart.
///
/// The cart is cleared once the customer has somewhere to pay.
#[instrument(skip(state, session, form))]
pub async fn start(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<CheckoutForm>,
) -> Result<Json<StartedCheckout>> {
    let cart = load_cart(&session).await?;
    let started = CheckoutService::new(&state).start(&cart, form).await?;

    session.remove::<Cart>(session_keys::CART).await?;
    session
        .insert(session_keys::LAST_ORDER, started.tracking_token)
        .await?;

    let token = started.tracking_token.to_string();
    add_breadcrumb("checkout", "Checkout started", Some(&[("tracking_token", &token)]));

    Ok(Json(started))
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub session_id: String,
}

/// Called when the customer returns from the payment page.
#[instrument(skip(state))]
pub async fn verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<Verification>> {
    let verification = CheckoutService::new(&state)
        .verify(&query.session_id)
        .await?;
    Ok(Json(verification))
}
