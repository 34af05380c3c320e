//! Public order tracking by token.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;
use uuid::Uuid;

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::models::OrderSummary;
use crate::state::AppState;

/// Status of an order. The token is the only credential, so contact details
/// are left out.
#[instrument(skip(state))]
pub async fn track(
    State(state): State<AppState>,
    Path(token): Path<Uuid>,
) -> Result<Json<OrderSummary>> {
    let (order, items) = OrderRepository::new(state.pool())
        .find_by_tracking_token(token)
        .await?
        .ok_or_else(|| AppError::NotFound("order".to_string()))?;

    Ok(Json(OrderSummary::new(order, items)))
}
