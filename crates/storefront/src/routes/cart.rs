//! Session cart.
//!
//! The session stores only product ids and quantities; names and prices are
//! looked up on every read so the cart never shows stale prices.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use bloomtable_core::{CurrencyCode, ProductId};

use crate::db::CatalogRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{Cart, CartError, Product, session_keys};
use crate::state::AppState;

/// A cart line with current catalog data.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub image_url: Option<String>,
    pub unit_price: Option<Decimal>,
    pub quantity: u32,
    pub line_total: Option<Decimal>,
    /// False when the product was removed or deactivated since it was added.
    pub available: bool,
}

/// Cart as returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub subtotal: Decimal,
    pub currency: &'static str,
}

impl CartView {
    /// Price `cart` against `products`. Unavailable lines do not count
    /// toward the subtotal.
    #[must_use]
    pub fn build(cart: &Cart, products: &[Product], currency: CurrencyCode) -> Self {
        let lines: Vec<CartLineView> = cart
            .lines
            .iter()
            .map(|line| {
                let product = products
                    .iter()
                    .find(|p| p.id == line.product_id && p.is_active);
                CartLineView {
                    product_id: line.product_id,
                    name: product.map(|p| p.name.clone()),
                    slug: product.map(|p| p.slug.clone()),
                    image_url: product.and_then(|p| p.image_url.clone()),
                    unit_price: product.map(|p| p.price),
                    quantity: line.quantity,
                    line_total: product.map(|p| p.price * Decimal::from(line.quantity)),
                    available: product.is_some(),
                }
            })
            .collect();

        let subtotal = lines.iter().filter_map(|l| l.line_total).sum();
        Self {
            item_count: cart.item_count(),
            lines,
            subtotal,
            currency: currency.code(),
        }
    }
}

/// Body of `POST /api/cart/items`.
#[derive(Debug, Deserialize)]
pub struct AddItem {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

/// Body of `PATCH /api/cart/items/{product_id}`.
#[derive(Debug, Deserialize)]
pub struct UpdateItem {
    pub quantity: u32,
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Read the cart from the session, empty if there is none.
///
/// # Errors
///
/// Returns `AppError::Session` if the session store fails.
pub async fn load_cart(session: &Session) -> Result<Cart> {
    Ok(session
        .get::<Cart>(session_keys::CART)
        .await?
        .unwrap_or_default())
}

async fn save_cart(session: &Session, cart: &Cart) -> Result<()> {
    session.insert(session_keys::CART, cart).await?;
    Ok(())
}

async fn view(state: &AppState, cart: &Cart) -> Result<CartView> {
    let ids: Vec<ProductId> = cart.lines.iter().map(|l| l.product_id).collect();
    let products = if ids.is_empty() {
        Vec::new()
    } else {
        CatalogRepository::new(state.pool()).get_products(&ids).await?
    };
    Ok(CartView::build(cart, &products, state.payments().currency()))
}

/// Current cart with priced lines.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let cart = load_cart(&session).await?;
    Ok(Json(view(&state, &cart).await?))
}

/// Add a product to the cart.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<AddItem>,
) -> Result<(StatusCode, Json<CartView>)> {
    let available = CatalogRepository::new(state.pool())
        .get_products(&[body.product_id])
        .await?
        .iter()
        .any(|p| p.is_active);
    if !available {
        return Err(AppError::NotFound(format!("product {}", body.product_id)));
    }

    let mut cart = load_cart(&session).await?;
    cart.add(body.product_id, body.quantity)?;
    save_cart(&session, &cart).await?;

    let product_id = body.product_id.to_string();
    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", &product_id)]));

    Ok((StatusCode::CREATED, Json(view(&state, &cart).await?)))
}

/// Change a line's quantity; `0` removes it.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<ProductId>,
    Json(body): Json<UpdateItem>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    if !cart.set_quantity(product_id, body.quantity)? {
        return Err(AppError::NotFound(format!("product {product_id} is not in the cart")));
    }
    save_cart(&session, &cart).await?;
    Ok(Json(view(&state, &cart).await?))
}

/// Remove a line.
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    if !cart.remove(product_id) {
        return Err(AppError::NotFound(format!("product {product_id} is not in the cart")));
    }
    save_cart(&session, &cart).await?;
    Ok(Json(view(&state, &cart).await?))
}

/// Empty the cart.
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Result<StatusCode> {
    session.remove::<Cart>(session_keys::CART).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn product(id: i32, price: Decimal, active: bool) -> Product {
        Product {
            id: ProductId::new(id),
            category_id: None,
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            description: None,
            price,
            image_url: None,
            is_active: active,
            is_featured: false,
            sort_order: 0,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_cart_view_prices_lines() {
        let mut cart = Cart::default();
        cart.add(ProductId::new(1), 2).unwrap();
        cart.add(ProductId::new(2), 1).unwrap();
        let products = vec![
            product(1, Decimal::new(1250, 2), true),
            product(2, Decimal::new(400, 2), true),
        ];

        let view = CartView::build(&cart, &products, CurrencyCode::USD);
        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, Decimal::new(2900, 2));
        assert_eq!(view.currency, "USD");
        assert!(view.lines.iter().all(|l| l.available));
    }

    #[test]
    fn test_cart_view_flags_unavailable_lines() {
        let mut cart = Cart::default();
        cart.add(ProductId::new(1), 1).unwrap();
        cart.add(ProductId::new(2), 1).unwrap();
        cart.add(ProductId::new(3), 1).unwrap();
        let products = vec![
            product(1, Decimal::new(1000, 2), true),
            product(2, Decimal::new(500, 2), false),
        ];

        let view = CartView::build(&cart, &products, CurrencyCode::USD);
        assert_eq!(view.subtotal, Decimal::new(1000, 2));
        let unavailable: Vec<_> = view
            .lines
            .iter()
            .filter(|l| !l.available)
            .map(|l| l.product_id)
            .collect();
        assert_eq!(unavailable, vec![ProductId::new(2), ProductId::new(3)]);
    }

    #[test]
    fn test_cart_error_is_bad_request() {
        let err: AppError = CartError::QuantityOutOfRange { max: 99 }.into();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
