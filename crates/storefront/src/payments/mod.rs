//! Hosted checkout client for a Stripe-compatible payment API.
//!
//! The storefront never sees card data. Checkout creates a session with the
//! provider, redirects the customer to the returned URL, and verifies the
//! session when the customer comes back.
//!
//! Requests are form-encoded with bracketed keys (`line_items[0][quantity]`)
//! and authenticated with the secret key as a bearer token.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, instrument};

use bloomtable_core::{CurrencyCode, Price};

use crate::config::PaymentConfig;

/// Errors from the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the request.
    #[error("payment API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A price could not be expressed in minor units.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// One priced line on the hosted checkout page.
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
}

/// Parameters for [`PaymentClient::create_checkout_session`].
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Our reference, echoed back by the provider.
    pub client_reference_id: String,
    pub customer_email: String,
    pub lines: Vec<CheckoutLine>,
    pub success_url: String,
    pub cancel_url: String,
}

/// A checkout session as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted page to redirect to; absent once the session is complete.
    pub url: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: String,
    /// `open`, `complete` or `expired`.
    pub status: Option<String>,
    pub client_reference_id: Option<String>,
    pub amount_total: Option<i64>,
}

impl CheckoutSession {
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Client for the payment provider API.
#[derive(Clone)]
pub struct PaymentClient {
    inner: Arc<PaymentClientInner>,
}

struct PaymentClientInner {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
    currency: CurrencyCode,
}

impl std::fmt::Debug for PaymentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentClient")
            .field("api_base", &self.inner.api_base)
            .field("currency", &self.inner.currency)
            .finish_non_exhaustive()
    }
}

impl PaymentClient {
    /// Create a new payment client.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if the HTTP client cannot be built.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;

        Ok(Self {
            inner: Arc::new(PaymentClientInner {
                client,
                api_base: config.api_base.clone(),
                secret_key: config.secret_key.clone(),
                currency: config.currency,
            }),
        })
    }

    #[must_use]
    pub fn currency(&self) -> CurrencyCode {
        self.inner.currency
    }

    /// Create a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if an amount is not representable, the request
    /// fails, or the provider rejects it.
    #[instrument(skip(self, request), fields(reference = %request.client_reference_id, lines = request.lines.len()))]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let form = self.checkout_form(request)?;
        let url = format!("{}/v1/checkout/sessions", self.inner.api_base);

        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(&form)
            .send()
            .await?;

        let session: CheckoutSession = Self::parse_response(response).await?;
        debug!(session_id = %session.id, "Checkout session created");
        Ok(session)
    }

    /// Fetch a checkout session by id.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the request fails or the session is unknown.
    #[instrument(skip(self))]
    pub async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, PaymentError> {
        let url = format!(
            "{}/v1/checkout/sessions/{}",
            self.inner.api_base,
            url_path_segment(session_id)
        );

        let response = self
            .inner
            .client
            .get(&url)
            .bearer_auth(self.inner.secret_key.expose_secret())
            .send()
            .await?;

        Self::parse_response(response).await
    }

    fn checkout_form(&self, request: &CheckoutRequest) -> Result<Vec<(String, String)>, PaymentError> {
        let currency = self.inner.currency.code().to_ascii_lowercase();
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            (
                "client_reference_id".to_string(),
                request.client_reference_id.clone(),
            ),
            ("customer_email".to_string(), request.customer_email.clone()),
        ];

        for (i, line) in request.lines.iter().enumerate() {
            let unit_amount = line.unit_price.to_minor_units().ok_or_else(|| {
                PaymentError::InvalidAmount(format!("{} for {}", line.unit_price, line.name))
            })?;
            let prefix = format!("line_items[{i}]");
            form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
            form.push((format!("{prefix}[price_data][currency]"), currency.clone()));
            form.push((
                format!("{prefix}[price_data][unit_amount]"),
                unit_amount.to_string(),
            ));
            form.push((
                format!("{prefix}[price_data][product_data][name]"),
                line.name.clone(),
            ));
        }

        Ok(form)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            error!(status = %status, message = %message, "Payment API returned non-success status");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse payment API response"
            );
            PaymentError::Parse(e)
        })
    }
}

/// Keep only characters that are safe in a path segment. Provider ids are
/// `[A-Za-z0-9_]`.
fn url_path_segment(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn client() -> PaymentClient {
        PaymentClient::new(&PaymentConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            currency: CurrencyCode::USD,
        })
        .unwrap()
    }

    #[test]
    fn test_checkout_form_encodes_lines_in_minor_units() {
        let request = CheckoutRequest {
            client_reference_id: "abc".into(),
            customer_email: "ana@example.com".into(),
            lines: vec![CheckoutLine {
                name: "Peony bouquet".into(),
                unit_price: Price::new(Decimal::new(3450, 2), CurrencyCode::USD),
                quantity: 2,
            }],
            success_url: "https://shop.test/ok".into(),
            cancel_url: "https://shop.test/cart".into(),
        };

        let form = client().checkout_form(&request).unwrap();
        let get = |k: &str| {
            form.iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("client_reference_id"), Some("abc"));
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("3450"));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(
            get("line_items[0][price_data][product_data][name]"),
            Some("Peony bouquet")
        );
    }

    #[test]
    fn test_session_deserializes() {
        let session: CheckoutSession = serde_json::from_str(
            r#"{"id":"cs_test_1","object":"checkout.session","url":null,
                "payment_status":"paid","status":"complete",
                "client_reference_id":"abc","amount_total":6900}"#,
        )
        .unwrap();
        assert!(session.is_paid());
        assert_eq!(session.amount_total, Some(6900));
    }

    #[test]
    fn test_path_segment_strips_separators() {
        assert_eq!(url_path_segment("cs_test_a1/../x?y"), "cs_test_a1xy");
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", client());
        assert!(!debug.contains("sk_test"));
    }
}
