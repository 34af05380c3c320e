//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `checkout` - Cart validation, order placement and payment verification

pub mod checkout;

pub use checkout::{CheckoutError, CheckoutForm, CheckoutService, StartedCheckout, Verification};
