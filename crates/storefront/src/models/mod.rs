//! Domain models for the storefront.

pub mod catalog;
pub mod content;
pub mod order;
pub mod session;

pub use catalog::{Category, Product};
pub use content::{Comment, ContentSection, GalleryImage, NewComment};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderSummary};
pub use session::{Cart, CartError, CartLine, keys as session_keys};
