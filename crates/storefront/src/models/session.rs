//! Session-stored state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bloomtable_core::ProductId;

/// Session keys.
pub mod keys {
    /// Key for the guest cart.
    pub const CART: &str = "cart";

    /// Key for the tracking token of the last order placed in this session.
    pub const LAST_ORDER: &str = "last_order";
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("quantity must be between 1 and {max}")]
    QuantityOutOfRange { max: u32 },

    #[error("cart cannot hold more than {max} different products")]
    TooManyLines { max: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Guest cart kept in the session. Prices are looked up at read time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub const MAX_QUANTITY: u32 = 99;
    pub const MAX_LINES: usize = 50;

    /// Add `quantity` of a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Fails if the resulting quantity leaves `1..=MAX_QUANTITY` or the cart
    /// would exceed `MAX_LINES` lines.
    pub fn add(&mut self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        check_quantity(quantity)?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product_id) {
            let total = line.quantity.saturating_add(quantity);
            check_quantity(total)?;
            line.quantity = total;
            return Ok(());
        }

        if self.lines.len() >= Self::MAX_LINES {
            return Err(CartError::TooManyLines {
                max: Self::MAX_LINES,
            });
        }
        self.lines.push(CartLine {
            product_id,
            quantity,
        });
        Ok(())
    }

    /// Set the quantity of a line; `0` removes it. Returns whether the
    /// product was in the cart.
    ///
    /// # Errors
    ///
    /// Fails if `quantity` exceeds `MAX_QUANTITY`.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> Result<bool, CartError> {
        if quantity == 0 {
            return Ok(self.remove(product_id));
        }
        check_quantity(quantity)?;

        Ok(self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .map(|line| line.quantity = quantity)
            .is_some())
    }

    /// Remove a line. Returns whether it was present.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

const fn check_quantity(quantity: u32) -> Result<(), CartError> {
    if quantity == 0 || quantity > Cart::MAX_QUANTITY {
        return Err(CartError::QuantityOutOfRange {
            max: Cart::MAX_QUANTITY,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_merges_lines() {
        let mut cart = Cart::default();
        assert_eq!(cart.add(ProductId::new(1), 2), Ok(()));
        assert_eq!(cart.add(ProductId::new(1), 3), Ok(()));
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn test_add_rejects_out_of_range() {
        let mut cart = Cart::default();
        assert!(cart.add(ProductId::new(1), 0).is_err());
        assert!(cart.add(ProductId::new(1), 100).is_err());
        assert_eq!(cart.add(ProductId::new(1), 99), Ok(()));
        assert_eq!(
            cart.add(ProductId::new(1), 1),
            Err(CartError::QuantityOutOfRange { max: 99 })
        );
        assert_eq!(cart.item_count(), 99);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = Cart::default();
        cart.add(ProductId::new(7), 1).ok();
        assert_eq!(cart.set_quantity(ProductId::new(7), 4), Ok(true));
        assert_eq!(cart.item_count(), 4);
        assert_eq!(cart.set_quantity(ProductId::new(7), 0), Ok(true));
        assert!(cart.is_empty());
        assert_eq!(cart.set_quantity(ProductId::new(7), 2), Ok(false));
    }

    #[test]
    fn test_line_limit() {
        let mut cart = Cart::default();
        for id in 0..50 {
            cart.add(ProductId::new(id), 1).ok();
        }
        assert_eq!(
            cart.add(ProductId::new(999), 1),
            Err(CartError::TooManyLines { max: 50 })
        );
    }
}
