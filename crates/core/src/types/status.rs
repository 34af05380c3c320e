//! Status enums for orders, payments and notifications.
//!
//! All statuses are stored as `TEXT` columns using their `snake_case` names.

use serde::{Deserialize, Serialize};

/// Implement `Display`, `FromStr` and text-backed `sqlx` support for a
/// status enum that exposes `ALL` and `as_str()`.
macro_rules! text_enum {
    ($name:ident, $label:literal) => {
        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| format!(concat!("invalid ", $label, ": {}"), s))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let s = <&str as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(s.parse::<Self>()?)
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <&str as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

/// Order lifecycle status.
///
/// ```text
/// pending -> paid -> preparing -> ready -> completed
///    \________\__________\_________\-----> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, awaiting payment.
    #[default]
    Pending,
    /// Payment confirmed by the provider.
    Paid,
    /// Kitchen / florist is working on it.
    Preparing,
    /// Ready for pickup or out for delivery.
    Ready,
    /// Handed over.
    Completed,
    /// Cancelled before completion.
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Paid,
        Self::Preparing,
        Self::Ready,
        Self::Completed,
        Self::Cancelled,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether an order may move from `self` to `next`.
    ///
    /// Forward moves may skip steps (a cash pickup order can go straight from
    /// `pending` to `preparing`), backward moves are never allowed, and any
    /// non-terminal order can be cancelled.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        if self.is_terminal() || *self == next {
            return false;
        }
        if next == Self::Cancelled {
            return true;
        }
        self.rank() < next.rank()
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Paid => 1,
            Self::Preparing => 2,
            Self::Ready => 3,
            Self::Completed => 4,
            Self::Cancelled => 5,
        }
    }
}

text_enum!(OrderStatus, "order status");

/// Payment status as reported by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [Self; 4] = [Self::Unpaid, Self::Paid, Self::Failed, Self::Refunded];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

text_enum!(PaymentStatus, "payment status");

/// Kind of an order notification shown in the admin console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewOrder,
    PaymentReceived,
    StatusChanged,
    OrderCancelled,
}

impl NotificationKind {
    pub const ALL: [Self; 4] = [
        Self::NewOrder,
        Self::PaymentReceived,
        Self::StatusChanged,
        Self::OrderCancelled,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NewOrder => "new_order",
            Self::PaymentReceived => "payment_received",
            Self::StatusChanged => "status_changed",
            Self::OrderCancelled => "order_cancelled",
        }
    }
}

text_enum!(NotificationKind, "notification kind");

/// How the customer receives the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentMethod {
    #[default]
    Pickup,
    Delivery,
}

impl FulfillmentMethod {
    pub const ALL: [Self; 2] = [Self::Pickup, Self::Delivery];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pickup => "pickup",
            Self::Delivery => "delivery",
        }
    }
}

text_enum!(FulfillmentMethod, "fulfillment method");

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_forward_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Preparing));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Preparing));
        assert!(OrderStatus::Ready.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn test_order_status_rejects_backward_and_terminal() {
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Paid));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Paid));
    }

    #[test]
    fn test_any_open_order_can_be_cancelled() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Preparing,
            OrderStatus::Ready,
        ] {
            assert!(status.can_transition_to(OrderStatus::Cancelled), "{status}");
        }
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        for kind in NotificationKind::ALL {
            assert_eq!(kind.to_string().parse::<NotificationKind>().unwrap(), kind);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_serde_matches_as_str() {
        let json = serde_json::to_string(&NotificationKind::PaymentReceived).unwrap();
        assert_eq!(json, "\"payment_received\"");
        let json = serde_json::to_string(&FulfillmentMethod::Delivery).unwrap();
        assert_eq!(json, "\"delivery\"");
    }
}
