//! Status and kind enums shared by the storefront and admin.
//!
//! Every enum serializes to the exact lowercase strings stored in the backend
//! (`text` columns with `CHECK` constraints).

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when parsing one of the enums below from a string.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The string stored in the backend.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseEnumError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

string_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Whether an admin may move an order from `self` to `next`.
    ///
    /// Delivered and cancelled orders are terminal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::Processing | Self::Cancelled)
            | (Self::Processing, Self::Shipped | Self::Cancelled)
            | (Self::Shipped, Self::Delivered) => true,
            _ => false,
        }
    }
}

/// Payment status recorded on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

/// Per-user product interaction flags (`user_interactions.interaction_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    Like,
    Save,
    View,
    Share,
}

string_enum!(InteractionType, "interaction type", {
    Like => "like",
    Save => "save",
    View => "view",
    Share => "share",
});

impl InteractionType {
    /// The daily analytics counter bumped when this interaction is recorded.
    #[must_use]
    pub const fn metric(self) -> AnalyticsMetric {
        match self {
            Self::Like => AnalyticsMetric::Likes,
            Self::Save => AnalyticsMetric::Saves,
            Self::View => AnalyticsMetric::Views,
            Self::Share => AnalyticsMetric::Shares,
        }
    }
}

/// The six daily counters kept per product in `product_analytics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsMetric {
    Views,
    Likes,
    Saves,
    Shares,
    CartAdds,
    Purchases,
}

string_enum!(AnalyticsMetric, "analytics metric", {
    Views => "views",
    Likes => "likes",
    Saves => "saves",
    Shares => "shares",
    CartAdds => "cart_adds",
    Purchases => "purchases",
});
