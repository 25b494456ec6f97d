use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ServiceError;

/// Order lifecycle states.
///
/// ```text
///    new ──────────► in_delivery ──────────► completed   (terminal)
///     │                   │
///     └──────► cancelled ◄┘                              (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    InDelivery,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::InDelivery => "in_delivery",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a stored or user-supplied status string.
    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        match value {
            "new" => Ok(OrderStatus::New),
            "in_delivery" => Ok(OrderStatus::InDelivery),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(ServiceError::InvalidInput(format!(
                "Unknown order status: {other}"
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Whether the state machine permits moving from `self` to `to`.
    ///
    /// Same-state requests are rejected; no state may be re-entered,
    /// and nothing ever transitions back to `new`.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        matches!(
            (self, to),
            (OrderStatus::New, OrderStatus::InDelivery)
                | (OrderStatus::New, OrderStatus::Cancelled)
                | (OrderStatus::InDelivery, OrderStatus::Completed)
                | (OrderStatus::InDelivery, OrderStatus::Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
