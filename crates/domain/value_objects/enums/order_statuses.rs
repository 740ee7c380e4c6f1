use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
        }
    }

    /// Unknown values are treated as `failed` so no transition can start from them.
    pub fn from_str(value: &str) -> Self {
        match value {
            "pending" => OrderStatus::Pending,
            "paid" => OrderStatus::Paid,
            _ => OrderStatus::Failed,
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid) | (OrderStatus::Pending, OrderStatus::Failed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_orders_can_move_to_a_terminal_state() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Failed));

        for terminal in [OrderStatus::Paid, OrderStatus::Failed] {
            for next in [OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }

        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn parses_stored_values() {
        assert_eq!(OrderStatus::from_str("pending"), OrderStatus::Pending);
        assert_eq!(OrderStatus::from_str("paid"), OrderStatus::Paid);
        assert_eq!(OrderStatus::from_str("failed"), OrderStatus::Failed);
        assert_eq!(OrderStatus::from_str("refunded"), OrderStatus::Failed);
        assert_eq!(OrderStatus::Paid.to_string(), "paid");
    }
}
