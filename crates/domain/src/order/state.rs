//! Order state machine.

use serde::{Deserialize, Serialize};

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Draft ──► Placed
///   │         │
///   └─────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderState {
    /// Order is open, lines can be added/changed/removed.
    #[default]
    Draft,

    /// Order was placed by the customer.
    Placed,

    /// Order was cancelled (terminal state).
    Cancelled,
}

impl OrderState {
    /// Returns true if lines can be modified in this state.
    pub fn can_modify_lines(&self) -> bool {
        matches!(self, OrderState::Draft)
    }

    /// Returns true if the order can be placed in this state.
    pub fn can_place(&self) -> bool {
        matches!(self, OrderState::Draft)
    }

    /// Returns true if the order can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderState::Draft | OrderState::Placed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Cancelled)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Draft => "Draft",
            OrderState::Placed => "Placed",
            OrderState::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
