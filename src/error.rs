//! Error types: order validation, service failures, and broker errors.

use crate::order::{Order, OrderKind};
use crate::types::{OrderId, Symbol};

/// Errors returned when constructing an [`Order`].
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("symbol must not be empty")]
    EmptySymbol,

    /// Quantity must be greater than zero (Cancel orders are exempt).
    #[error("{kind} quantity must be greater than zero, got {quantity}")]
    NonPositiveQuantity { kind: OrderKind, quantity: f64 },

    /// Quantity or price is NaN or infinite.
    #[error("{kind} {field} must be finite")]
    NotFinite { kind: OrderKind, field: &'static str },

    #[error("cancel quantity must not be negative, got {0}")]
    NegativeCancelQuantity(f64),

    #[error("{kind} order must not carry a price")]
    UnexpectedPrice { kind: OrderKind },

    #[error("{kind} order requires a price")]
    MissingPrice { kind: OrderKind },

    #[error("limit price must be greater than zero, got {0}")]
    NonPositivePrice(f64),

    #[error("{kind} order requires a reference order id")]
    MissingReference { kind: OrderKind },

    #[error("{kind} order must not carry a reference order id")]
    UnexpectedReference { kind: OrderKind },
}

/// Failures reported by a [`SimulationService`](crate::SimulationService) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The request never produced a response (connection, timeout, 5xx after retries).
    #[error("transport error: {0}")]
    Transport(String),

    /// A response arrived but was malformed, incomplete, or refused.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Errors surfaced by the [`Broker`](crate::Broker) to its caller.
///
/// None of these terminate the process; the caller decides whether to halt.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("invalid order: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid broker configuration: {0}")]
    Config(String),

    /// Applying a fill would drive cash below zero. The ledger is left as it
    /// was before the fill.
    #[error("insolvent: {symbol} fill of {traded_value} against cash {cash}")]
    Insolvency {
        symbol: Symbol,
        order_id: OrderId,
        traded_value: f64,
        cash: f64,
    },

    #[error("no quote for held symbol {0}")]
    StaleQuote(Symbol),

    /// Retries exhausted. `unsent` holds drained orders that were not
    /// confirmed as transmitted, so the caller can enqueue them again.
    #[error("transport error: {reason}")]
    Transport { reason: String, unsent: Vec<Order> },

    #[error("protocol error: {0}")]
    Protocol(String),

    /// The service referenced an order the client does not track.
    #[error("lifecycle inconsistency for {order_id}: {detail}")]
    LifecycleInconsistency { order_id: OrderId, detail: String },

    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
}

impl BrokerError {
    /// True when the broker is unchanged apart from the drained buffer and
    /// calling `tick` again can make progress.
    ///
    /// This is about the next tick, not the failed request. A transport
    /// failure hands back `unsent` for resubmission. A protocol error does
    /// not: a refused batch would be refused again, so the next tick goes on
    /// without it, and a malformed step is simply followed by the next one.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BrokerError::Transport { .. } | BrokerError::Protocol(_))
    }
}

impl From<ServiceError> for BrokerError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Transport(reason) => BrokerError::Transport {
                reason,
                unsent: Vec::new(),
            },
            ServiceError::Protocol(msg) => BrokerError::Protocol(msg),
        }
    }
}
