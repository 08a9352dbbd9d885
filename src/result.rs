//! Execution reports returned by the simulation service

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{OrderId, Symbol, Timestamp};

/// What an [`OrderResult`] reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderResultKind {
    Buy,
    Sell,
    Cancel,
    Modify,
}

impl OrderResultKind {
    /// Buy and Sell results move cash and holdings; the others do not.
    #[inline]
    pub fn is_fill(self) -> bool {
        matches!(self, OrderResultKind::Buy | OrderResultKind::Sell)
    }
}

impl fmt::Display for OrderResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderResultKind::Buy => "BUY",
            OrderResultKind::Sell => "SELL",
            OrderResultKind::Cancel => "CANCEL",
            OrderResultKind::Modify => "MODIFY",
        };
        f.write_str(name)
    }
}

/// A fill or lifecycle event reported by the service.
///
/// Wire form: `{"symbol", "value", "quantity", "date", "typ", "order_id",
/// "order_id_ref"?}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub symbol: Symbol,
    /// Total traded value (price × quantity) of this fill.
    #[serde(rename = "value")]
    pub traded_value: f64,
    pub quantity: f64,
    #[serde(rename = "date")]
    pub timestamp: Timestamp,
    #[serde(rename = "typ")]
    pub kind: OrderResultKind,
    pub order_id: OrderId,
    #[serde(
        rename = "order_id_ref",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub reference_order_id: Option<OrderId>,
}

impl OrderResult {
    /// A buy fill of `quantity` for a total of `traded_value`.
    pub fn buy(
        symbol: impl Into<Symbol>,
        traded_value: f64,
        quantity: f64,
        timestamp: Timestamp,
        order_id: OrderId,
    ) -> Self {
        Self::fill(OrderResultKind::Buy, symbol, traded_value, quantity, timestamp, order_id)
    }

    /// A sell fill of `quantity` for a total of `traded_value`.
    pub fn sell(
        symbol: impl Into<Symbol>,
        traded_value: f64,
        quantity: f64,
        timestamp: Timestamp,
        order_id: OrderId,
    ) -> Self {
        Self::fill(OrderResultKind::Sell, symbol, traded_value, quantity, timestamp, order_id)
    }

    /// Confirmation that cancel instruction `order_id` removed `target`.
    pub fn cancelled(
        symbol: impl Into<Symbol>,
        timestamp: Timestamp,
        order_id: OrderId,
        target: OrderId,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            traded_value: 0.0,
            quantity: 0.0,
            timestamp,
            kind: OrderResultKind::Cancel,
            order_id,
            reference_order_id: Some(target),
        }
    }

    /// Confirmation that modify instruction `order_id` changed the remaining
    /// quantity of `target` by `quantity_change`.
    pub fn modified(
        symbol: impl Into<Symbol>,
        quantity_change: f64,
        timestamp: Timestamp,
        order_id: OrderId,
        target: OrderId,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            traded_value: 0.0,
            quantity: quantity_change,
            timestamp,
            kind: OrderResultKind::Modify,
            order_id,
            reference_order_id: Some(target),
        }
    }

    fn fill(
        kind: OrderResultKind,
        symbol: impl Into<Symbol>,
        traded_value: f64,
        quantity: f64,
        timestamp: Timestamp,
        order_id: OrderId,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            traded_value,
            quantity,
            timestamp,
            kind,
            order_id,
            reference_order_id: None,
        }
    }

    /// Quantity with sign applied: positive for buys, negative for sells,
    /// `None` for non-fill results.
    pub fn signed_quantity(&self) -> Option<f64> {
        match self.kind {
            OrderResultKind::Buy => Some(self.quantity),
            OrderResultKind::Sell => Some(-self.quantity),
            OrderResultKind::Cancel | OrderResultKind::Modify => None,
        }
    }

    /// Average fill price, if this is a fill with non-zero quantity.
    pub fn average_price(&self) -> Option<f64> {
        if self.kind.is_fill() && self.quantity != 0.0 {
            Some(self.traded_value / self.quantity)
        } else {
            None
        }
    }
}

impl fmt::Display for OrderResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} - {}/{} {}",
            self.kind, self.order_id, self.quantity, self.traded_value, self.symbol
        )
    }
}
