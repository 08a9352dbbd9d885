//! Order representation, validation, and wire format

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{OrderId, Symbol};

/// What an order asks the service to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    MarketBuy,
    MarketSell,
    LimitBuy,
    LimitSell,
    Cancel,
    Modify,
}

impl OrderKind {
    /// Limit orders carry a price; nothing else does.
    #[inline]
    pub fn is_limit(self) -> bool {
        matches!(self, OrderKind::LimitBuy | OrderKind::LimitSell)
    }

    #[inline]
    pub fn is_market(self) -> bool {
        matches!(self, OrderKind::MarketBuy | OrderKind::MarketSell)
    }

    /// Sells are the only kind checked against holdings before transmission.
    #[inline]
    pub fn is_sell(self) -> bool {
        matches!(self, OrderKind::MarketSell | OrderKind::LimitSell)
    }

    #[inline]
    pub fn is_buy(self) -> bool {
        matches!(self, OrderKind::MarketBuy | OrderKind::LimitBuy)
    }

    /// Buys and sells, as opposed to instructions about other orders.
    #[inline]
    pub fn is_transaction(self) -> bool {
        self.is_buy() || self.is_sell()
    }

    /// Cancel and Modify point at the order they act on.
    #[inline]
    pub fn requires_reference(self) -> bool {
        matches!(self, OrderKind::Cancel | OrderKind::Modify)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderKind::MarketBuy => "MarketBuy",
            OrderKind::MarketSell => "MarketSell",
            OrderKind::LimitBuy => "LimitBuy",
            OrderKind::LimitSell => "LimitSell",
            OrderKind::Cancel => "Cancel",
            OrderKind::Modify => "Modify",
        };
        f.write_str(name)
    }
}

/// A validated client order.
///
/// Fields are private so that every `Order` in existence has passed
/// validation: price is present exactly for limit kinds, a reference id is
/// present exactly for Cancel/Modify, and quantity is positive (Cancel may be 0).
///
/// On the wire an order is
/// `{"order_type", "symbol", "qty", "price"?, "order_id_ref"?}`; deserializing
/// runs the same validation as construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireOrder", into = "WireOrder")]
pub struct Order {
    kind: OrderKind,
    symbol: Symbol,
    quantity: f64,
    price: Option<f64>,
    reference: Option<OrderId>,
}

impl Order {
    /// Build and validate an order of any kind.
    pub fn new(
        kind: OrderKind,
        symbol: impl Into<Symbol>,
        quantity: f64,
        price: Option<f64>,
        reference: Option<OrderId>,
    ) -> Result<Self, ValidationError> {
        let symbol = symbol.into();
        if symbol.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        if !quantity.is_finite() {
            return Err(ValidationError::NotFinite {
                kind,
                field: "quantity",
            });
        }
        match kind {
            OrderKind::Cancel => {
                if quantity < 0.0 {
                    return Err(ValidationError::NegativeCancelQuantity(quantity));
                }
            }
            _ => {
                if quantity <= 0.0 {
                    return Err(ValidationError::NonPositiveQuantity { kind, quantity });
                }
            }
        }

        match (kind.is_limit(), price) {
            (true, None) => return Err(ValidationError::MissingPrice { kind }),
            (true, Some(p)) if !p.is_finite() => {
                return Err(ValidationError::NotFinite {
                    kind,
                    field: "price",
                });
            }
            (true, Some(p)) if p <= 0.0 => return Err(ValidationError::NonPositivePrice(p)),
            (false, Some(_)) => return Err(ValidationError::UnexpectedPrice { kind }),
            _ => {}
        }

        match (kind.requires_reference(), reference) {
            (true, None) => return Err(ValidationError::MissingReference { kind }),
            (false, Some(_)) => return Err(ValidationError::UnexpectedReference { kind }),
            _ => {}
        }

        Ok(Self {
            kind,
            symbol,
            quantity,
            price,
            reference,
        })
    }

    pub fn market_buy(symbol: impl Into<Symbol>, quantity: f64) -> Result<Self, ValidationError> {
        Self::new(OrderKind::MarketBuy, symbol, quantity, None, None)
    }

    pub fn market_sell(symbol: impl Into<Symbol>, quantity: f64) -> Result<Self, ValidationError> {
        Self::new(OrderKind::MarketSell, symbol, quantity, None, None)
    }

    pub fn limit_buy(
        symbol: impl Into<Symbol>,
        quantity: f64,
        price: f64,
    ) -> Result<Self, ValidationError> {
        Self::new(OrderKind::LimitBuy, symbol, quantity, Some(price), None)
    }

    pub fn limit_sell(
        symbol: impl Into<Symbol>,
        quantity: f64,
        price: f64,
    ) -> Result<Self, ValidationError> {
        Self::new(OrderKind::LimitSell, symbol, quantity, Some(price), None)
    }

    /// Cancel the resting order `target`. Quantity is 0 by convention.
    pub fn cancel(symbol: impl Into<Symbol>, target: OrderId) -> Result<Self, ValidationError> {
        Self::new(OrderKind::Cancel, symbol, 0.0, None, Some(target))
    }

    /// Change the quantity of the resting order `target`.
    pub fn modify(
        symbol: impl Into<Symbol>,
        target: OrderId,
        quantity: f64,
    ) -> Result<Self, ValidationError> {
        Self::new(OrderKind::Modify, symbol, quantity, None, Some(target))
    }

    #[inline]
    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    #[inline]
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    #[inline]
    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// Limit price; `None` for every non-limit kind.
    #[inline]
    pub fn price(&self) -> Option<f64> {
        self.price
    }

    /// The order a Cancel/Modify acts on.
    #[inline]
    pub fn reference(&self) -> Option<OrderId> {
        self.reference
    }

    /// Serialize to the service's JSON representation.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse and validate the service's JSON representation.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.symbol, self.quantity)?;
        if let Some(price) = self.price {
            write!(f, " @ {price}")?;
        }
        if let Some(reference) = self.reference {
            write!(f, " -> {reference}")?;
        }
        Ok(())
    }
}

/// Unvalidated wire shape of an [`Order`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireOrder {
    pub order_type: OrderKind,
    pub symbol: Symbol,
    pub qty: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id_ref: Option<OrderId>,
}

impl TryFrom<WireOrder> for Order {
    type Error = ValidationError;

    fn try_from(wire: WireOrder) -> Result<Self, Self::Error> {
        Order::new(
            wire.order_type,
            wire.symbol,
            wire.qty,
            wire.price,
            wire.order_id_ref,
        )
    }
}

impl From<Order> for WireOrder {
    fn from(order: Order) -> Self {
        WireOrder {
            order_type: order.kind,
            symbol: order.symbol,
            qty: order.quantity,
            price: order.price,
            order_id_ref: order.reference,
        }
    }
}
