//! Core identifiers: Symbol, OrderId, SessionId, Timestamp, plus quantity tolerance

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ticker symbol as reported by the simulation service.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol from any string-like value.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Order identifier. Always assigned by the service, never by the client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{}", self.0)
    }
}

/// Opaque session identifier handed out by the service at initialization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Simulated time as reported by the service (seconds since epoch).
pub type Timestamp = i64;

/// Relative tolerance under which a quantity counts as zero.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// True when `qty` is zero up to the rounding left by summing quantities of
/// magnitude `scale`.
///
/// Fractional fills do not cancel exactly in binary floating point
/// (`0.1 + 0.2 - 0.3` is about `5.6e-17`), so exact comparison would leave
/// dust positions and orders behind.
#[inline]
pub fn is_flat(qty: f64, scale: f64) -> bool {
    qty.abs() <= QUANTITY_EPSILON * scale.abs().max(1.0)
}
