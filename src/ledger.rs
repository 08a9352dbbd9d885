//! Portfolio ledger: cash, signed holdings, and mark-to-market valuation.

use rustc_hash::FxHashMap;

use crate::error::BrokerError;
use crate::result::{OrderResult, OrderResultKind};
use crate::snapshot::QuoteSnapshot;
use crate::types::{Symbol, is_flat};

/// Cash balance and per-symbol signed positions.
///
/// Only [`Ledger::apply_fill`] mutates state after construction. Cash never
/// goes negative: a fill that would do so is refused and leaves the ledger
/// untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct Ledger {
    cash: f64,
    /// Positive = long, negative = short. Flat symbols are removed.
    holdings: FxHashMap<Symbol, f64>,
}

impl Ledger {
    /// Create a ledger holding only cash.
    pub fn new(initial_cash: f64) -> Self {
        debug_assert!(
            initial_cash >= 0.0,
            "initial_cash must be non-negative, got {initial_cash}"
        );
        Self {
            cash: initial_cash,
            holdings: FxHashMap::default(),
        }
    }

    // === Queries ===

    #[inline]
    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Signed position in `symbol`; 0 if never traded or flat.
    pub fn position(&self, symbol: &Symbol) -> f64 {
        self.holdings.get(symbol).copied().unwrap_or(0.0)
    }

    /// Iterator over all non-flat positions.
    pub fn holdings(&self) -> impl Iterator<Item = (&Symbol, f64)> {
        self.holdings.iter().map(|(sym, qty)| (sym, *qty))
    }

    /// Number of non-flat positions.
    pub fn open_positions(&self) -> usize {
        self.holdings.len()
    }

    /// Cash plus every position marked at its bid in `quotes`.
    ///
    /// Fails with [`BrokerError::StaleQuote`] if any held symbol is missing
    /// from the snapshot.
    pub fn current_value(&self, quotes: &QuoteSnapshot) -> Result<f64, BrokerError> {
        let mut value = self.cash;
        for (symbol, qty) in &self.holdings {
            let quote = quotes
                .get(symbol)
                .ok_or_else(|| BrokerError::StaleQuote(symbol.clone()))?;
            value += qty * quote.bid;
        }
        Ok(value)
    }

    // === Mutation ===

    /// Apply a Buy or Sell result to cash and holdings.
    ///
    /// Cancel and Modify results are not fills and are ignored here.
    /// Returns the cash balance after the fill.
    pub fn apply_fill(&mut self, result: &OrderResult) -> Result<f64, BrokerError> {
        let (cash_after, signed_qty) = match result.kind {
            OrderResultKind::Buy => (self.cash - result.traded_value, result.quantity),
            OrderResultKind::Sell => (self.cash + result.traded_value, -result.quantity),
            OrderResultKind::Cancel | OrderResultKind::Modify => return Ok(self.cash),
        };

        if cash_after < 0.0 {
            return Err(BrokerError::Insolvency {
                symbol: result.symbol.clone(),
                order_id: result.order_id,
                traded_value: result.traded_value,
                cash: self.cash,
            });
        }

        self.cash = cash_after;
        let position = self.holdings.entry(result.symbol.clone()).or_insert(0.0);
        let scale = position.abs().max(signed_qty.abs());
        *position += signed_qty;
        if is_flat(*position, scale) {
            self.holdings.remove(&result.symbol);
        }
        Ok(cash_after)
    }
}
