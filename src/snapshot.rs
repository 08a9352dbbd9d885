//! Market data snapshots: top-of-book quotes and multi-level depth.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::types::{Symbol, Timestamp};

/// Best bid/offer for one symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
    pub bid_volume: f64,
    pub ask_volume: f64,
    /// Simulated time the quote was taken
    #[serde(rename = "date", alias = "timestamp")]
    pub timestamp: Timestamp,
}

impl Quote {
    pub fn new(bid: f64, ask: f64, timestamp: Timestamp) -> Self {
        Self {
            bid,
            ask,
            bid_volume: 0.0,
            ask_volume: 0.0,
            timestamp,
        }
    }

    pub fn with_volumes(mut self, bid_volume: f64, ask_volume: f64) -> Self {
        self.bid_volume = bid_volume;
        self.ask_volume = ask_volume;
        self
    }

    /// Returns the spread (ask - bid).
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Returns the mid price ((bid + ask) / 2).
    pub fn mid_price(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

/// One price level of a depth snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    pub size: f64,
}

/// Multi-level book for one symbol.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Depth {
    /// Bid levels (best first)
    #[serde(default)]
    pub bids: Vec<Level>,
    /// Ask levels (best first)
    #[serde(default)]
    pub asks: Vec<Level>,
}

impl Depth {
    /// Returns the best bid level, if any.
    pub fn best_bid(&self) -> Option<Level> {
        self.bids.first().copied()
    }

    /// Returns the best ask level, if any.
    pub fn best_ask(&self) -> Option<Level> {
        self.asks.first().copied()
    }

    /// Returns total bid size across all levels.
    pub fn total_bid_size(&self) -> f64 {
        self.bids.iter().map(|l| l.size).sum()
    }

    /// Returns total ask size across all levels.
    pub fn total_ask_size(&self) -> f64 {
        self.asks.iter().map(|l| l.size).sum()
    }
}

/// Symbol → quote for one simulation step.
pub type QuoteSnapshot = FxHashMap<Symbol, Quote>;

/// Symbol → depth for one simulation step.
pub type DepthSnapshot = FxHashMap<Symbol, Depth>;

/// Timestamp of a quote snapshot: the latest quote time it contains.
///
/// Returns `None` for an empty snapshot.
pub fn snapshot_time(quotes: &QuoteSnapshot) -> Option<Timestamp> {
    quotes.values().map(|q| q.timestamp).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bbo_map_ignores_symbol_echo() {
        let json = r#"{
            "ABC": { "bid": 10.0, "bid_volume": 100.0, "ask": 11.0, "ask_volume": 200.0,
                     "date": 100, "symbol": "ABC" },
            "XYZ": { "bid": 5.0, "bid_volume": 1.0, "ask": 5.5, "ask_volume": 2.0, "date": 101 }
        }"#;
        let quotes: QuoteSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(quotes.len(), 2);
        let abc = &quotes[&Symbol::new("ABC")];
        assert_eq!(abc.bid, 10.0);
        assert_eq!(abc.ask_volume, 200.0);
        assert_eq!(abc.timestamp, 100);
        assert_eq!(snapshot_time(&quotes), Some(101));
    }

    #[test]
    fn quote_missing_bid_rejected() {
        let json = r#"{ "ask": 11.0, "bid_volume": 1.0, "ask_volume": 1.0, "date": 1 }"#;
        assert!(serde_json::from_str::<Quote>(json).is_err());
    }

    #[test]
    fn parse_depth() {
        let json = r#"{
            "ABC": {
                "bids": [ { "price": 10.0, "size": 5.0 }, { "price": 9.5, "size": 7.0 } ],
                "asks": [ { "price": 10.5, "size": 3.0 } ],
                "date": 100,
                "symbol": "ABC"
            }
        }"#;
        let depth: DepthSnapshot = serde_json::from_str(json).unwrap();
        let abc = &depth[&Symbol::new("ABC")];
        assert_eq!(abc.best_bid(), Some(Level { price: 10.0, size: 5.0 }));
        assert_eq!(abc.best_ask().map(|l| l.price), Some(10.5));
        assert_eq!(abc.total_bid_size(), 12.0);
        assert_eq!(abc.total_ask_size(), 3.0);
    }

    #[test]
    fn quote_spread_and_mid() {
        let q = Quote::new(10.0, 11.0, 0);
        assert_eq!(q.spread(), 1.0);
        assert_eq!(q.mid_price(), 10.5);
    }

    #[test]
    fn empty_snapshot_has_no_time() {
        assert_eq!(snapshot_time(&QuoteSnapshot::default()), None);
    }
}
