//! Broker events and the observer the Broker reports them through.

use std::fmt;

use log::{debug, info, warn};
use serde::Serialize;

use crate::order::Order;
use crate::result::OrderResult;
use crate::types::{OrderId, SessionId, Timestamp};

/// Why an order was dropped at flush time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// Sell order with no long position to sell from.
    NoPosition { held: f64 },
    /// Sell order larger than the long position.
    ExceedsPosition { held: f64, requested: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoPosition { held } => write!(f, "no position to sell (held {held})"),
            RejectReason::ExceedsPosition { held, requested } => {
                write!(f, "sell of {requested} exceeds position {held}")
            }
        }
    }
}

/// An order that never reached the wire.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Rejection {
    pub order: Order,
    #[serde(flatten)]
    pub reason: RejectReason,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rejected {}: {}", self.order, self.reason)
    }
}

/// Receives everything the Broker does, in the order it happens.
///
/// All methods default to no-ops. The Broker owns its observer; pass
/// [`LogObserver`] (the default) to route events to the `log` facade.
pub trait BrokerObserver: Send {
    fn session_started(&mut self, _session: SessionId, _now: Option<Timestamp>) {}

    fn orders_submitted(&mut self, _session: SessionId, _orders: &[Order]) {}

    fn order_rejected(&mut self, _session: SessionId, _rejection: &Rejection) {}

    /// A result was reconciled. `cash` is the balance after it was applied.
    fn result_applied(&mut self, _session: SessionId, _result: &OrderResult, _cash: f64) {}

    fn order_resting(&mut self, _session: SessionId, _order_id: OrderId, _order: &Order) {}

    fn tick_completed(&mut self, _session: SessionId, _now: Option<Timestamp>, _value: f64) {}

    fn session_finished(&mut self, _session: SessionId) {}
}

/// Observer that forwards every event to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl BrokerObserver for LogObserver {
    fn session_started(&mut self, session: SessionId, now: Option<Timestamp>) {
        info!("{session} started at {now:?}");
    }

    fn orders_submitted(&mut self, session: SessionId, orders: &[Order]) {
        debug!("{session} submitting {} orders", orders.len());
    }

    fn order_rejected(&mut self, session: SessionId, rejection: &Rejection) {
        warn!("{session} {rejection}");
    }

    fn result_applied(&mut self, session: SessionId, result: &OrderResult, cash: f64) {
        debug!("{session} executed {result}, cash now {cash}");
    }

    fn order_resting(&mut self, session: SessionId, order_id: OrderId, order: &Order) {
        debug!("{session} resting {order_id}: {order}");
    }

    fn tick_completed(&mut self, session: SessionId, now: Option<Timestamp>, value: f64) {
        debug!("{session}-{now:?} total value {value}");
    }

    fn session_finished(&mut self, session: SessionId) {
        info!("{session} simulation finished");
    }
}

/// Observer that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl BrokerObserver for NullObserver {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_reason_display() {
        let r = RejectReason::ExceedsPosition {
            held: 5.0,
            requested: 6.0,
        };
        assert_eq!(r.to_string(), "sell of 6 exceeds position 5");
        assert_eq!(
            RejectReason::NoPosition { held: 0.0 }.to_string(),
            "no position to sell (held 0)"
        );
    }

    #[test]
    fn rejection_serializes_flat() {
        let rejection = Rejection {
            order: Order::market_sell("ABC", 5.0).unwrap(),
            reason: RejectReason::NoPosition { held: 0.0 },
        };
        let json = serde_json::to_value(&rejection).unwrap();
        assert_eq!(json["reason"], "no_position");
        assert_eq!(json["held"], 0.0);
        assert_eq!(json["order"]["order_type"], "MarketSell");
    }
}
