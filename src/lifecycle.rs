//! Order lifecycle tracking: pending (unsent) and resting (acknowledged, unfilled) orders.

use rustc_hash::FxHashMap;

use crate::error::BrokerError;
use crate::event::{RejectReason, Rejection};
use crate::ledger::Ledger;
use crate::order::Order;
use crate::result::OrderResult;
use crate::types::{OrderId, is_flat};

/// A resting order and how much of it is still open.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedOrder {
    pub order: Order,
    pub remaining: f64,
}

/// What a fill did to the order it was reported against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FillProgress {
    /// The order was never resting (filled on arrival).
    Untracked,
    /// Still resting with this much left.
    Partial { remaining: f64 },
    /// Fully filled and no longer tracked.
    Completed,
}

/// Output of [`LifecycleTracker::flush`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Flush {
    /// Orders to transmit, oldest first.
    pub accepted: Vec<Order>,
    pub rejected: Vec<Rejection>,
}

/// Check an order against current holdings before it is transmitted.
///
/// Only sells are checked: they need a long position at least as large as
/// the order. Pure, so the same inputs always give the same verdict.
pub fn validate_for_flush(order: &Order, ledger: &Ledger) -> Result<(), RejectReason> {
    if !order.kind().is_sell() {
        return Ok(());
    }
    let held = ledger.position(order.symbol());
    if held <= 0.0 {
        return Err(RejectReason::NoPosition { held });
    }
    if order.quantity() > held && !is_flat(order.quantity() - held, held) {
        return Err(RejectReason::ExceedsPosition {
            held,
            requested: order.quantity(),
        });
    }
    Ok(())
}

/// Pending and resting order sets.
///
/// Filled and cancelled orders are terminal and simply leave the resting set;
/// the trade log kept by the Broker is their record.
#[derive(Clone, Debug, Default)]
pub struct LifecycleTracker {
    pending: Vec<Order>,
    unexecuted: FxHashMap<OrderId, TrackedOrder>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // === Queries ===

    /// Orders waiting for the next flush, oldest first.
    pub fn pending(&self) -> &[Order] {
        &self.pending
    }

    /// Resting orders keyed by service-assigned id.
    pub fn unexecuted(&self) -> &FxHashMap<OrderId, TrackedOrder> {
        &self.unexecuted
    }

    pub fn get(&self, id: OrderId) -> Option<&TrackedOrder> {
        self.unexecuted.get(&id)
    }

    pub fn is_resting(&self, id: OrderId) -> bool {
        self.unexecuted.contains_key(&id)
    }

    // === Pending ===

    /// Buffer an order for the next flush. No economic checks happen here.
    pub fn enqueue(&mut self, order: Order) {
        self.pending.push(order);
    }

    /// Drain the pending buffer and split it into accepted and rejected orders.
    ///
    /// Every order is checked against `ledger` as it stands now, not as it
    /// would be after earlier pending orders execute, so two sells can both
    /// pass against one position.
    pub fn flush(&mut self, ledger: &Ledger) -> Flush {
        let mut flush = Flush::default();
        for order in self.pending.drain(..) {
            match validate_for_flush(&order, ledger) {
                Ok(()) => flush.accepted.push(order),
                Err(reason) => flush.rejected.push(Rejection { order, reason }),
            }
        }
        flush
    }

    // === Resting ===

    /// Start tracking an order the service acknowledged as resting.
    pub fn record_inserted(&mut self, id: OrderId, order: Order) -> Result<(), BrokerError> {
        if self.unexecuted.contains_key(&id) {
            return Err(BrokerError::LifecycleInconsistency {
                order_id: id,
                detail: "service inserted an id that is already resting".into(),
            });
        }
        let remaining = order.quantity();
        self.unexecuted.insert(id, TrackedOrder { order, remaining });
        Ok(())
    }

    /// Reduce a resting order by a fill's quantity, dropping it once filled.
    pub fn record_fill(&mut self, result: &OrderResult) -> FillProgress {
        let Some(tracked) = self.unexecuted.get_mut(&result.order_id) else {
            return FillProgress::Untracked;
        };
        let scale = tracked.remaining.max(result.quantity);
        tracked.remaining -= result.quantity;
        if tracked.remaining <= 0.0 || is_flat(tracked.remaining, scale) {
            self.unexecuted.remove(&result.order_id);
            FillProgress::Completed
        } else {
            FillProgress::Partial {
                remaining: tracked.remaining,
            }
        }
    }

    /// Remove a cancel instruction and the order it cancelled.
    ///
    /// Both must be resting; otherwise nothing is removed and the desync is
    /// reported.
    pub fn record_cancel(&mut self, result: &OrderResult) -> Result<(), BrokerError> {
        let target = self.referenced(result)?;
        if !self.unexecuted.contains_key(&result.order_id) {
            return Err(BrokerError::LifecycleInconsistency {
                order_id: result.order_id,
                detail: "cancel instruction was never tracked".into(),
            });
        }
        self.unexecuted.remove(&result.order_id);
        self.unexecuted.remove(&target);
        Ok(())
    }

    /// Apply a quantity change to a resting order.
    ///
    /// The result's quantity is added to the target's remaining quantity and
    /// the target is dropped if nothing remains. The modify instruction itself
    /// leaves the resting set if it was ever there.
    pub fn record_modify(&mut self, result: &OrderResult) -> Result<(), BrokerError> {
        let target = self.referenced(result)?;
        self.unexecuted.remove(&result.order_id);
        if let Some(tracked) = self.unexecuted.get_mut(&target) {
            let scale = tracked.remaining.max(result.quantity.abs());
            tracked.remaining += result.quantity;
            if tracked.remaining <= 0.0 || is_flat(tracked.remaining, scale) {
                self.unexecuted.remove(&target);
            }
        }
        Ok(())
    }

    /// The tracked order a Cancel/Modify result points at.
    fn referenced(&self, result: &OrderResult) -> Result<OrderId, BrokerError> {
        let target = result
            .reference_order_id
            .ok_or_else(|| BrokerError::LifecycleInconsistency {
                order_id: result.order_id,
                detail: format!("{} result without a reference order id", result.kind),
            })?;
        if !self.unexecuted.contains_key(&target) {
            return Err(BrokerError::LifecycleInconsistency {
                order_id: target,
                detail: format!("{} references an order that is not resting", result.kind),
            });
        }
        Ok(target)
    }
}
