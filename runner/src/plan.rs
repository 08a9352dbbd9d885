//! Order plan (plan.json) loading and validation.
//!
//! A plan lists orders keyed by the tick they should be submitted on:
//!
//! ```json
//! { "orders": [ { "step": 0, "order_type": "MarketBuy", "symbol": "ABC", "qty": 10.0 } ] }
//! ```

use std::path::Path;

use serde::Deserialize;
use tickbroker::{Order, WireOrder};

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct RawPlan {
    orders: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    step: u64,
    #[serde(flatten)]
    order: WireOrder,
}

/// An order and the tick it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOrder {
    pub step: u64,
    pub order: Order,
}

/// Validated orders sorted by step; file order is kept within a step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    orders: Vec<PlannedOrder>,
}

impl Plan {
    /// Load and validate a plan file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::PlanRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&contents)
    }

    /// Parse from a JSON string (useful for testing).
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawPlan = serde_json::from_str(json)?;
        let mut orders = raw
            .orders
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let order = Order::try_from(entry.order)
                    .map_err(|e| Error::Plan(format!("order #{i} (step {}): {e}", entry.step)))?;
                Ok(PlannedOrder {
                    step: entry.step,
                    order,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        orders.sort_by_key(|o| o.step);
        Ok(Self { orders })
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn orders(&self) -> &[PlannedOrder] {
        &self.orders
    }

    /// Orders to submit before tick `step`.
    pub fn orders_for(&self, step: u64) -> impl Iterator<Item = &Order> {
        self.orders
            .iter()
            .filter(move |o| o.step == step)
            .map(|o| &o.order)
    }

    /// Highest step with an order, if any.
    pub fn last_step(&self) -> Option<u64> {
        self.orders.last().map(|o| o.step)
    }
}
