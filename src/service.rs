//! The simulation service the Broker talks to, and its request/response shapes.
//!
//! The service is external: it owns the order book, prices, and fill
//! decisions. This module only fixes the contract. `tickbroker-client`
//! implements it over HTTP and [`crate::mock::MockService`] in memory.

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ValidationError};
use crate::order::{Order, WireOrder};
use crate::result::OrderResult;
use crate::snapshot::{DepthSnapshot, QuoteSnapshot, snapshot_time};
use crate::types::{OrderId, SessionId, Timestamp};

/// How to open a simulation session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitRequest {
    /// Replay a named dataset from start to finish.
    Dataset { dataset: String },
    /// Replay a date range at a fixed step frequency (seconds).
    Range {
        start_date: Timestamp,
        end_date: Timestamp,
        frequency: u64,
    },
}

/// Response to session initialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitResponse {
    #[serde(rename = "backtest_id", alias = "session_id")]
    pub session_id: SessionId,
    #[serde(default)]
    pub bbo: QuoteSnapshot,
    #[serde(default)]
    pub depth: DepthSnapshot,
}

/// An order the service acknowledged as resting, with its assigned id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsertedOrder {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub order: WireOrder,
}

impl InsertedOrder {
    pub fn new(order_id: OrderId, order: Order) -> Self {
        Self {
            order_id,
            order: order.into(),
        }
    }

    /// Validate the echoed order.
    pub fn into_order(self) -> Result<(OrderId, Order), ValidationError> {
        Ok((self.order_id, Order::try_from(self.order)?))
    }
}

/// Result of one simulation step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickResponse {
    /// False once the service has no further steps.
    pub has_next: bool,
    pub executed_orders: Vec<OrderResult>,
    pub inserted_orders: Vec<InsertedOrder>,
    pub bbo: QuoteSnapshot,
    #[serde(default)]
    pub depth: DepthSnapshot,
    /// Simulated time of the new snapshot, when the service reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub now: Option<Timestamp>,
}

impl TickResponse {
    /// An empty step that carries `bbo` as the next snapshot.
    pub fn step(bbo: QuoteSnapshot) -> Self {
        Self {
            has_next: true,
            executed_orders: Vec::new(),
            inserted_orders: Vec::new(),
            bbo,
            depth: DepthSnapshot::default(),
            now: None,
        }
    }

    /// The final step of a session.
    pub fn last() -> Self {
        Self {
            has_next: false,
            ..Self::step(QuoteSnapshot::default())
        }
    }

    pub fn with_executed(mut self, result: OrderResult) -> Self {
        self.executed_orders.push(result);
        self
    }

    pub fn with_inserted(mut self, order_id: OrderId, order: Order) -> Self {
        self.inserted_orders.push(InsertedOrder::new(order_id, order));
        self
    }

    pub fn with_depth(mut self, depth: DepthSnapshot) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_now(mut self, now: Timestamp) -> Self {
        self.now = Some(now);
        self
    }

    /// Time of the snapshot: `now` if present, else the latest quote time.
    pub fn snapshot_time(&self) -> Option<Timestamp> {
        self.now.or_else(|| snapshot_time(&self.bbo))
    }
}

/// Batch submission body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsertOrdersRequest {
    pub orders: Vec<Order>,
}

/// Session metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub version: String,
    #[serde(default)]
    pub dataset: Option<String>,
}

/// Time span covered by the service's data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub start_date: Timestamp,
    pub end_date: Timestamp,
}

/// Current simulated time of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowResponse {
    pub now: Timestamp,
    pub has_next: bool,
}

/// A remote, tick-driven market simulation.
///
/// Calls block until the service answers or the implementation gives up.
/// Implementations decide how (and whether) to retry; the Broker only sees
/// the final [`ServiceError`].
pub trait SimulationService {
    /// Open a session. Returns its id and the first market snapshot.
    fn init(&mut self, request: &InitRequest) -> Result<InitResponse, ServiceError>;

    /// Submit a batch of orders. Their effects show up in the next tick.
    fn insert_orders(&mut self, session: SessionId, orders: &[Order]) -> Result<(), ServiceError>;

    /// Advance the session by one step.
    fn tick(&mut self, session: SessionId) -> Result<TickResponse, ServiceError>;

    fn info(&mut self, session: SessionId) -> Result<SessionInfo, ServiceError>;

    fn dataset_info(&mut self) -> Result<DatasetInfo, ServiceError>;

    fn now(&mut self, session: SessionId) -> Result<NowResponse, ServiceError>;
}

impl<S: SimulationService + ?Sized> SimulationService for Box<S> {
    fn init(&mut self, request: &InitRequest) -> Result<InitResponse, ServiceError> {
        (**self).init(request)
    }

    fn insert_orders(&mut self, session: SessionId, orders: &[Order]) -> Result<(), ServiceError> {
        (**self).insert_orders(session, orders)
    }

    fn tick(&mut self, session: SessionId) -> Result<TickResponse, ServiceError> {
        (**self).tick(session)
    }

    fn info(&mut self, session: SessionId) -> Result<SessionInfo, ServiceError> {
        (**self).info(session)
    }

    fn dataset_info(&mut self) -> Result<DatasetInfo, ServiceError> {
        (**self).dataset_info()
    }

    fn now(&mut self, session: SessionId) -> Result<NowResponse, ServiceError> {
        (**self).now(session)
    }
}
