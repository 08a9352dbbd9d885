//! In-memory simulation service for tests: scripted ticks, recorded submissions.
//!
//! Use this to drive a [`Broker`](crate::Broker) without a network.
//!
//! ```
//! use tickbroker::mock::MockService;
//! use tickbroker::{Broker, Order, OrderId, OrderResult, TickResponse};
//!
//! let mut service = MockService::builder()
//!     .with_quote("ABC", 10.0, 10.5)
//!     .build();
//! let next = service.initial_quotes();
//! service.push_tick(
//!     TickResponse::step(next).with_executed(OrderResult::buy("ABC", 100.0, 10.0, 1, OrderId(1))),
//! );
//!
//! let mut broker = Broker::builder()
//!     .initial_cash(1000.0)
//!     .dataset("test")
//!     .connect(service)
//!     .unwrap();
//! broker.insert_order(Order::market_buy("ABC", 10.0).unwrap()).unwrap();
//! broker.tick().unwrap();
//! assert_eq!(broker.cash(), 900.0);
//! ```

use std::collections::VecDeque;

use crate::error::ServiceError;
use crate::order::Order;
use crate::service::{
    DatasetInfo, InitRequest, InitResponse, NowResponse, SessionInfo, SimulationService,
    TickResponse,
};
use crate::snapshot::{DepthSnapshot, Quote, QuoteSnapshot};
use crate::types::{SessionId, Symbol, Timestamp};

/// A recorded order batch for assertion in tests.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedBatch {
    pub session: SessionId,
    pub orders: Vec<Order>,
}

/// Builder for [`MockService`].
pub struct MockServiceBuilder {
    session: SessionId,
    start: Timestamp,
    quotes: QuoteSnapshot,
    depth: DepthSnapshot,
    dataset: DatasetInfo,
}

impl MockServiceBuilder {
    pub fn session(mut self, id: u64) -> Self {
        self.session = SessionId(id);
        self
    }

    /// Simulated time of the initial snapshot.
    pub fn start_time(mut self, ts: Timestamp) -> Self {
        self.start = ts;
        self.dataset.start_date = ts;
        self
    }

    pub fn with_quote(mut self, symbol: &str, bid: f64, ask: f64) -> Self {
        self.quotes
            .insert(Symbol::new(symbol), Quote::new(bid, ask, self.start));
        self
    }

    pub fn with_depth(mut self, depth: DepthSnapshot) -> Self {
        self.depth = depth;
        self
    }

    pub fn dataset_range(mut self, start_date: Timestamp, end_date: Timestamp) -> Self {
        self.dataset = DatasetInfo {
            start_date,
            end_date,
        };
        self
    }

    pub fn build(self) -> MockService {
        // Quotes added before start_time() carry the old timestamp.
        let start = self.start;
        let quotes = self
            .quotes
            .into_iter()
            .map(|(sym, q)| (sym, Quote { timestamp: start, ..q }))
            .collect();
        MockService {
            session: self.session,
            initial_quotes: quotes,
            initial_depth: self.depth,
            dataset: self.dataset,
            script: VecDeque::new(),
            init_requests: Vec::new(),
            batches: Vec::new(),
            ticks_served: 0,
            now: start,
            has_next: true,
            fail_init: None,
            fail_inserts: VecDeque::new(),
            fail_ticks: VecDeque::new(),
        }
    }
}

/// A scripted [`SimulationService`] that records every submission.
///
/// Each `tick` pops the next scripted [`TickResponse`]; once the script is
/// exhausted the session reports `has_next: false`.
pub struct MockService {
    session: SessionId,
    initial_quotes: QuoteSnapshot,
    initial_depth: DepthSnapshot,
    dataset: DatasetInfo,
    script: VecDeque<TickResponse>,
    init_requests: Vec<InitRequest>,
    batches: Vec<RecordedBatch>,
    ticks_served: usize,
    now: Timestamp,
    has_next: bool,
    fail_init: Option<ServiceError>,
    fail_inserts: VecDeque<ServiceError>,
    fail_ticks: VecDeque<ServiceError>,
}

impl MockService {
    pub fn builder() -> MockServiceBuilder {
        MockServiceBuilder {
            session: SessionId(0),
            start: 0,
            quotes: QuoteSnapshot::default(),
            depth: DepthSnapshot::default(),
            dataset: DatasetInfo {
                start_date: 0,
                end_date: 0,
            },
        }
    }

    /// Queue the response for a future tick.
    pub fn push_tick(&mut self, response: TickResponse) {
        self.script.push_back(response);
    }

    /// Fail the next `init` call.
    pub fn fail_init(&mut self, err: ServiceError) {
        self.fail_init = Some(err);
    }

    /// Fail the next `insert_orders` call (queued; one failure per call).
    pub fn fail_next_insert(&mut self, err: ServiceError) {
        self.fail_inserts.push_back(err);
    }

    /// Fail the next `tick` call without consuming a scripted step.
    pub fn fail_next_tick(&mut self, err: ServiceError) {
        self.fail_ticks.push_back(err);
    }

    /// The snapshot handed out by `init`.
    pub fn initial_quotes(&self) -> QuoteSnapshot {
        self.initial_quotes.clone()
    }

    /// Every successfully submitted batch, oldest first.
    pub fn submitted_batches(&self) -> &[RecordedBatch] {
        &self.batches
    }

    /// Every successfully submitted order across all batches, oldest first.
    pub fn submitted_orders(&self) -> Vec<Order> {
        self.batches
            .iter()
            .flat_map(|b| b.orders.iter().cloned())
            .collect()
    }

    pub fn init_requests(&self) -> &[InitRequest] {
        &self.init_requests
    }

    pub fn ticks_served(&self) -> usize {
        self.ticks_served
    }

    /// Scripted steps not yet served.
    pub fn remaining_ticks(&self) -> usize {
        self.script.len()
    }

    fn check_session(&self, session: SessionId) -> Result<(), ServiceError> {
        if session != self.session {
            return Err(ServiceError::Protocol(format!("unknown session {session}")));
        }
        Ok(())
    }
}

impl SimulationService for MockService {
    fn init(&mut self, request: &InitRequest) -> Result<InitResponse, ServiceError> {
        if let Some(err) = self.fail_init.take() {
            return Err(err);
        }
        self.init_requests.push(request.clone());
        Ok(InitResponse {
            session_id: self.session,
            bbo: self.initial_quotes.clone(),
            depth: self.initial_depth.clone(),
        })
    }

    fn insert_orders(&mut self, session: SessionId, orders: &[Order]) -> Result<(), ServiceError> {
        self.check_session(session)?;
        if let Some(err) = self.fail_inserts.pop_front() {
            return Err(err);
        }
        self.batches.push(RecordedBatch {
            session,
            orders: orders.to_vec(),
        });
        Ok(())
    }

    fn tick(&mut self, session: SessionId) -> Result<TickResponse, ServiceError> {
        self.check_session(session)?;
        if let Some(err) = self.fail_ticks.pop_front() {
            return Err(err);
        }
        let response = self.script.pop_front().unwrap_or_else(TickResponse::last);
        self.ticks_served += 1;
        self.has_next = response.has_next;
        if let Some(ts) = response.snapshot_time() {
            self.now = ts;
        }
        Ok(response)
    }

    fn info(&mut self, session: SessionId) -> Result<SessionInfo, ServiceError> {
        self.check_session(session)?;
        let dataset = self.init_requests.last().and_then(|req| match req {
            InitRequest::Dataset { dataset } => Some(dataset.clone()),
            InitRequest::Range { .. } => None,
        });
        Ok(SessionInfo {
            version: "mock".into(),
            dataset,
        })
    }

    fn dataset_info(&mut self) -> Result<DatasetInfo, ServiceError> {
        Ok(self.dataset)
    }

    fn now(&mut self, session: SessionId) -> Result<NowResponse, ServiceError> {
        self.check_session(session)?;
        Ok(NowResponse {
            now: self.now,
            has_next: self.has_next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::OrderResult;
    use crate::types::OrderId;

    fn dataset() -> InitRequest {
        InitRequest::Dataset {
            dataset: "test".into(),
        }
    }

    #[test]
    fn builder_basic() {
        let mut service = MockService::builder()
            .session(4)
            .start_time(100)
            .with_quote("ABC", 10.0, 11.0)
            .build();

        let init = service.init(&dataset()).unwrap();
        assert_eq!(init.session_id, SessionId(4));
        assert_eq!(init.bbo[&Symbol::new("ABC")].timestamp, 100);
        assert_eq!(service.init_requests().len(), 1);
    }

    #[test]
    fn script_then_finished() {
        let mut service = MockService::builder().build();
        service.push_tick(
            TickResponse::step(QuoteSnapshot::default())
                .with_executed(OrderResult::buy("ABC", 1.0, 1.0, 5, OrderId(1)))
                .with_now(5),
        );

        let first = service.tick(SessionId(0)).unwrap();
        assert!(first.has_next);
        assert_eq!(first.executed_orders.len(), 1);
        assert_eq!(service.now(SessionId(0)).unwrap().now, 5);

        let second = service.tick(SessionId(0)).unwrap();
        assert!(!second.has_next);
        assert!(!service.now(SessionId(0)).unwrap().has_next);
        assert_eq!(service.ticks_served(), 2);
    }

    #[test]
    fn submit_records_batches() {
        let mut service = MockService::builder().build();
        let orders = vec![
            Order::market_buy("ABC", 1.0).unwrap(),
            Order::market_buy("XYZ", 2.0).unwrap(),
        ];
        service.insert_orders(SessionId(0), &orders).unwrap();
        assert_eq!(service.submitted_batches().len(), 1);
        assert_eq!(service.submitted_orders(), orders);
    }

    #[test]
    fn unknown_session_is_protocol_error() {
        let mut service = MockService::builder().session(1).build();
        assert!(matches!(
            service.tick(SessionId(2)),
            Err(ServiceError::Protocol(_))
        ));
    }

    #[test]
    fn injected_failures_are_one_shot() {
        let mut service = MockService::builder().build();
        service.fail_next_insert(ServiceError::Transport("down".into()));
        let orders = [Order::market_buy("ABC", 1.0).unwrap()];
        assert!(service.insert_orders(SessionId(0), &orders).is_err());
        assert!(service.insert_orders(SessionId(0), &orders).is_ok());

        service.fail_next_tick(ServiceError::Protocol("garbled".into()));
        assert!(service.tick(SessionId(0)).is_err());
        assert_eq!(service.ticks_served(), 0);
    }

    #[test]
    fn info_reports_dataset() {
        let mut service = MockService::builder().dataset_range(10, 20).build();
        service.init(&dataset()).unwrap();
        let info = service.info(SessionId(0)).unwrap();
        assert_eq!(info.dataset.as_deref(), Some("test"));
        let range = service.dataset_info().unwrap();
        assert_eq!((range.start_date, range.end_date), (10, 20));
    }
}
