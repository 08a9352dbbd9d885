//! Broker: the per-step reconciliation loop over a simulation service.
//!
//! A strategy buffers orders with [`Broker::insert_order`] and advances the
//! session with [`Broker::tick`]. Each tick flushes the buffer, asks the
//! service for the next step, reconciles fills into the ledger and the
//! lifecycle tracker, and marks the portfolio to market.

use rustc_hash::FxHashMap;

use crate::error::{BrokerError, ServiceError};
use crate::event::{BrokerObserver, LogObserver, Rejection};
use crate::ledger::Ledger;
use crate::lifecycle::{Flush, LifecycleTracker, TrackedOrder};
use crate::order::Order;
use crate::result::{OrderResult, OrderResultKind};
use crate::service::{
    DatasetInfo, InitRequest, NowResponse, SessionInfo, SimulationService, TickResponse,
};
use crate::snapshot::{Depth, DepthSnapshot, Quote, QuoteSnapshot, snapshot_time};
use crate::types::{OrderId, SessionId, Symbol, Timestamp};

/// Session state. `Finished` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrokerState {
    /// Accepting orders and ticking.
    Active,
    /// The service reported no further steps.
    Finished,
}

/// What a successful [`Broker::tick`] did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    /// Orders transmitted in this tick's batch.
    pub submitted: usize,
    /// Orders dropped at flush time.
    pub rejected: Vec<Rejection>,
    /// Results reconciled, in the order received.
    pub executed: Vec<OrderResult>,
    /// Orders the service acknowledged as resting.
    pub inserted: Vec<OrderId>,
    /// Simulation clock after the tick.
    pub now: Option<Timestamp>,
    /// Portfolio value appended to the history; `None` when the tick ended the session.
    pub value: Option<f64>,
    pub finished: bool,
}

/// Builder for [`Broker`].
#[derive(Default)]
pub struct BrokerBuilder {
    initial_cash: Option<f64>,
    request: Option<InitRequest>,
    observer: Option<Box<dyn BrokerObserver>>,
}

impl BrokerBuilder {
    pub fn initial_cash(mut self, cash: f64) -> Self {
        self.initial_cash = Some(cash);
        self
    }

    /// Replay a named dataset.
    pub fn dataset(mut self, name: impl Into<String>) -> Self {
        self.request = Some(InitRequest::Dataset {
            dataset: name.into(),
        });
        self
    }

    /// Replay `[start_date, end_date]` stepping every `frequency` seconds.
    pub fn date_range(mut self, start_date: Timestamp, end_date: Timestamp, frequency: u64) -> Self {
        self.request = Some(InitRequest::Range {
            start_date,
            end_date,
            frequency,
        });
        self
    }

    pub fn request(mut self, request: InitRequest) -> Self {
        self.request = Some(request);
        self
    }

    /// Where broker events go. Defaults to [`LogObserver`].
    pub fn observer(mut self, observer: impl BrokerObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Open a session on `service` and return an `Active` broker.
    pub fn connect<S: SimulationService>(self, mut service: S) -> Result<Broker<S>, BrokerError> {
        let cash = self
            .initial_cash
            .ok_or_else(|| BrokerError::Config("broker needs initial cash".into()))?;
        if !cash.is_finite() || cash < 0.0 {
            return Err(BrokerError::Config(format!(
                "initial cash must be a non-negative amount, got {cash}"
            )));
        }
        let request = self
            .request
            .ok_or_else(|| BrokerError::Config("broker needs a dataset or date range".into()))?;

        let init = service.init(&request)?;
        let now = snapshot_time(&init.bbo);
        let mut observer = self.observer.unwrap_or_else(|| Box::new(LogObserver));
        observer.session_started(init.session_id, now);

        Ok(Broker {
            service,
            session_id: init.session_id,
            state: BrokerState::Active,
            ledger: Ledger::new(cash),
            tracker: LifecycleTracker::new(),
            quotes: init.bbo,
            depth: init.depth,
            now,
            trade_log: Vec::new(),
            inserted_last_tick: Vec::new(),
            portfolio_values: Vec::new(),
            unapplied: None,
            observer,
        })
    }
}

/// Client-side account for one simulation session.
///
/// Owns all ledger and lifecycle state; callers only read it through
/// accessors. `tick` takes `&mut self`, so ticks can never overlap; wrap the
/// broker in a `Mutex` to share it between threads.
pub struct Broker<S> {
    service: S,
    session_id: SessionId,
    state: BrokerState,
    ledger: Ledger,
    tracker: LifecycleTracker,
    quotes: QuoteSnapshot,
    depth: DepthSnapshot,
    now: Option<Timestamp>,
    /// Every reconciled result, append-only
    trade_log: Vec<OrderResult>,
    inserted_last_tick: Vec<OrderId>,
    /// One valuation per completed tick, append-only
    portfolio_values: Vec<f64>,
    /// Rest of a step whose reconciliation stopped at a failing result
    unapplied: Option<Step>,
    observer: Box<dyn BrokerObserver>,
}

impl Broker<()> {
    pub fn builder() -> BrokerBuilder {
        BrokerBuilder::default()
    }
}

impl<S: SimulationService> Broker<S> {
    // === Orders ===

    /// Buffer an order for the next tick. Nothing is checked or sent yet.
    pub fn insert_order(&mut self, order: Order) -> Result<(), BrokerError> {
        if self.state == BrokerState::Finished {
            return Err(BrokerError::InvalidOperation(
                "insert_order called on a finished session",
            ));
        }
        self.tracker.enqueue(order);
        Ok(())
    }

    // === Tick ===

    /// Advance the session by one step.
    ///
    /// Flushes pending orders (sells beyond the held position are rejected
    /// and reported), submits the rest as one batch, fetches the step,
    /// reconciles every executed result, registers resting orders, then
    /// either finishes the session or adopts the new snapshot and appends the
    /// portfolio value.
    ///
    /// On a transport failure during submission the drained orders come back
    /// in [`BrokerError::Transport::unsent`]. A malformed step response is
    /// rejected before anything is reconciled. In every error case the broker
    /// stays `Active`.
    ///
    /// An insolvent fill or an unknown order reference stops reconciliation
    /// at that result. Earlier results stay applied, the offending result is
    /// dropped (it is described by the error), and the rest of the step is
    /// held. The next call finishes the held step instead of flushing or
    /// fetching: it returns a report with `submitted == 0` and leaves
    /// buffered orders for the call after it.
    pub fn tick(&mut self) -> Result<TickReport, BrokerError> {
        if self.state == BrokerState::Finished {
            return Err(BrokerError::InvalidOperation(
                "tick called on a finished session",
            ));
        }

        if let Some(step) = self.unapplied.take() {
            return self.apply_step(step, TickReport::default());
        }

        let Flush { accepted, rejected } = self.tracker.flush(&self.ledger);
        for rejection in &rejected {
            self.observer.order_rejected(self.session_id, rejection);
        }

        let submitted = accepted.len();
        if !accepted.is_empty() {
            self.observer.orders_submitted(self.session_id, &accepted);
            if let Err(err) = self.service.insert_orders(self.session_id, &accepted) {
                return Err(match err {
                    ServiceError::Transport(reason) => BrokerError::Transport {
                        reason,
                        unsent: accepted,
                    },
                    ServiceError::Protocol(msg) => BrokerError::Protocol(msg),
                });
            }
        }

        let response = self.service.tick(self.session_id)?;
        let step = Step::parse(response)?;

        self.inserted_last_tick.clear();
        let report = TickReport {
            submitted,
            rejected,
            ..TickReport::default()
        };
        self.apply_step(step, report)
    }

    /// Reconcile a parsed step, then finish the session or adopt its snapshot.
    ///
    /// On a reconciliation error the unprocessed remainder is parked in
    /// `unapplied`.
    fn apply_step(
        &mut self,
        mut step: Step,
        mut report: TickReport,
    ) -> Result<TickReport, BrokerError> {
        let mut executed = std::mem::take(&mut step.executed).into_iter();
        while let Some(result) = executed.next() {
            if let Err(err) = self.reconcile(&result) {
                step.executed = executed.collect();
                self.unapplied = Some(step);
                return Err(err);
            }
            self.trade_log.push(result.clone());
            report.executed.push(result);
        }

        let mut inserted = std::mem::take(&mut step.inserted).into_iter();
        while let Some((id, order)) = inserted.next() {
            if let Err(err) = self.tracker.record_inserted(id, order) {
                step.inserted = inserted.collect();
                self.unapplied = Some(step);
                return Err(err);
            }
            if let Some(tracked) = self.tracker.get(id) {
                self.observer.order_resting(self.session_id, id, &tracked.order);
            }
            self.inserted_last_tick.push(id);
            report.inserted.push(id);
        }

        if !step.has_next {
            self.state = BrokerState::Finished;
            self.observer.session_finished(self.session_id);
            report.now = self.now;
            report.finished = true;
            return Ok(report);
        }

        self.quotes = step.bbo;
        self.depth = step.depth;
        if step.now.is_some() {
            self.now = step.now;
        }

        let value = self.ledger.current_value(&self.quotes)?;
        self.portfolio_values.push(value);
        self.observer.tick_completed(self.session_id, self.now, value);

        report.now = self.now;
        report.value = Some(value);
        Ok(report)
    }

    /// Apply one executed result to the ledger and the tracker.
    fn reconcile(&mut self, result: &OrderResult) -> Result<(), BrokerError> {
        match result.kind {
            OrderResultKind::Buy | OrderResultKind::Sell => {
                self.ledger.apply_fill(result)?;
                self.tracker.record_fill(result);
            }
            OrderResultKind::Cancel => self.tracker.record_cancel(result)?,
            OrderResultKind::Modify => self.tracker.record_modify(result)?,
        }
        self.observer
            .result_applied(self.session_id, result, self.ledger.cash());
        Ok(())
    }

    // === Queries ===

    pub fn state(&self) -> BrokerState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == BrokerState::Finished
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn cash(&self) -> f64 {
        self.ledger.cash()
    }

    /// Signed position in `symbol`; 0 if never traded.
    pub fn position(&self, symbol: &Symbol) -> f64 {
        self.ledger.position(symbol)
    }

    pub fn holdings(&self) -> impl Iterator<Item = (&Symbol, f64)> {
        self.ledger.holdings()
    }

    /// Cash plus holdings marked at the current snapshot's bids.
    pub fn current_value(&self) -> Result<f64, BrokerError> {
        self.ledger.current_value(&self.quotes)
    }

    pub fn quotes(&self) -> &QuoteSnapshot {
        &self.quotes
    }

    pub fn quote(&self, symbol: &Symbol) -> Option<&Quote> {
        self.quotes.get(symbol)
    }

    pub fn depth(&self) -> &DepthSnapshot {
        &self.depth
    }

    pub fn depth_for(&self, symbol: &Symbol) -> Option<&Depth> {
        self.depth.get(symbol)
    }

    /// Simulation clock: time of the latest adopted snapshot.
    pub fn now(&self) -> Option<Timestamp> {
        self.now
    }

    /// Orders buffered for the next tick, oldest first.
    pub fn pending_orders(&self) -> &[Order] {
        self.tracker.pending()
    }

    /// Resting orders keyed by service-assigned id.
    pub fn unexecuted_orders(&self) -> &FxHashMap<OrderId, TrackedOrder> {
        self.tracker.unexecuted()
    }

    /// Ids the service reported as resting in the most recent tick.
    pub fn inserted_last_tick(&self) -> &[OrderId] {
        &self.inserted_last_tick
    }

    pub fn trade_log(&self) -> &[OrderResult] {
        &self.trade_log
    }

    pub fn portfolio_values(&self) -> &[f64] {
        &self.portfolio_values
    }

    /// True when a step stopped part way and the next `tick` will finish it.
    pub fn has_unapplied_step(&self) -> bool {
        self.unapplied.is_some()
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }

    // === Informational reads ===

    pub fn session_info(&mut self) -> Result<SessionInfo, BrokerError> {
        Ok(self.service.info(self.session_id)?)
    }

    pub fn dataset_info(&mut self) -> Result<DatasetInfo, BrokerError> {
        Ok(self.service.dataset_info()?)
    }

    /// The service's view of the session clock.
    pub fn remote_now(&mut self) -> Result<NowResponse, BrokerError> {
        Ok(self.service.now(self.session_id)?)
    }
}

/// A step response that passed structural checks.
struct Step {
    has_next: bool,
    executed: Vec<OrderResult>,
    inserted: Vec<(OrderId, Order)>,
    bbo: QuoteSnapshot,
    depth: DepthSnapshot,
    now: Option<Timestamp>,
}

impl Step {
    /// Reject anything the ledger or tracker could not apply safely.
    fn parse(response: TickResponse) -> Result<Self, BrokerError> {
        let now = response.snapshot_time();
        let TickResponse {
            has_next,
            executed_orders,
            inserted_orders,
            bbo,
            depth,
            ..
        } = response;

        for result in &executed_orders {
            check_result(result)?;
        }

        let inserted = inserted_orders
            .into_iter()
            .map(|inserted| {
                let id = inserted.order_id;
                inserted.into_order().map_err(|e| {
                    BrokerError::Protocol(format!("inserted order {id} is malformed: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            has_next,
            executed: executed_orders,
            inserted,
            bbo,
            depth,
            now,
        })
    }
}

fn check_result(result: &OrderResult) -> Result<(), BrokerError> {
    if !result.quantity.is_finite() || !result.traded_value.is_finite() {
        return Err(BrokerError::Protocol(format!(
            "result for {} has a non-finite quantity or value",
            result.order_id
        )));
    }
    if result.kind.is_fill() && (result.quantity < 0.0 || result.traded_value < 0.0) {
        return Err(BrokerError::Protocol(format!(
            "fill for {} has a negative quantity or value",
            result.order_id
        )));
    }
    Ok(())
}
