//! # tickbroker
//!
//! A client-side broker for tick-driven market simulations.
//!
//! The simulation service owns prices, the order book, and fill decisions.
//! `tickbroker` keeps the client's side of the account: it buffers orders,
//! submits them once per step, reconciles the fills the service reports, and
//! tracks cash, positions, resting orders, and portfolio value.
//!
//! ## Features
//!
//! - **Order types**: MarketBuy, MarketSell, LimitBuy, LimitSell, Cancel, Modify
//! - **Ledger**: cash and signed positions, insolvency checked before every fill
//! - **Lifecycle tracking**: pending buffer, resting orders, partial fills
//! - **Pluggable service**: any [`SimulationService`]; HTTP lives in `tickbroker-client`
//! - **Observer hooks**: every rejection, fill, and tick goes to a [`BrokerObserver`]
//!
//! ## Quick Start
//!
//! ```
//! use tickbroker::mock::MockService;
//! use tickbroker::{Broker, Order, OrderId, OrderResult, Symbol, TickResponse};
//!
//! let mut service = MockService::builder()
//!     .start_time(100)
//!     .with_quote("ABC", 10.0, 10.5)
//!     .build();
//! let quotes = service.initial_quotes();
//! service.push_tick(
//!     TickResponse::step(quotes).with_executed(OrderResult::buy("ABC", 105.0, 10.0, 101, OrderId(1))),
//! );
//!
//! let mut broker = Broker::builder()
//!     .initial_cash(1000.0)
//!     .dataset("demo")
//!     .connect(service)
//!     .unwrap();
//!
//! broker.insert_order(Order::market_buy("ABC", 10.0).unwrap()).unwrap();
//! let report = broker.tick().unwrap();
//!
//! assert_eq!(report.submitted, 1);
//! assert_eq!(broker.cash(), 895.0);
//! assert_eq!(broker.position(&Symbol::new("ABC")), 10.0);
//! // 895 cash + 10 shares marked at the 10.0 bid
//! assert_eq!(report.value, Some(995.0));
//! ```
//!
//! ## Sells Beyond the Position
//!
//! Sells are checked against the held position when the buffer is flushed.
//! Oversized sells never reach the service:
//!
//! ```
//! use tickbroker::mock::MockService;
//! use tickbroker::{Broker, Order, RejectReason};
//!
//! let service = MockService::builder().with_quote("ABC", 10.0, 10.5).build();
//! let mut broker = Broker::builder()
//!     .initial_cash(1000.0)
//!     .dataset("demo")
//!     .connect(service)
//!     .unwrap();
//!
//! broker.insert_order(Order::market_sell("ABC", 5.0).unwrap()).unwrap();
//! let report = broker.tick().unwrap();
//!
//! assert_eq!(report.submitted, 0);
//! assert_eq!(report.rejected[0].reason, RejectReason::NoPosition { held: 0.0 });
//! ```
//!
//! ## Wire Format
//!
//! Orders serialize to the service's JSON shape:
//!
//! ```
//! use tickbroker::Order;
//!
//! let order = Order::limit_buy("ABC", 10.0, 9.5).unwrap();
//! assert_eq!(
//!     order.to_json().unwrap(),
//!     r#"{"order_type":"LimitBuy","symbol":"ABC","qty":10.0,"price":9.5}"#
//! );
//! ```

mod broker;
mod error;
mod event;
mod ledger;
mod lifecycle;
pub mod mock;
mod order;
mod result;
pub mod service;
mod snapshot;
mod types;

// Re-export public API
pub use broker::{Broker, BrokerBuilder, BrokerState, TickReport};
pub use error::{BrokerError, ServiceError, ValidationError};
pub use event::{BrokerObserver, LogObserver, NullObserver, RejectReason, Rejection};
pub use ledger::Ledger;
pub use lifecycle::{FillProgress, Flush, LifecycleTracker, TrackedOrder, validate_for_flush};
pub use order::{Order, OrderKind, WireOrder};
pub use result::{OrderResult, OrderResultKind};
pub use service::{
    DatasetInfo, InitRequest, InitResponse, InsertOrdersRequest, InsertedOrder, NowResponse,
    SessionInfo, SimulationService, TickResponse,
};
pub use snapshot::{Depth, DepthSnapshot, Level, Quote, QuoteSnapshot, snapshot_time};
pub use types::{OrderId, QUANTITY_EPSILON, SessionId, Symbol, Timestamp, is_flat};
