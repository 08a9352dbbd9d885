//! HTTP transport for tickbroker.
//!
//! [`HttpService`] implements [`tickbroker::SimulationService`] over a
//! blocking `reqwest` client. Transient failures (connection errors,
//! timeouts, gateway statuses) are retried according to a [`RetryPolicy`].
//!
//! ```no_run
//! use tickbroker::Broker;
//! use tickbroker_client::HttpService;
//!
//! let service = HttpService::new("http://127.0.0.1:3000")?;
//! let mut broker = Broker::builder()
//!     .initial_cash(10_000.0)
//!     .dataset("Test")
//!     .connect(service)?;
//! broker.tick()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod http;
pub mod retry;

pub use error::ClientError;
pub use http::{DEFAULT_TIMEOUT, HttpService};
pub use retry::RetryPolicy;
