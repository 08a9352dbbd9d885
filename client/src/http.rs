//! Blocking HTTP implementation of [`SimulationService`].

use std::thread;
use std::time::Duration;

use log::{debug, warn};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use tickbroker::{
    DatasetInfo, InitRequest, InitResponse, InsertOrdersRequest, NowResponse, Order, ServiceError,
    SessionId, SessionInfo, SimulationService, TickResponse,
};

use crate::error::ClientError;
use crate::retry::RetryPolicy;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How one attempt went wrong.
enum Failure {
    /// Worth another attempt.
    Transient(String),
    /// The service answered and the answer is unusable.
    Fatal(String),
}

/// Blocking client for a simulation service reachable over HTTP.
pub struct HttpService {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpService {
    /// Client for `base_url` with the default timeout and retry policy.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_options(base_url, DEFAULT_TIMEOUT, RetryPolicy::default())
    }

    pub fn with_options(
        base_url: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, retry: bool) -> Result<T, ServiceError> {
        let url = self.url(path);
        let resp = self.send(path, retry, || self.client.get(&url))?;
        decode(path, resp)
    }

    /// Send a request built by `build`, retrying transient failures when `retry` is set.
    fn send<F>(&self, what: &str, retry: bool, build: F) -> Result<Response, ServiceError>
    where
        F: Fn() -> RequestBuilder,
    {
        let attempts = if retry { self.retry.max_attempts.max(1) } else { 1 };
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!("{what} attempt {attempt}/{attempts}");
            match attempt_once(build()) {
                Ok(resp) => return Ok(resp),
                Err(Failure::Fatal(reason)) => {
                    return Err(ServiceError::Protocol(format!("{what}: {reason}")));
                }
                Err(Failure::Transient(reason)) if attempt < attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!("{what} failed ({reason}), retrying in {delay:?}");
                    thread::sleep(delay);
                }
                Err(Failure::Transient(reason)) => {
                    return Err(ServiceError::Transport(format!(
                        "{what}: {reason} after {attempt} attempt(s)"
                    )));
                }
            }
        }
    }
}

fn attempt_once(request: RequestBuilder) -> Result<Response, Failure> {
    let resp = request
        .send()
        .map_err(|e| Failure::Transient(format!("request failed: {e}")))?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(classify_status(status, &body))
}

fn classify_status(status: StatusCode, body: &str) -> Failure {
    let reason = if body.is_empty() {
        format!("returned {status}")
    } else {
        format!("returned {status}: {body}")
    };
    if RetryPolicy::is_retryable_status(status.as_u16()) {
        Failure::Transient(reason)
    } else {
        Failure::Fatal(reason)
    }
}

fn decode<T: DeserializeOwned>(what: &str, resp: Response) -> Result<T, ServiceError> {
    let body = resp
        .text()
        .map_err(|e| ServiceError::Transport(format!("{what}: reading body failed: {e}")))?;
    serde_json::from_str(&body)
        .map_err(|e| ServiceError::Protocol(format!("{what}: failed to parse response: {e}")))
}

impl SimulationService for HttpService {
    /// Never retried: a repeated init would open a second session.
    fn init(&mut self, request: &InitRequest) -> Result<InitResponse, ServiceError> {
        match request {
            InitRequest::Dataset { dataset } => self.get_json(&format!("/init/{dataset}"), false),
            InitRequest::Range { .. } => {
                let url = self.url("/init");
                let resp = self.send("/init", false, || self.client.post(&url).json(request))?;
                decode("/init", resp)
            }
        }
    }

    fn insert_orders(&mut self, session: SessionId, orders: &[Order]) -> Result<(), ServiceError> {
        let path = format!("/backtest/{}/insert_orders", session.0);
        let url = self.url(&path);
        let body = InsertOrdersRequest {
            orders: orders.to_vec(),
        };
        debug!("submitting {} orders to {path}", orders.len());
        self.send(&path, self.retry.retry_submissions, || {
            self.client.post(&url).json(&body)
        })?;
        Ok(())
    }

    /// Never retried: each request advances the simulation, so a repeat after
    /// a gateway timeout could consume a step whose response was lost.
    fn tick(&mut self, session: SessionId) -> Result<TickResponse, ServiceError> {
        self.get_json(&format!("/backtest/{}/tick", session.0), false)
    }

    fn info(&mut self, session: SessionId) -> Result<SessionInfo, ServiceError> {
        self.get_json(&format!("/backtest/{}/info", session.0), true)
    }

    fn dataset_info(&mut self) -> Result<DatasetInfo, ServiceError> {
        self.get_json("/dataset/info", true)
    }

    fn now(&mut self, session: SessionId) -> Result<NowResponse, ServiceError> {
        self.get_json(&format!("/backtest/{}/now", session.0), true)
    }
}
