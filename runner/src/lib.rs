//! tickbroker-runner: replay a JSON order plan through a tickbroker session.
//!
//! Reads service and session settings from a TOML config, opens a session on
//! the simulation service over HTTP, submits each planned order on its tick,
//! and writes every rejection, fill, and valuation to a JSONL audit trail.

pub mod audit;
pub mod config;
pub mod error;
pub mod plan;
pub mod run;
