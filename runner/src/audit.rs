//! JSONL audit trail of a plan run.
//!
//! Every line is one JSON object carrying a sequence number, a wall-clock
//! timestamp, the session it belongs to, and the event's own fields.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tickbroker::{OrderResult, Rejection, SessionId, TickReport};

use crate::error::Result;
use crate::run::RunSummary;

#[derive(Debug, Serialize)]
struct AuditRecord<'a> {
    seq: u64,
    event: &'a str,
    ts: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<u64>,
    #[serde(flatten)]
    data: serde_json::Value,
}

/// Append-only trail; lines are flushed as they are written.
pub struct AuditLog {
    out: BufWriter<File>,
    session: Option<SessionId>,
    seq: u64,
}

impl AuditLog {
    /// Append to `path`, creating the file and its directory if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: BufWriter::new(file),
            session: None,
            seq: 0,
        })
    }

    /// Stamp every later line with `session`.
    pub fn set_session(&mut self, session: SessionId) {
        self.session = Some(session);
    }

    /// Lines written through this handle.
    pub fn written(&self) -> u64 {
        self.seq
    }

    /// Write `event` with the fields of `data`, which should be a JSON object.
    pub fn log(&mut self, event: &str, data: serde_json::Value) -> Result<()> {
        let record = AuditRecord {
            seq: self.seq,
            event,
            ts: Utc::now(),
            session: self.session.map(|s| s.0),
            data,
        };
        serde_json::to_writer(&mut self.out, &record).map_err(io::Error::from)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.seq += 1;
        Ok(())
    }
}

fn to_data<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value).map_err(io::Error::from)?)
}

pub fn log_run_started(
    audit: &mut AuditLog,
    plan_file: &str,
    session: SessionId,
    initial_cash: f64,
) -> Result<()> {
    audit.set_session(session);
    audit.log(
        "run_started",
        serde_json::json!({
            "plan_file": plan_file,
            "initial_cash": initial_cash,
        }),
    )
}

pub fn log_rejection(audit: &mut AuditLog, step: u64, rejection: &Rejection) -> Result<()> {
    let mut data = to_data(rejection)?;
    data["step"] = step.into();
    audit.log("order_rejected", data)
}

pub fn log_order_result(audit: &mut AuditLog, step: u64, result: &OrderResult) -> Result<()> {
    audit.log(
        "order_result",
        serde_json::json!({
            "step": step,
            "order_id": result.order_id.0,
            "kind": result.kind.to_string(),
            "symbol": result.symbol.as_str(),
            "quantity": result.quantity,
            "value": result.traded_value,
            "date": result.timestamp,
        }),
    )
}

/// Log everything a tick did: rejections, results, then the tick itself.
pub fn log_tick(audit: &mut AuditLog, step: u64, report: &TickReport) -> Result<()> {
    for rejection in &report.rejected {
        log_rejection(audit, step, rejection)?;
    }
    for result in &report.executed {
        log_order_result(audit, step, result)?;
    }
    if report.finished {
        return audit.log("session_finished", serde_json::json!({ "step": step }));
    }
    audit.log(
        "tick_completed",
        serde_json::json!({
            "step": step,
            "now": report.now,
            "submitted": report.submitted,
            "inserted": report.inserted.iter().map(|id| id.0).collect::<Vec<_>>(),
            "value": report.value,
        }),
    )
}

pub fn log_run_completed(audit: &mut AuditLog, summary: &RunSummary) -> Result<()> {
    audit.log("run_completed", to_data(summary)?)
}

/// Log the results a failed tick applied before it stopped, then the abort.
pub fn log_run_aborted(
    audit: &mut AuditLog,
    step: u64,
    applied: &[OrderResult],
    error: &dyn std::error::Error,
) -> Result<()> {
    for result in applied {
        log_order_result(audit, step, result)?;
    }
    audit.log(
        "run_aborted",
        serde_json::json!({ "step": step, "error": error.to_string() }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickbroker::{Order, OrderId, RejectReason};

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn appends_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/audit.jsonl");

        let mut audit = AuditLog::open(&path).unwrap();
        audit.log("opened", serde_json::json!({})).unwrap();
        log_run_started(&mut audit, "plan.json", SessionId(3), 1000.0).unwrap();
        assert_eq!(audit.written(), 2);
        drop(audit);

        let mut audit = AuditLog::open(&path).unwrap();
        audit.log("again", serde_json::json!({ "n": 1 })).unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].get("session").is_none());
        assert_eq!(lines[1]["event"], "run_started");
        assert_eq!(lines[1]["session"], 3);
        assert_eq!(lines[1]["seq"], 1);
        assert_eq!(lines[1]["plan_file"], "plan.json");
        assert!(lines[1]["ts"].is_string());
        assert_eq!(lines[2]["event"], "again");
        assert_eq!(lines[2]["seq"], 0);
        assert_eq!(lines[2]["n"], 1);
    }

    #[test]
    fn tick_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let mut audit = AuditLog::open(&path).unwrap();

        let report = TickReport {
            submitted: 1,
            rejected: vec![Rejection {
                order: Order::market_sell("ABC", 5.0).unwrap(),
                reason: RejectReason::NoPosition { held: 0.0 },
            }],
            executed: vec![OrderResult::buy("ABC", 100.0, 10.0, 101, OrderId(1))],
            inserted: vec![OrderId(2)],
            now: Some(101),
            value: Some(1000.0),
            finished: false,
        };
        log_tick(&mut audit, 4, &report).unwrap();

        let lines = read_lines(&path);
        let events: Vec<_> = lines.iter().map(|l| l["event"].as_str().unwrap()).collect();
        assert_eq!(events, ["order_rejected", "order_result", "tick_completed"]);
        assert_eq!(lines[0]["reason"], "no_position");
        assert_eq!(lines[0]["step"], 4);
        assert_eq!(lines[1]["kind"], "BUY");
        assert_eq!(lines[2]["inserted"][0], 2);
    }

    #[test]
    fn abort_logs_applied_results_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let mut audit = AuditLog::open(&path).unwrap();

        let applied = [OrderResult::buy("ABC", 50.0, 5.0, 101, OrderId(1))];
        let err = tickbroker::BrokerError::InvalidOperation("stopped");
        log_run_aborted(&mut audit, 2, &applied, &err).unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines[0]["event"], "order_result");
        assert_eq!(lines[0]["order_id"], 1);
        assert_eq!(lines[1]["event"], "run_aborted");
        assert!(lines[1]["error"].as_str().unwrap().contains("stopped"));
    }

    #[test]
    fn finishing_tick_logs_session_finished() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let mut audit = AuditLog::open(&path).unwrap();

        let report = TickReport {
            finished: true,
            ..TickReport::default()
        };
        log_tick(&mut audit, 9, &report).unwrap();
        assert_eq!(read_lines(&path)[0]["event"], "session_finished");
    }
}
