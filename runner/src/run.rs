//! Run orchestrator: connect, replay the plan tick by tick, summarize.

use log::{info, warn};
use serde::Serialize;
use tickbroker::{Broker, BrokerError, NullObserver, SimulationService, TickReport};
use tickbroker_client::HttpService;

use crate::audit::{self, AuditLog};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::plan::Plan;

/// Options for a plan run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub plan_file: String,
    /// Stop after this many ticks.
    pub max_ticks: Option<u64>,
    /// Extra attempts for a tick that failed in transport.
    pub max_tick_retries: u32,
}

impl RunOptions {
    pub fn from_config(config: &Config, plan_file: &str, dry_run: bool) -> Self {
        Self {
            dry_run,
            plan_file: plan_file.to_string(),
            max_ticks: config.run.max_ticks,
            max_tick_retries: config.run.max_tick_retries,
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub session: u64,
    pub ticks: u64,
    pub submitted: usize,
    pub rejected: usize,
    pub results: usize,
    pub final_cash: f64,
    pub final_value: Option<f64>,
    pub finished: bool,
}

/// Connect to the configured service and replay `plan`.
pub fn run(config: &Config, plan: &Plan, opts: &RunOptions) -> Result<RunSummary> {
    if opts.dry_run {
        print!("{}", describe_plan(plan));
        println!("\n[DRY RUN] No session opened.");
        return Ok(RunSummary::default());
    }

    let service = HttpService::with_options(&config.service.url, config.timeout(), config.retry_policy())?;
    let mut broker = Broker::builder()
        .initial_cash(config.account.initial_cash)
        .request(config.session.request()?)
        .connect(service)?;

    let mut audit = AuditLog::open(&config.audit_path())?;
    let summary = replay(&mut broker, plan, opts, Some(&mut audit))?;
    println!("{}", format_summary(&summary));
    Ok(summary)
}

/// Replay `plan` on an open broker until the session ends or `max_ticks` is hit.
///
/// Orders for step `n` are queued right before the `n`th tick (0-based).
/// A transport failure re-queues the unsent orders and retries the tick up to
/// `max_tick_retries` times. Any other broker error stops the run; results
/// the failed tick applied before stopping are still written to the audit.
pub fn replay<S: SimulationService>(
    broker: &mut Broker<S>,
    plan: &Plan,
    opts: &RunOptions,
    mut audit: Option<&mut AuditLog>,
) -> Result<RunSummary> {
    let mut summary = RunSummary {
        session: broker.session_id().0,
        final_cash: broker.cash(),
        ..RunSummary::default()
    };
    if let Some(audit) = audit.as_deref_mut() {
        audit::log_run_started(audit, &opts.plan_file, broker.session_id(), broker.cash())?;
    }

    let mut step = 0u64;
    while !broker.is_finished() {
        if opts.max_ticks.is_some_and(|max| step >= max) {
            info!("stopping after {step} ticks");
            break;
        }
        for order in plan.orders_for(step) {
            broker.insert_order(order.clone())?;
        }

        let logged = broker.trade_log().len();
        let report = match tick_with_retry(broker, opts.max_tick_retries) {
            Ok(report) => report,
            Err(err) => {
                if let Some(audit) = audit.as_deref_mut() {
                    let applied = &broker.trade_log()[logged..];
                    audit::log_run_aborted(audit, step, applied, &err)?;
                }
                return Err(err.into());
            }
        };
        if let Some(audit) = audit.as_deref_mut() {
            audit::log_tick(audit, step, &report)?;
        }

        summary.ticks += 1;
        summary.submitted += report.submitted;
        summary.rejected += report.rejected.len();
        summary.results += report.executed.len();
        if report.value.is_some() {
            summary.final_value = report.value;
        }
        step += 1;
    }

    summary.final_cash = broker.cash();
    summary.finished = broker.is_finished();
    if let Some(audit) = audit.as_deref_mut() {
        audit::log_run_completed(audit, &summary)?;
    }
    Ok(summary)
}

fn tick_with_retry<S: SimulationService>(
    broker: &mut Broker<S>,
    max_retries: u32,
) -> std::result::Result<TickReport, BrokerError> {
    let mut retries = 0;
    loop {
        match broker.tick() {
            Ok(report) => return Ok(report),
            Err(BrokerError::Transport { reason, unsent }) if retries < max_retries => {
                retries += 1;
                warn!(
                    "tick failed ({reason}), resubmitting {} orders (retry {retries}/{max_retries})",
                    unsent.len()
                );
                for order in unsent {
                    broker.insert_order(order)?;
                }
            }
            Err(err) => return Err(err),
        }
    }
}

/// Print the session the config points at.
pub fn check_status(config: &Config) -> Result<()> {
    print!("Connecting to {}... ", config.service.url);
    let service = HttpService::with_options(&config.service.url, config.timeout(), config.retry_policy())?;
    let mut broker = Broker::builder()
        .initial_cash(config.account.initial_cash)
        .request(config.session.request()?)
        .observer(NullObserver)
        .connect(service)?;
    println!("OK");

    let info = broker.session_info()?;
    let now = broker.remote_now()?;
    println!(
        "Session {} (service {}, dataset {}): now {}, {}",
        broker.session_id(),
        info.version,
        info.dataset.as_deref().unwrap_or("-"),
        now.now,
        if now.has_next { "running" } else { "finished" },
    );
    Ok(())
}

/// Print the time span of the service's data.
pub fn show_dataset(config: &Config) -> Result<()> {
    let mut service = HttpService::with_options(&config.service.url, config.timeout(), config.retry_policy())?;
    let info = service.dataset_info().map_err(BrokerError::from)?;
    println!("Dataset: {} .. {}", info.start_date, info.end_date);
    Ok(())
}

/// Human-readable listing of a plan, one line per order.
pub fn describe_plan(plan: &Plan) -> String {
    if plan.is_empty() {
        return "Plan is empty.\n".to_string();
    }
    let mut out = format!("Plan: {} orders\n", plan.len());
    for planned in plan.orders() {
        out.push_str(&format!("  step {:>4}  {}\n", planned.step, planned.order));
    }
    out
}

pub fn format_summary(summary: &RunSummary) -> String {
    let value = summary
        .final_value
        .map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    format!(
        "Session {}: {} ticks, {} submitted, {} rejected, {} results; cash {:.2}, value {}{}",
        summary.session,
        summary.ticks,
        summary.submitted,
        summary.rejected,
        summary.results,
        summary.final_cash,
        value,
        if summary.finished { " (finished)" } else { "" },
    )
}

/// Errors map to exit codes: insolvency 2, everything else 1.
pub fn exit_code(err: &Error) -> i32 {
    if err.is_insolvency() { 2 } else { 1 }
}
