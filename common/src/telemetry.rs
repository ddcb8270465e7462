// Telemetry module for structured logging and metrics

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize structured logging with JSON formatting
///
/// Log levels come from RUST_LOG when set, otherwise from configuration.
pub fn init_logging(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(
        log_level = log_level,
        "Structured logging initialized with JSON formatting"
    );

    Ok(())
}

/// Initialize the Prometheus metrics exporter and register all metrics:
/// - jobs_scheduled_total: Counter for jobs scheduled by the reconciler
/// - jobs_cancelled_total: Counter for jobs cancelled after their event vanished
/// - jobs_fired_total: Counter for fired jobs, labelled by outcome
/// - actions_failed_total: Counter for failed script actions, labelled by command
/// - jobs_pending: Gauge for jobs currently waiting on their fire time
/// - jobs_tracked: Gauge for event ids currently held in reconciliation state
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!(
        "jobs_scheduled_total",
        "Total number of jobs scheduled for new calendar events"
    );
    describe_counter!(
        "jobs_cancelled_total",
        "Total number of jobs cancelled after their event vanished"
    );
    describe_counter!("jobs_fired_total", "Total number of fired jobs by outcome");
    describe_counter!(
        "actions_failed_total",
        "Total number of failed script actions by command"
    );
    describe_gauge!("jobs_pending", "Jobs currently waiting on their fire time");
    describe_gauge!(
        "jobs_tracked",
        "Event ids currently held in reconciliation state"
    );

    tracing::info!(
        metrics_port = metrics_port,
        "Prometheus metrics exporter initialized"
    );

    Ok(())
}

#[inline]
pub fn record_job_scheduled() {
    counter!("jobs_scheduled_total").increment(1);
}

#[inline]
pub fn record_job_cancelled() {
    counter!("jobs_cancelled_total").increment(1);
}

#[inline]
pub fn record_job_fired(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("jobs_fired_total", "outcome" => outcome).increment(1);
}

#[inline]
pub fn record_action_failure(command: &str) {
    counter!("actions_failed_total", "command" => command.to_string()).increment(1);
}

#[inline]
pub fn update_pending_jobs(count: usize) {
    gauge!("jobs_pending").set(count as f64);
}

#[inline]
pub fn update_tracked_jobs(count: usize) {
    gauge!("jobs_tracked").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_with_valid_level() {
        // Either succeeds or a subscriber is already installed by another test
        let result = init_logging("info");
        assert!(result.is_ok() || result.is_err());
    }

    #[test]
    fn test_metrics_recording_does_not_panic() {
        record_job_scheduled();
        record_job_cancelled();
        record_job_fired(true);
        record_job_fired(false);
        record_action_failure("set_blinds");
        update_pending_jobs(3);
        update_tracked_jobs(5);
    }
}
