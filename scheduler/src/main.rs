// Scheduler daemon entry point

use anyhow::{Context, Result};
use common::calendar::{CalendarSource, GoogleCalendarConfig, GoogleCalendarSource};
use common::commands::CommandRegistry;
use common::config::Settings;
use common::device::{DeviceGateway, HttpDeviceGateway, HttpGatewayConfig};
use common::executor::ScriptRunner;
use common::reconciler::{Reconciler, ReconcilerConfig};
use common::scheduler::{JobRunner, JobScheduler};
use common::telemetry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before logging is up; a malformed config file is
    // reported through the process exit error.
    let settings = Settings::load().context("Failed to load configuration")?;

    telemetry::init_logging(&settings.observability.log_level)?;

    info!("Starting Calendar Automation Scheduler");

    settings.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        anyhow::anyhow!("Invalid configuration: {}", e)
    })?;

    info!(
        calendar_id = %settings.calendar.calendar_id,
        gateway_endpoint = %settings.gateway.endpoint,
        poll_interval_seconds = settings.reconciler.poll_interval_seconds,
        "Configuration loaded"
    );

    telemetry::init_metrics(settings.observability.metrics_port)?;

    // Calendar collaborator
    let calendar: Arc<dyn CalendarSource> = Arc::new(
        GoogleCalendarSource::new(GoogleCalendarConfig {
            api_base: settings.calendar.api_base.clone(),
            calendar_id: settings.calendar.calendar_id.clone(),
            access_token: settings.calendar.access_token.clone(),
            max_results: settings.calendar.max_results,
            request_timeout_seconds: settings.calendar.request_timeout_seconds,
        })
        .map_err(|e| {
            error!(error = %e, "Failed to initialize calendar client");
            anyhow::anyhow!("Calendar client initialization error: {}", e)
        })?,
    );
    info!("Calendar client initialized");

    // Device-control collaborator
    let gateway: Arc<dyn DeviceGateway> = Arc::new(
        HttpDeviceGateway::new(HttpGatewayConfig {
            endpoint: settings.gateway.endpoint.clone(),
            api_key: settings.gateway.api_key.clone(),
            request_timeout_seconds: settings.gateway.request_timeout_seconds,
            send_retries: settings.gateway.send_retries,
        })
        .map_err(|e| {
            error!(error = %e, "Failed to initialize gateway client");
            anyhow::anyhow!("Gateway client initialization error: {}", e)
        })?,
    );
    info!("Gateway client initialized");

    // Command registry and job execution
    let registry = Arc::new(CommandRegistry::with_builtins(&settings.gateway.devices));
    info!(commands = ?registry.command_names(), "Command registry initialized");

    let runner: Arc<dyn JobRunner> = Arc::new(ScriptRunner::new(
        registry,
        gateway,
        Duration::from_secs(settings.gateway.command_timeout_seconds),
    ));
    let job_scheduler = Arc::new(JobScheduler::new(runner));
    info!("Job scheduler initialized");

    let mut reconciler = Reconciler::new(
        ReconcilerConfig {
            poll_interval_seconds: settings.reconciler.poll_interval_seconds,
        },
        calendar,
        job_scheduler,
    );

    // Graceful shutdown on Ctrl+C
    let shutdown = reconciler.shutdown_trigger();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C signal, initiating graceful shutdown");
        shutdown.stop();
    });

    reconciler.run().await;

    info!("Scheduler stopped");
    Ok(())
}
