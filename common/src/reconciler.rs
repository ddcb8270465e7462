// Reconciliation loop: keeps scheduled jobs in sync with the calendar

use crate::calendar::CalendarSource;
use crate::errors::CalendarError;
use crate::scheduler::{JobHandle, JobScheduler};
use crate::script;
use crate::telemetry;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the reconciliation loop.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// How often to poll the calendar (in seconds)
    pub poll_interval_seconds: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 60,
        }
    }
}

/// Per-tick outcome counts, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub scheduled: usize,
    pub cancelled: usize,
    pub tracked: usize,
}

struct TrackedJob {
    handle: JobHandle,
    fire_time: DateTime<Utc>,
}

/// Handle for requesting a graceful stop of the reconciliation loop.
#[derive(Clone)]
pub struct ShutdownTrigger {
    tx: broadcast::Sender<()>,
}

impl ShutdownTrigger {
    pub fn stop(&self) {
        let _ = self.tx.send(());
    }
}

/// The polling control loop: diffs the calendar's current event listing
/// against the tracked job set, scheduling jobs for new events and
/// cancelling jobs for vanished ones.
///
/// The event-id → job mapping is owned by this instance, so several
/// reconcilers (one per calendar, or per test) can coexist in a process.
pub struct Reconciler {
    config: ReconcilerConfig,
    calendar: Arc<dyn CalendarSource>,
    scheduler: Arc<JobScheduler>,
    tracked: HashMap<String, TrackedJob>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Reconciler {
    pub fn new(
        config: ReconcilerConfig,
        calendar: Arc<dyn CalendarSource>,
        scheduler: Arc<JobScheduler>,
    ) -> Self {
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        Self {
            config,
            calendar,
            scheduler,
            tracked: HashMap::new(),
            shutdown_tx,
        }
    }

    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Run one reconciliation pass.
    ///
    /// A failed fetch abandons the whole tick: no partial diff is applied
    /// and the tracked state is left untouched. Known event ids are never
    /// re-parsed or re-scheduled, so a tick over an unchanged listing is a
    /// no-op; title or start-time edits to a tracked event take effect only
    /// if the event id changes.
    #[instrument(skip(self))]
    pub async fn tick(&mut self) -> Result<TickReport, CalendarError> {
        let events = self.calendar.list_upcoming().await?;
        let current_ids: HashSet<&str> = events.iter().map(|e| e.id.as_str()).collect();
        let mut report = TickReport::default();

        // Schedule jobs for events seen for the first time.
        for event in &events {
            if self.tracked.contains_key(&event.id) {
                continue;
            }

            let script = script::parse(&event.title);
            if script.is_empty() {
                warn!(
                    event_id = %event.id,
                    title = %event.title,
                    "Event title parsed to an empty script, job will fire as a no-op"
                );
            }

            info!(
                event_id = %event.id,
                fire_time = %event.start_time,
                action_count = script.len(),
                "Scheduling job for new event"
            );
            let handle = self
                .scheduler
                .schedule_at(event.start_time, event.id.clone(), script);
            self.tracked.insert(
                event.id.clone(),
                TrackedJob {
                    handle,
                    fire_time: event.start_time,
                },
            );
            report.scheduled += 1;
            telemetry::record_job_scheduled();
        }

        // Drop jobs whose events vanished from the listing. Cancel is a
        // no-op on the scheduler side when the job already fired; fired
        // entries are pruned here once their event leaves the listing,
        // which keeps the tracked set bounded by the listing cap.
        let vanished: Vec<String> = self
            .tracked
            .keys()
            .filter(|id| !current_ids.contains(id.as_str()))
            .cloned()
            .collect();
        for id in vanished {
            if let Some(job) = self.tracked.remove(&id) {
                let was_pending = self.scheduler.is_pending(&job.handle);
                self.scheduler.cancel(&job.handle);
                if was_pending {
                    info!(
                        event_id = %id,
                        fire_time = %job.fire_time,
                        "Event vanished from calendar, pending job cancelled"
                    );
                } else {
                    debug!(event_id = %id, "Fired job pruned after event left the listing");
                }
                report.cancelled += 1;
                telemetry::record_job_cancelled();
            }
        }

        report.tracked = self.tracked.len();
        telemetry::update_tracked_jobs(report.tracked);
        Ok(report)
    }

    /// Run the polling loop until a shutdown signal arrives.
    pub async fn run(&mut self) {
        info!(
            poll_interval_seconds = self.config.poll_interval_seconds,
            "Starting reconciliation loop"
        );

        let mut poll_interval =
            tokio::time::interval(Duration::from_secs(self.config.poll_interval_seconds));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    match self.tick().await {
                        Ok(report) if report.scheduled > 0 || report.cancelled > 0 => {
                            info!(
                                scheduled = report.scheduled,
                                cancelled = report.cancelled,
                                tracked = report.tracked,
                                "Reconciliation tick applied changes"
                            );
                        }
                        Ok(report) => {
                            debug!(tracked = report.tracked, "Reconciliation tick made no changes");
                        }
                        Err(e) => {
                            error!(error = %e, "Calendar fetch failed, tick abandoned");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping reconciliation loop");
                    break;
                }
            }
        }

        info!("Reconciliation loop stopped");
    }

    /// Number of event ids currently tracked. Exposed for tests and logs.
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_tracking(&self, event_id: &str) -> bool {
        self.tracked.contains_key(event_id)
    }
}
