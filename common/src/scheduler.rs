// In-memory one-shot job scheduler

use crate::models::{ActionScript, FiredJob};
use crate::telemetry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Receives a job's payload when its fire time arrives.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: FiredJob);
}

/// Opaque cancellation token for one scheduled job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    id: Uuid,
}

/// Holds the pending-job set and fires each payload exactly once at its
/// scheduled time, independently of the reconciliation loop.
///
/// Per-job state machine: Pending → Fired, or Pending → Cancelled. Both are
/// terminal. A job is Pending exactly while its entry is in the map: the
/// firing task removes its own entry before running the payload, and
/// `cancel` removes the entry before aborting the task, so the fire/cancel
/// race always resolves to exactly one of the two transitions.
pub struct JobScheduler {
    runner: Arc<dyn JobRunner>,
    pending: Arc<Mutex<HashMap<Uuid, AbortHandle>>>,
}

impl JobScheduler {
    pub fn new(runner: Arc<dyn JobRunner>) -> Self {
        Self {
            runner,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Schedule `script` to run once at `fire_time`. A fire time already in
    /// the past fires immediately.
    pub fn schedule_at(
        &self,
        fire_time: DateTime<Utc>,
        event_id: String,
        script: ActionScript,
    ) -> JobHandle {
        let id = Uuid::new_v4();
        let delay = (fire_time - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let runner = Arc::clone(&self.runner);
        let pending = Arc::clone(&self.pending);
        let job = FiredJob { event_id, script };

        debug!(
            job_id = %id,
            event_id = %job.event_id,
            fire_time = %fire_time,
            delay_secs = delay.as_secs(),
            "Job scheduled"
        );

        // The map entry must exist before the task can try to fire, so the
        // lock is held across spawn + insert. The task's first step is to
        // claim its own entry, which blocks on this same lock.
        let mut pending_guard = lock_pending(&self.pending);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // Pending → Fired: claim the entry. Losing it means a cancel
            // won the race and this job must not run.
            let claimed = lock_pending(&pending).remove(&id).is_some();
            if !claimed {
                return;
            }
            telemetry::update_pending_jobs(lock_pending(&pending).len());

            info!(job_id = %id, event_id = %job.event_id, "Job fired");
            runner.run(job).await;
        });
        pending_guard.insert(id, task.abort_handle());
        telemetry::update_pending_jobs(pending_guard.len());
        drop(pending_guard);

        JobHandle { id }
    }

    /// Cancel a pending job. Cancelling a job that already fired, or was
    /// already cancelled, is a no-op.
    pub fn cancel(&self, handle: &JobHandle) {
        let removed = lock_pending(&self.pending).remove(&handle.id);
        match removed {
            Some(abort) => {
                abort.abort();
                debug!(job_id = %handle.id, "Job cancelled");
                telemetry::update_pending_jobs(self.pending_count());
            }
            None => {
                debug!(job_id = %handle.id, "Cancel ignored, job already fired or cancelled");
            }
        }
    }

    /// Whether the job is still waiting on its fire time.
    pub fn is_pending(&self, handle: &JobHandle) -> bool {
        lock_pending(&self.pending).contains_key(&handle.id)
    }

    pub fn pending_count(&self) -> usize {
        lock_pending(&self.pending).len()
    }
}

fn lock_pending(
    pending: &Mutex<HashMap<Uuid, AbortHandle>>,
) -> std::sync::MutexGuard<'_, HashMap<Uuid, AbortHandle>> {
    // Holders never panic while holding the lock, so poisoning cannot occur.
    match pending.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
