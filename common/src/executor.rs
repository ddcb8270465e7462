// Script runner: executes a parsed action script against the device gateway

use crate::commands::CommandRegistry;
use crate::device::{DeviceGateway, DeviceSession};
use crate::errors::ExecutionError;
use crate::models::{Action, ActionScript, ExecutionReport, FiredJob, JobOutcome};
use crate::scheduler::JobRunner;
use crate::telemetry;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

/// Executes one job's action script against the device gateway.
///
/// Every job gets its own gateway session, actions run strictly in the order
/// the title gave them, and the first failure aborts the remaining actions
/// of that script (fail-fast). Failures never propagate out of a fired job;
/// they are recorded in the report, logged, and counted.
pub struct ScriptRunner {
    registry: Arc<CommandRegistry>,
    gateway: Arc<dyn DeviceGateway>,
    /// Outer bound on one action's device call, retries included.
    command_timeout: Duration,
}

impl ScriptRunner {
    pub fn new(
        registry: Arc<CommandRegistry>,
        gateway: Arc<dyn DeviceGateway>,
        command_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            gateway,
            command_timeout,
        }
    }

    #[instrument(skip(self, script), fields(event_id = %event_id, action_count = script.len()))]
    pub async fn execute(&self, event_id: &str, script: &ActionScript) -> ExecutionReport {
        let total = script.len();

        if script.is_empty() {
            warn!("Script is empty, nothing to execute");
            return ExecutionReport {
                event_id: event_id.to_string(),
                completed: 0,
                total,
                outcome: JobOutcome::Completed,
            };
        }

        let session = match self.gateway.connect().await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Gateway session could not be opened, script aborted");
                return ExecutionReport {
                    event_id: event_id.to_string(),
                    completed: 0,
                    total,
                    outcome: JobOutcome::ConnectFailed {
                        error: e.to_string(),
                    },
                };
            }
        };

        let mut completed = 0;
        for (index, action) in script.actions().iter().enumerate() {
            match self.run_action(session.as_ref(), action).await {
                Ok(()) => {
                    info!(
                        command = %action.command,
                        action_index = index,
                        "Action completed"
                    );
                    completed += 1;
                }
                Err(e) => {
                    error!(
                        command = %action.command,
                        action_index = index,
                        error = %e,
                        "Action failed, aborting remaining actions"
                    );
                    telemetry::record_action_failure(&action.command);
                    return ExecutionReport {
                        event_id: event_id.to_string(),
                        completed,
                        total,
                        outcome: JobOutcome::Failed {
                            action_index: index,
                            command: action.command.clone(),
                            error: e.to_string(),
                        },
                    };
                }
            }
        }

        ExecutionReport {
            event_id: event_id.to_string(),
            completed,
            total,
            outcome: JobOutcome::Completed,
        }
    }

    async fn run_action(
        &self,
        session: &dyn DeviceSession,
        action: &Action,
    ) -> Result<(), ExecutionError> {
        let handler = self
            .registry
            .lookup(&action.command)
            .ok_or_else(|| ExecutionError::UnknownCommand(action.command.clone()))?;

        let arity = handler.arity();
        if !arity.accepts(action.args.len()) {
            return Err(ExecutionError::WrongArity {
                command: action.command.clone(),
                expected: arity.describe(),
                got: action.args.len(),
            });
        }

        let batch = handler.build(&action.args)?;
        match timeout(self.command_timeout, session.send(&batch)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ExecutionError::Device(e)),
            Err(_) => Err(ExecutionError::Timeout(self.command_timeout.as_secs())),
        }
    }
}

#[async_trait]
impl JobRunner for ScriptRunner {
    async fn run(&self, job: FiredJob) {
        let report = self.execute(&job.event_id, &job.script).await;
        match &report.outcome {
            JobOutcome::Completed => {
                info!(
                    event_id = %report.event_id,
                    actions = report.completed,
                    "Job completed"
                );
                telemetry::record_job_fired(true);
            }
            outcome => {
                warn!(
                    event_id = %report.event_id,
                    completed = report.completed,
                    total = report.total,
                    outcome = ?outcome,
                    "Job finished with failures"
                );
                telemetry::record_job_fired(false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceTargets;
    use crate::errors::DeviceError;
    use crate::models::DeviceCommand;
    use crate::script;
    use std::sync::Mutex;

    /// Gateway whose sessions record every batch; individual commands can be
    /// made to fail or hang.
    struct FakeGateway {
        batches: Arc<Mutex<Vec<Vec<DeviceCommand>>>>,
        mode: SessionMode,
    }

    #[derive(Clone, Copy, Debug)]
    enum SessionMode {
        Ok,
        RefuseConnect,
        FailSend,
        HangSend,
    }

    impl FakeGateway {
        fn new(mode: SessionMode) -> Arc<Self> {
            Arc::new(Self {
                batches: Arc::new(Mutex::new(Vec::new())),
                mode,
            })
        }

        fn sent_batches(&self) -> Vec<Vec<DeviceCommand>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[derive(Debug)]
    struct FakeSession {
        batches: Arc<Mutex<Vec<Vec<DeviceCommand>>>>,
        mode: SessionMode,
    }

    #[async_trait]
    impl DeviceGateway for FakeGateway {
        async fn connect(&self) -> Result<Box<dyn DeviceSession>, DeviceError> {
            if matches!(self.mode, SessionMode::RefuseConnect) {
                return Err(DeviceError::ConnectFailed("gateway offline".to_string()));
            }
            Ok(Box::new(FakeSession {
                batches: Arc::clone(&self.batches),
                mode: self.mode,
            }))
        }
    }

    #[async_trait]
    impl DeviceSession for FakeSession {
        async fn send(&self, batch: &[DeviceCommand]) -> Result<(), DeviceError> {
            match self.mode {
                SessionMode::FailSend => {
                    Err(DeviceError::SendFailed("connection reset".to_string()))
                }
                SessionMode::HangSend => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                _ => {
                    self.batches.lock().unwrap().push(batch.to_vec());
                    Ok(())
                }
            }
        }
    }

    fn runner(gateway: Arc<FakeGateway>) -> ScriptRunner {
        let registry = Arc::new(CommandRegistry::with_builtins(&DeviceTargets {
            light: "65537".to_string(),
            blind_left: "65538".to_string(),
            blind_right: "65539".to_string(),
        }));
        ScriptRunner::new(registry, gateway, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_actions_execute_in_script_order() {
        let gateway = FakeGateway::new(SessionMode::Ok);
        let report = runner(gateway.clone())
            .execute("e1", &script::parse("light_on;light_off"))
            .await;

        assert!(report.is_success());
        assert_eq!(report.completed, 2);

        let batches = gateway.sent_batches();
        assert_eq!(batches.len(), 2);
        // First batch is the light_on defaults, second the power-off.
        assert!(matches!(
            batches[0][0],
            DeviceCommand::SetLightPower { on: true, .. }
        ));
        assert_eq!(
            batches[1],
            vec![DeviceCommand::SetLightPower {
                device: "65537".to_string(),
                on: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_command_aborts_remaining_actions() {
        let gateway = FakeGateway::new(SessionMode::Ok);
        let report = runner(gateway.clone())
            .execute("e1", &script::parse("unknown_cmd;light_on"))
            .await;

        assert_eq!(report.completed, 0);
        assert!(matches!(
            report.outcome,
            JobOutcome::Failed {
                action_index: 0,
                ..
            }
        ));
        // light_on must never reach the gateway.
        assert!(gateway.sent_batches().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_arity_aborts_script() {
        let gateway = FakeGateway::new(SessionMode::Ok);
        let report = runner(gateway.clone())
            .execute("e1", &script::parse("light_on 50;light_off"))
            .await;

        assert!(matches!(
            report.outcome,
            JobOutcome::Failed { action_index: 0, .. }
        ));
        assert!(gateway.sent_batches().is_empty());
    }

    #[tokio::test]
    async fn test_device_failure_keeps_earlier_completions() {
        let gateway = FakeGateway::new(SessionMode::FailSend);
        let report = runner(gateway)
            .execute("e1", &script::parse("light_on;light_off"))
            .await;

        assert_eq!(report.completed, 0);
        assert!(matches!(
            report.outcome,
            JobOutcome::Failed { action_index: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_connect_failure_runs_nothing() {
        let gateway = FakeGateway::new(SessionMode::RefuseConnect);
        let report = runner(gateway.clone())
            .execute("e1", &script::parse("set_blinds 30"))
            .await;

        assert_eq!(report.completed, 0);
        assert!(matches!(report.outcome, JobOutcome::ConnectFailed { .. }));
        assert!(gateway.sent_batches().is_empty());
    }

    #[tokio::test]
    async fn test_hung_device_call_times_out() {
        let gateway = FakeGateway::new(SessionMode::HangSend);
        let report = runner(gateway)
            .execute("e1", &script::parse("light_off"))
            .await;

        assert!(
            matches!(report.outcome, JobOutcome::Failed { ref error, .. } if error.contains("timed out"))
        );
    }

    #[tokio::test]
    async fn test_empty_script_completes_without_gateway_contact() {
        let gateway = FakeGateway::new(SessionMode::RefuseConnect);
        let report = runner(gateway).execute("e1", &script::parse(";;")).await;

        assert!(report.is_success());
        assert_eq!(report.total, 0);
    }
}
