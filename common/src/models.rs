// Core data types shared across the scheduler components

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One upcoming calendar entry as returned by the calendar collaborator.
///
/// Events are produced fresh on every poll and never mutated by this system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    /// Stable identifier assigned by the calendar source.
    pub id: String,
    /// Raw command script, e.g. `"set_blinds 30;light_off"`.
    pub title: String,
    pub start_time: DateTime<Utc>,
}

/// A single parsed command invocation from an event title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Command name to dispatch through the registry.
    pub command: String,
    /// Positional arguments, kept as raw strings. Conversion happens in the
    /// command handler, not the parser.
    pub args: Vec<String>,
}

/// The ordered list of actions parsed from one event title.
///
/// Actions are a script, not a set: source order is preserved through
/// execution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionScript {
    actions: Vec<Action>,
}

impl ActionScript {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// A single device-level command understood by the gateway.
///
/// Command handlers produce ordered batches of these; the device session
/// serializes the batch and ships it to the gateway, which applies it
/// asynchronously on the radio side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceCommand {
    SetBlindPosition {
        device: String,
        /// 0 = fully open, 100 = fully closed.
        position: u8,
    },
    SetLightPower {
        device: String,
        on: bool,
    },
    SetBrightness {
        device: String,
        /// Dimmer level, 0-254.
        level: u8,
        /// Device-native transition duration in seconds.
        #[serde(skip_serializing_if = "Option::is_none")]
        transition_secs: Option<u32>,
    },
    SetColorTemperature {
        device: String,
        mireds: u16,
    },
    SetHexColor {
        device: String,
        hex: String,
    },
}

/// The payload handed to the job runner when a scheduled job's time arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredJob {
    pub event_id: String,
    pub script: ActionScript,
}

/// Terminal outcome of one fired job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every action in the script ran.
    Completed,
    /// The gateway session could not be opened; no action ran.
    ConnectFailed { error: String },
    /// An action failed; the remaining actions were aborted.
    Failed {
        action_index: usize,
        command: String,
        error: String,
    },
}

/// Summary of one script execution, returned by the job executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub event_id: String,
    /// Number of actions that ran to completion.
    pub completed: usize,
    /// Number of actions in the script.
    pub total: usize,
    pub outcome: JobOutcome,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_script_preserves_order() {
        let script = ActionScript::new(vec![
            Action {
                command: "light_on".to_string(),
                args: vec![],
            },
            Action {
                command: "light_off".to_string(),
                args: vec![],
            },
        ]);
        assert_eq!(script.len(), 2);
        assert_eq!(script.actions()[0].command, "light_on");
        assert_eq!(script.actions()[1].command, "light_off");
    }

    #[test]
    fn test_device_command_serialization() {
        let cmd = DeviceCommand::SetBrightness {
            device: "65537".to_string(),
            level: 128,
            transition_secs: Some(5),
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "set_brightness");
        assert_eq!(json["level"], 128);
        assert_eq!(json["transition_secs"], 5);
    }

    #[test]
    fn test_device_command_omits_absent_transition() {
        let cmd = DeviceCommand::SetBrightness {
            device: "65537".to_string(),
            level: 254,
            transition_secs: None,
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert!(json.get("transition_secs").is_none());
    }

    #[test]
    fn test_execution_report_success() {
        let report = ExecutionReport {
            event_id: "e1".to_string(),
            completed: 2,
            total: 2,
            outcome: JobOutcome::Completed,
        };
        assert!(report.is_success());

        let failed = ExecutionReport {
            event_id: "e1".to_string(),
            completed: 0,
            total: 2,
            outcome: JobOutcome::Failed {
                action_index: 0,
                command: "unknown_cmd".to_string(),
                error: "unknown command: unknown_cmd".to_string(),
            },
        };
        assert!(!failed.is_success());
    }
}
