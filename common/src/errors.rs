// Error handling framework

use thiserror::Error;

/// Calendar collaborator failures.
///
/// A failed fetch abandons the current reconciliation tick; tracked state is
/// left untouched and the fetch is retried on the next interval.
#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Calendar request failed: {0}")]
    RequestFailed(String),

    #[error("Calendar returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Failed to decode calendar response: {0}")]
    DecodeFailed(String),
}

/// Device gateway failures.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Gateway connect failed: {0}")]
    ConnectFailed(String),

    #[error("Gateway send failed: {0}")]
    SendFailed(String),

    #[error("Gateway rejected command batch with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Failures raised while executing one action of a script.
///
/// Any of these aborts the remaining actions of that script; other scripts
/// and the reconciliation loop are unaffected.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Command '{command}' expects {expected} argument(s), got {got}")]
    WrongArity {
        command: String,
        expected: String,
        got: usize,
    },

    #[error("Invalid argument '{value}' for '{command}': {reason}")]
    InvalidArgument {
        command: String,
        value: String,
        reason: String,
    },

    #[error("Device call timed out after {0} seconds")]
    Timeout(u64),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl From<reqwest::Error> for CalendarError {
    fn from(err: reqwest::Error) -> Self {
        CalendarError::RequestFailed(err.to_string())
    }
}
