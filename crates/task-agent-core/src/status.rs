use crate::{Result, TaskError};
use serde::{Deserialize, Serialize};

/// Lifecycle status reported to the remote authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TaskStatus {
    /// Message picked up by a worker
    Received,
    /// Execution about to begin
    Started,
    /// Execution finished with a result
    Success,
    /// Execution finished with an error
    Failure,
}

impl TaskStatus {
    /// Wire code used in `task_status`
    pub fn code(&self) -> u8 {
        match self {
            TaskStatus::Received => 1,
            TaskStatus::Started => 2,
            TaskStatus::Success => 3,
            TaskStatus::Failure => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TaskStatus::Received),
            2 => Some(TaskStatus::Started),
            3 => Some(TaskStatus::Success),
            4 => Some(TaskStatus::Failure),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Received => "RECEIVED",
            TaskStatus::Started => "STARTED",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure)
    }

    /// Whether `next` may follow `current` (`None` = nothing reported yet)
    pub fn is_valid_transition(current: Option<TaskStatus>, next: TaskStatus) -> bool {
        matches!(
            (current, next),
            (None, TaskStatus::Received)
                | (Some(TaskStatus::Received), TaskStatus::Started)
                | (Some(TaskStatus::Started), TaskStatus::Success)
                | (Some(TaskStatus::Started), TaskStatus::Failure)
        )
    }
}

impl From<TaskStatus> for u8 {
    fn from(status: TaskStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for TaskStatus {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        TaskStatus::from_code(code).ok_or_else(|| format!("unknown task status code {}", code))
    }
}

/// Per-message status tracker.
///
/// Only RECEIVED -> STARTED -> (SUCCESS | FAILURE) is accepted; once a terminal
/// status is recorded every further transition is refused.
#[derive(Debug, Default, Clone)]
pub struct StatusSequence {
    current: Option<TaskStatus>,
}

impl StatusSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<TaskStatus> {
        self.current
    }

    pub fn is_finished(&self) -> bool {
        self.current.map(|s| s.is_terminal()).unwrap_or(false)
    }

    /// Record `next` if it is the legal successor of the current status
    pub fn advance(&mut self, next: TaskStatus) -> Result<()> {
        if !TaskStatus::is_valid_transition(self.current, next) {
            return Err(TaskError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        self.current = Some(next);
        Ok(())
    }
}

/// Result of executing one task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Success(serde_json::Value),
    Failure(String),
}

impl TaskOutcome {
    pub const SUCCESS_MESSAGE: &'static str = "everything is ok";

    /// Terminal status matching this outcome
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskOutcome::Success(_) => TaskStatus::Success,
            TaskOutcome::Failure(_) => TaskStatus::Failure,
        }
    }

    pub fn into_result_body(self) -> ResultBody {
        match self {
            TaskOutcome::Success(data) => ResultBody {
                status: true,
                data,
                msg: Self::SUCCESS_MESSAGE.to_string(),
            },
            TaskOutcome::Failure(msg) => ResultBody {
                status: false,
                data: serde_json::Value::Null,
                msg,
            },
        }
    }
}

impl From<Result<serde_json::Value>> for TaskOutcome {
    fn from(result: Result<serde_json::Value>) -> Self {
        match result {
            Ok(data) => TaskOutcome::Success(data),
            Err(e) => TaskOutcome::Failure(e.to_string()),
        }
    }
}

/// `result` block of a terminal status update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBody {
    pub status: bool,
    pub data: serde_json::Value,
    pub msg: String,
}

/// Body of a status update request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub task_status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultBody>,
}

impl StatusUpdate {
    /// RECEIVED or STARTED update, no result attached
    pub fn progress(status: TaskStatus) -> Self {
        StatusUpdate {
            task_status: status,
            result: None,
        }
    }

    /// SUCCESS or FAILURE update carrying the outcome
    pub fn terminal(outcome: TaskOutcome) -> Self {
        StatusUpdate {
            task_status: outcome.status(),
            result: Some(outcome.into_result_body()),
        }
    }
}
