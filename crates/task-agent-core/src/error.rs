use crate::{TaskStatus, TaskType};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Malformed task message: {0}")]
    Deserialization(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Status report failed: {0}")]
    Report(String),

    #[error("Task type not supported: {0}")]
    TaskTypeUnsupported(TaskType),

    #[error("Invalid task config: {0}")]
    InvalidConfig(String),

    #[error("Task execution failed: {0}")]
    Execution(String),

    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: Option<TaskStatus>,
        to: TaskStatus,
    },
}

impl From<serde_json::Error> for TaskError {
    fn from(err: serde_json::Error) -> Self {
        TaskError::Deserialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;
