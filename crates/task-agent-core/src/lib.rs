mod task;
mod status;
mod error;
pub mod perf;

pub use task::{Credentials, Metadata, TaskMessage, TaskType};
pub use status::{ResultBody, StatusSequence, StatusUpdate, TaskOutcome, TaskStatus};
pub use error::{TaskError, Result};
