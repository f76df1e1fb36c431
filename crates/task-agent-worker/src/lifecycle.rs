use std::sync::Arc;
use task_agent_client::{AuthToken, StatusReporter};
use task_agent_core::{
    StatusSequence, StatusUpdate, TaskError, TaskMessage, TaskOutcome, TaskStatus,
};
use tracing::info;

/// Reports the status transitions of one message, in order.
///
/// A transition is recorded before the call is made, so a failed RECEIVED
/// report still lets STARTED follow it.
pub struct LifecycleReporter {
    reporter: Arc<dyn StatusReporter>,
    base_url: String,
    task_id: String,
    token: AuthToken,
    sequence: StatusSequence,
}

impl LifecycleReporter {
    pub fn new(
        reporter: Arc<dyn StatusReporter>,
        message: &TaskMessage,
        token: AuthToken,
    ) -> Self {
        LifecycleReporter {
            reporter,
            base_url: message.base_url().to_string(),
            task_id: message.task_id().to_string(),
            token,
            sequence: StatusSequence::new(),
        }
    }

    pub fn current(&self) -> Option<TaskStatus> {
        self.sequence.current()
    }

    /// Single blocking round trip, no retry
    pub async fn report(&mut self, update: StatusUpdate) -> Result<(), TaskError> {
        self.sequence.advance(update.task_status)?;

        self.reporter
            .patch_task_status(&self.base_url, &self.task_id, &self.token, &update)
            .await
            .map_err(|e| TaskError::Report(e.to_string()))?;

        info!("Task {} status -> {}", self.task_id, update.task_status.as_str());
        Ok(())
    }

    pub async fn received(&mut self) -> Result<(), TaskError> {
        self.report(StatusUpdate::progress(TaskStatus::Received)).await
    }

    pub async fn started(&mut self) -> Result<(), TaskError> {
        self.report(StatusUpdate::progress(TaskStatus::Started)).await
    }

    /// SUCCESS or FAILURE, depending on the outcome
    pub async fn finish(&mut self, outcome: TaskOutcome) -> Result<(), TaskError> {
        self.report(StatusUpdate::terminal(outcome)).await
    }
}
