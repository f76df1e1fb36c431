use crate::handler::TaskHandlerRegistry;
use std::sync::Arc;
use std::time::Instant;
use task_agent_core::{TaskOutcome, TaskType};
use tracing::{error, info};

/// Dispatches a task to its handler and runs it to completion.
///
/// Every failure, including an unknown task type or a handler panic, ends up
/// as `TaskOutcome::Failure`. No timeout is applied.
pub struct TaskExecutor {
    registry: Arc<TaskHandlerRegistry>,
}

impl TaskExecutor {
    pub fn new(registry: Arc<TaskHandlerRegistry>) -> Self {
        TaskExecutor { registry }
    }

    /// Execute with panic recovery, logging the wall-clock duration
    pub async fn execute(
        &self,
        task_id: &str,
        task_type: TaskType,
        config: &serde_json::Value,
    ) -> TaskOutcome {
        let started = Instant::now();
        info!("Executing task {} (type: {})", task_id, task_type);

        let outcome = match self.registry.dispatch(task_type) {
            Ok(handler) => {
                let config = config.clone();
                match tokio::spawn(async move { handler.execute(&config).await }).await {
                    Ok(result) => TaskOutcome::from(result),
                    Err(e) if e.is_panic() => {
                        error!("Task {} panicked: {:?}", task_id, e);
                        TaskOutcome::Failure("Task panicked during execution".to_string())
                    }
                    Err(_) => {
                        error!("Task {} was cancelled", task_id);
                        TaskOutcome::Failure("Task was cancelled".to_string())
                    }
                }
            }
            Err(e) => TaskOutcome::Failure(e.to_string()),
        };

        let elapsed = started.elapsed();
        match &outcome {
            TaskOutcome::Success(_) => info!("Task {} is done", task_id),
            TaskOutcome::Failure(msg) => error!("Task {} failed: {}", task_id, msg),
        }
        info!("Task {} total use time: {:.3} s", task_id, elapsed.as_secs_f64());

        outcome
    }
}
