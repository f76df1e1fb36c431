use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use task_agent_core::{TaskError, TaskType};

/// Result type for task handlers
pub type HandlerResult = Result<serde_json::Value, TaskError>;

/// Trait for task handlers
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Execute the task with its `task_config`
    async fn execute(&self, config: &serde_json::Value) -> HandlerResult;
}

/// Registry of task handlers by task type
pub struct TaskHandlerRegistry {
    handlers: Arc<RwLock<HashMap<TaskType, Arc<dyn TaskHandler>>>>,
}

impl TaskHandlerRegistry {
    pub fn new() -> Self {
        TaskHandlerRegistry {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a task handler for a specific task type
    pub fn register<H: TaskHandler + 'static>(&self, task_type: TaskType, handler: H) {
        let mut handlers = self.handlers.write();
        handlers.insert(task_type, Arc::new(handler));
    }

    /// Select the handler for a task type
    pub fn dispatch(&self, task_type: TaskType) -> Result<Arc<dyn TaskHandler>, TaskError> {
        let handlers = self.handlers.read();
        handlers
            .get(&task_type)
            .cloned()
            .ok_or(TaskError::TaskTypeUnsupported(task_type))
    }

    /// Check if a handler is registered for a task type
    pub fn has_handler(&self, task_type: TaskType) -> bool {
        let handlers = self.handlers.read();
        handlers.contains_key(&task_type)
    }

    /// Get all registered task types
    pub fn task_types(&self) -> Vec<TaskType> {
        let handlers = self.handlers.read();
        let mut types: Vec<TaskType> = handlers.keys().copied().collect();
        types.sort();
        types
    }
}

impl Default for TaskHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
