use task_agent_core::TaskMessage;

/// Drops broadcast messages addressed to another device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudienceFilter {
    identity: String,
}

impl AudienceFilter {
    pub fn new(identity: impl Into<String>) -> Self {
        AudienceFilter {
            identity: identity.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Messages without a `device_id` are addressed to nobody
    pub fn admits(&self, message: &TaskMessage) -> bool {
        message.device_id() == Some(self.identity.as_str())
    }
}
