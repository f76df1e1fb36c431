use crate::Result;
use async_trait::async_trait;
use std::fmt;
use task_agent_core::{Credentials, StatusUpdate};

/// Bearer token issued by the remote authority.
///
/// Scoped to the processing of a single message.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        AuthToken(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// Contract for talking to the remote authority
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Authenticate and obtain a token
    async fn login(&self, base_url: &str, credentials: &Credentials) -> Result<AuthToken>;

    /// Record a status transition for a task
    async fn patch_task_status(
        &self,
        base_url: &str,
        task_id: &str,
        token: &AuthToken,
        update: &StatusUpdate,
    ) -> Result<()>;
}
