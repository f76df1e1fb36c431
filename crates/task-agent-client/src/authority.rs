use crate::{AuthToken, ClientError, Result, StatusReporter};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use task_agent_core::{Credentials, StatusUpdate};
use tracing::debug;

/// Endpoints and success discriminants of the remote authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    pub login_path: String,
    /// `{task_id}` is substituted with the task identifier
    pub task_result_path: String,
    pub success_code: i64,
    pub login_success_message: String,
    pub update_success_message: String,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        AuthorityConfig {
            login_path: "/api/v1/system/users/login/".to_string(),
            task_result_path: "/api/v1/task-results/{task_id}/".to_string(),
            success_code: 20000,
            login_success_message: "登录成功".to_string(),
            update_success_message: "success".to_string(),
        }
    }
}

/// Application-level envelope wrapping every authority response
#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// HTTP/JSON client for the remote authority
#[derive(Clone)]
pub struct AuthorityClient {
    client: reqwest::Client,
    config: AuthorityConfig,
}

impl AuthorityClient {
    pub fn new(config: AuthorityConfig) -> Self {
        AuthorityClient {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(base_url: &str, path: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), path)
    }

    /// `task_id` is percent-encoded as a single path segment
    fn task_result_url(&self, base_url: &str, task_id: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidUrl(format!("{}: cannot be a base", base_url)))?;
            segments.pop_if_empty();
            let path = self.config.task_result_path.trim_start_matches('/');
            for segment in path.split('/') {
                segments.push(&segment.replace("{task_id}", task_id));
            }
        }
        Ok(url)
    }

    /// Decode the envelope and check the success discriminant
    async fn read_envelope(
        resp: reqwest::Response,
        expected_message: &str,
        success_code: i64,
    ) -> Result<Envelope> {
        let status = resp.status();
        let text = resp.text().await?;

        let envelope: Envelope = serde_json::from_str(&text).map_err(|e| {
            ClientError::InvalidResponse(format!("HTTP {} - {}: {}", status, e, text))
        })?;

        if envelope.code != success_code || envelope.message != expected_message {
            return Err(ClientError::Rejected {
                code: envelope.code,
                message: envelope.message,
            });
        }

        Ok(envelope)
    }
}

#[async_trait]
impl StatusReporter for AuthorityClient {
    async fn login(&self, base_url: &str, credentials: &Credentials) -> Result<AuthToken> {
        let url = Self::url(base_url, &self.config.login_path);
        debug!("Logging in to {} as {}", url, credentials.username);

        let resp = self
            .client
            .post(&url)
            .json(&LoginRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await?;

        let envelope = Self::read_envelope(
            resp,
            &self.config.login_success_message,
            self.config.success_code,
        )
        .await?;

        envelope
            .data
            .get("access")
            .and_then(|v| v.as_str())
            .map(AuthToken::new)
            .ok_or_else(|| {
                ClientError::InvalidResponse("Login response missing data.access".to_string())
            })
    }

    async fn patch_task_status(
        &self,
        base_url: &str,
        task_id: &str,
        token: &AuthToken,
        update: &StatusUpdate,
    ) -> Result<()> {
        let url = self.task_result_url(base_url, task_id)?;
        debug!("Patching {} with status {}", url, update.task_status.as_str());

        let resp = self
            .client
            .patch(url)
            .bearer_auth(token.as_str())
            .json(update)
            .send()
            .await?;

        Self::read_envelope(
            resp,
            &self.config.update_success_message,
            self.config.success_code,
        )
        .await?;

        Ok(())
    }
}
