use crate::{Result, TaskError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task type discriminant carried in `task_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(u32);

impl TaskType {
    /// Host performance data collection
    pub const METRICS_COLLECTION: TaskType = TaskType(0);

    pub const fn new(value: u32) -> Self {
        TaskType(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TaskType {
    fn from(value: u32) -> Self {
        TaskType(value)
    }
}

/// Login credentials for the remote authority
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Task metadata block of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireMetadata", into = "WireMetadata")]
pub struct Metadata {
    /// Remote authority base URL (e.g., "http://10.0.0.1:8000")
    pub base_url: String,

    /// Task identifier at the remote authority
    pub task_id: String,

    pub credentials: Credentials,

    /// Handler-specific configuration, shape depends on the task type
    pub task_config: serde_json::Value,

    /// Target worker identity for broadcast topologies
    pub device_id: Option<String>,
}

/// Flat metadata layout as it appears on the wire
#[derive(Serialize, Deserialize)]
struct WireMetadata {
    base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    task_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    task_id: Option<String>,
    username: String,
    password: String,
    #[serde(default = "empty_config")]
    task_config: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_id: Option<String>,
}

fn empty_config() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl TryFrom<WireMetadata> for Metadata {
    type Error = String;

    fn try_from(wire: WireMetadata) -> std::result::Result<Self, Self::Error> {
        let task_id = wire
            .task_uuid
            .or(wire.task_id)
            .ok_or_else(|| "missing field `task_uuid`".to_string())?;

        if wire.base_url.trim().is_empty() {
            return Err("metadata.base_url is empty".to_string());
        }
        if task_id.trim().is_empty() {
            return Err("metadata.task_uuid is empty".to_string());
        }
        if !wire.task_config.is_object() {
            return Err("metadata.task_config must be an object".to_string());
        }

        Ok(Metadata {
            base_url: wire.base_url,
            task_id,
            credentials: Credentials::new(wire.username, wire.password),
            task_config: wire.task_config,
            device_id: wire.device_id,
        })
    }
}

impl From<Metadata> for WireMetadata {
    fn from(metadata: Metadata) -> Self {
        WireMetadata {
            base_url: metadata.base_url,
            task_uuid: Some(metadata.task_id),
            task_id: None,
            username: metadata.credentials.username,
            password: metadata.credentials.password,
            task_config: metadata.task_config,
            device_id: metadata.device_id,
        }
    }
}

/// A task descriptor received from the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub task_type: TaskType,
    pub metadata: Metadata,
}

impl TaskMessage {
    /// Decode and validate a raw delivery body
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(TaskError::from)
    }

    pub fn task_id(&self) -> &str {
        &self.metadata.task_id
    }

    pub fn base_url(&self) -> &str {
        &self.metadata.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.metadata.credentials
    }

    pub fn task_config(&self) -> &serde_json::Value {
        &self.metadata.task_config
    }

    pub fn device_id(&self) -> Option<&str> {
        self.metadata.device_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"task_type":0,"metadata":{"base_url":"http://x","task_uuid":"abc","username":"u","password":"p","task_config":{"intervals":1,"count":2}}}"#;

    #[test]
    fn test_message_decoding() {
        let message = TaskMessage::from_slice(SAMPLE.as_bytes()).unwrap();

        assert_eq!(message.task_type, TaskType::METRICS_COLLECTION);
        assert_eq!(message.base_url(), "http://x");
        assert_eq!(message.task_id(), "abc");
        assert_eq!(message.credentials(), &Credentials::new("u", "p"));
        assert_eq!(message.task_config()["count"], 2);
        assert_eq!(message.device_id(), None);
    }

    #[test]
    fn test_task_id_alias() {
        let body = r#"{"task_type":0,"metadata":{"base_url":"http://x","task_id":"t-1","username":"u","password":"p","task_config":{},"device_id":"dev-7"}}"#;
        let message = TaskMessage::from_slice(body.as_bytes()).unwrap();

        assert_eq!(message.task_id(), "t-1");
        assert_eq!(message.device_id(), Some("dev-7"));
    }

    #[test]
    fn test_missing_task_config_defaults_to_empty() {
        let body = r#"{"task_type":3,"metadata":{"base_url":"http://x","task_uuid":"abc","username":"u","password":"p"}}"#;
        let message = TaskMessage::from_slice(body.as_bytes()).unwrap();

        assert_eq!(message.task_type, TaskType::new(3));
        assert!(message.task_config().as_object().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_messages_rejected() {
        let cases = [
            "not json",
            r#"{"task_type":0}"#,
            r#"{"task_type":"zero","metadata":{"base_url":"http://x","task_uuid":"abc","username":"u","password":"p"}}"#,
            r#"{"task_type":0,"metadata":{"base_url":"","task_uuid":"abc","username":"u","password":"p"}}"#,
            r#"{"task_type":0,"metadata":{"base_url":"http://x","task_uuid":" ","username":"u","password":"p"}}"#,
            r#"{"task_type":0,"metadata":{"base_url":"http://x","task_uuid":"abc","password":"p"}}"#,
            r#"{"task_type":0,"metadata":{"base_url":"http://x","task_uuid":"abc","username":"u","password":"p","task_config":[1]}}"#,
        ];

        for case in cases {
            match TaskMessage::from_slice(case.as_bytes()) {
                Err(TaskError::Deserialization(_)) => {}
                other => panic!("Expected Deserialization error for {case}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let message = TaskMessage::from_slice(SAMPLE.as_bytes()).unwrap();
        let rendered = format!("{:?}", message);

        assert!(rendered.contains("username"));
        assert!(!rendered.contains("\"p\""));
    }
}
