use crate::broker::{ExchangeKind, Topology};
use crate::collector::MetricsConfig;
use crate::policy::FailurePolicy;
use anyhow::{bail, Context};
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use serde::{Deserialize, Serialize};
use task_agent_client::AuthorityConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    pub exchange: String,
    pub exchange_kind: ExchangeKind,
    pub queue: String,
    pub routing_key: String,
    pub durable: bool,
    pub prefetch: u16,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            host: "localhost".to_string(),
            port: 5672,
            user: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            exchange: "device_exchange".to_string(),
            exchange_kind: ExchangeKind::Direct,
            queue: "collect_device_perf_data_queue".to_string(),
            routing_key: "device_perf_data".to_string(),
            durable: true,
            prefetch: 1,
        }
    }
}

impl BrokerConfig {
    /// Connection target, credentials and vhost unescaped
    pub fn amqp_uri(&self) -> AMQPUri {
        AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.user.clone(),
                    password: self.password.clone(),
                },
                host: self.host.clone(),
                port: self.port,
            },
            vhost: self.vhost.clone(),
            ..AMQPUri::default()
        }
    }

    pub fn topology(&self) -> Topology {
        Topology {
            exchange: self.exchange.clone(),
            kind: self.exchange_kind,
            queue: self.queue.clone(),
            routing_key: self.routing_key.clone(),
            durable: self.durable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorkerConfig {
    pub broker: BrokerConfig,
    pub authority: AuthorityConfig,
    /// Identity matched against `device_id` on a fanout exchange
    pub device_id: Option<String>,
    pub consumer_tag: Option<String>,
    pub policy: FailurePolicy,
    pub metrics: MetricsConfig,
}

impl WorkerConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config: WorkerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let broker = &self.broker;
        for (name, value) in [
            ("host", &broker.host),
            ("user", &broker.user),
            ("password", &broker.password),
            ("exchange", &broker.exchange),
            ("queue", &broker.queue),
        ] {
            if value.is_empty() {
                bail!("broker.{} must not be empty", name);
            }
        }
        if broker.port == 0 {
            bail!("broker.port must not be 0");
        }
        if broker.prefetch == 0 {
            bail!("broker.prefetch must be at least 1");
        }
        if broker.exchange_kind == ExchangeKind::Direct && broker.routing_key.is_empty() {
            bail!("broker.routing_key is required for a direct exchange");
        }
        if broker.exchange_kind == ExchangeKind::Fanout
            && self.device_id.as_deref().map_or(true, str::is_empty)
        {
            bail!("device_id is required for a fanout exchange");
        }
        if !self.authority.task_result_path.contains("{task_id}") {
            bail!("authority.task_result_path must contain {{task_id}}");
        }
        Ok(())
    }

    pub fn generate_consumer_tag(&self) -> String {
        use std::process;
        use uuid::Uuid;

        if let Some(tag) = &self.consumer_tag {
            return tag.clone();
        }

        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        let pid = process::id();
        let uuid = Uuid::new_v4().simple().to_string();

        format!("{}-{}-{}", hostname, pid, &uuid[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ErrorAction;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorkerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.broker.prefetch, 1);

        let uri = config.broker.amqp_uri();
        assert_eq!(uri.authority.host, "localhost");
        assert_eq!(uri.authority.port, 5672);
        assert_eq!(uri.vhost, "/");
    }

    #[test]
    fn test_credentials_with_reserved_characters() {
        let mut config = WorkerConfig::default();
        config.broker.user = "agent:1".to_string();
        config.broker.password = "p@ss/w:rd#".to_string();

        let uri = config.broker.amqp_uri();
        assert_eq!(uri.authority.userinfo.username, "agent:1");
        assert_eq!(uri.authority.userinfo.password, "p@ss/w:rd#");
        assert_eq!(uri.authority.host, "localhost");
        assert_eq!(uri.vhost, "/");
    }

    #[test]
    fn test_from_file_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "broker:\n  host: rabbit\n  exchange_kind: fanout\n  vhost: agents\n\
             device_id: dev-7\npolicy:\n  on_decode_error: abort\n"
        )
        .unwrap();

        let config = WorkerConfig::from_file(file.path().to_str().unwrap()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.broker.host, "rabbit");
        assert_eq!(config.broker.port, 5672);
        assert_eq!(config.broker.exchange_kind, ExchangeKind::Fanout);
        assert_eq!(config.broker.amqp_uri().vhost, "agents");
        assert_eq!(config.device_id.as_deref(), Some("dev-7"));
        assert_eq!(config.policy.on_decode_error, ErrorAction::Abort);
        assert_eq!(config.policy.on_terminal_report_error, ErrorAction::Abort);
        assert_eq!(config.metrics.disk_path, "/");
    }

    #[test]
    fn test_missing_file() {
        assert!(WorkerConfig::from_file("/nonexistent/worker.yaml").is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = WorkerConfig::default();
        config.broker.prefetch = 0;
        assert!(config.validate().is_err());

        let mut config = WorkerConfig::default();
        config.broker.host.clear();
        assert!(config.validate().is_err());

        let mut config = WorkerConfig::default();
        config.broker.exchange_kind = ExchangeKind::Fanout;
        assert!(config.validate().is_err());
        config.device_id = Some("dev-1".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn test_consumer_tag() {
        let mut config = WorkerConfig::default();
        let tag = config.generate_consumer_tag();
        let suffix = tag.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(tag.contains(&format!("-{}-", std::process::id())));

        config.consumer_tag = Some("fixed".to_string());
        assert_eq!(config.generate_consumer_tag(), "fixed");
    }
}
