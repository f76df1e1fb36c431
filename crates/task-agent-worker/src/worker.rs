use crate::audience::AudienceFilter;
use crate::broker::{Broker, Delivery, ExchangeKind, Topology};
use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};
use crate::executor::TaskExecutor;
use crate::handler::TaskHandlerRegistry;
use crate::lifecycle::LifecycleReporter;
use crate::policy::{ErrorAction, FailurePolicy};

use futures::StreamExt;
use std::sync::Arc;
use task_agent_client::StatusReporter;
use task_agent_core::{TaskError, TaskMessage, TaskStatus};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// What became of one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Terminal status recorded, then acknowledged
    Completed(TaskStatus),
    /// Broadcast addressed to another device, acknowledged untouched
    NotAddressed,
    /// Dropped by the failure policy, acknowledged without a terminal status
    Discarded,
}

/// Stops the delivery loop between two deliveries
#[derive(Clone)]
pub struct ShutdownHandle(Arc<Notify>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        // notify_one keeps a permit if the loop is busy with a delivery
        self.0.notify_one();
    }
}

/// Single-consumer delivery loop
pub struct Worker {
    consumer_tag: String,
    topology: Topology,
    prefetch: u16,
    policy: FailurePolicy,
    audience: Option<AudienceFilter>,
    broker: Arc<dyn Broker>,
    reporter: Arc<dyn StatusReporter>,
    executor: TaskExecutor,
    shutdown: Arc<Notify>,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        broker: Arc<dyn Broker>,
        reporter: Arc<dyn StatusReporter>,
        registry: TaskHandlerRegistry,
    ) -> Self {
        let consumer_tag = config.generate_consumer_tag();
        let topology = config.broker.topology();

        let audience = match (topology.kind, &config.device_id) {
            (ExchangeKind::Fanout, Some(id)) => Some(AudienceFilter::new(id.clone())),
            _ => None,
        };

        Worker {
            consumer_tag,
            topology,
            prefetch: config.broker.prefetch,
            policy: config.policy,
            audience,
            broker,
            reporter,
            executor: TaskExecutor::new(Arc::new(registry)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    /// Run until the delivery stream ends, a shutdown is requested, or the
    /// failure policy aborts.
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting worker {} on {} -> {} ({:?}, prefetch {})",
            self.consumer_tag,
            self.topology.exchange,
            self.topology.queue,
            self.topology.kind,
            self.prefetch
        );
        if let Some(filter) = &self.audience {
            info!("Accepting broadcast tasks for device {}", filter.identity());
        }

        self.broker.declare_topology(&self.topology).await?;
        self.broker.set_prefetch(self.prefetch).await?;
        let mut deliveries = self.broker.consume().await?;

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Worker shutting down");
                    break;
                }

                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => {
                        let disposition = self.handle_delivery(delivery).await?;
                        debug!("Delivery finished: {:?}", disposition);
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        warn!("Delivery stream closed");
                        break;
                    }
                },
            }
        }

        Ok(())
    }

    /// Drive one delivery through the lifecycle. The ack is always the last
    /// step, and happens at most once.
    pub async fn handle_delivery(&self, delivery: Box<dyn Delivery>) -> Result<Disposition> {
        let message = match TaskMessage::from_slice(delivery.body()) {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to decode task message: {}", e);
                return self.apply_policy(self.policy.on_decode_error, delivery, e).await;
            }
        };
        let task_id = message.task_id().to_string();

        if let Some(filter) = &self.audience {
            if !filter.admits(&message) {
                debug!(
                    "Task {} addressed to {:?}, not {}",
                    task_id,
                    message.device_id(),
                    filter.identity()
                );
                delivery.ack().await?;
                return Ok(Disposition::NotAddressed);
            }
        }

        info!("Received task {} (type: {})", task_id, message.task_type);

        let token = match self
            .reporter
            .login(message.base_url(), message.credentials())
            .await
        {
            Ok(token) => token,
            Err(e) => {
                let err = TaskError::Authentication(e.to_string());
                error!("Task {}: {}", task_id, err);
                return self.apply_policy(self.policy.on_auth_error, delivery, err).await;
            }
        };

        let mut lifecycle = LifecycleReporter::new(self.reporter.clone(), &message, token);
        if let Err(e) = lifecycle.received().await {
            warn!("Task {}: RECEIVED not recorded: {}", task_id, e);
        }
        if let Err(e) = lifecycle.started().await {
            warn!("Task {}: STARTED not recorded: {}", task_id, e);
        }

        let outcome = self
            .executor
            .execute(&task_id, message.task_type, message.task_config())
            .await;
        let status = outcome.status();

        if let Err(e) = lifecycle.finish(outcome).await {
            error!("Task {}: {} not recorded: {}", task_id, status.as_str(), e);
            return self
                .apply_policy(self.policy.on_terminal_report_error, delivery, e)
                .await;
        }

        delivery.ack().await?;
        Ok(Disposition::Completed(status))
    }

    async fn apply_policy(
        &self,
        action: ErrorAction,
        delivery: Box<dyn Delivery>,
        err: TaskError,
    ) -> Result<Disposition> {
        match action {
            ErrorAction::Abort => {
                // Dropping the delivery leaves it unacknowledged
                drop(delivery);
                Err(WorkerError::Aborted(err))
            }
            ErrorAction::SkipAndAck => {
                warn!("Discarding message: {}", err);
                delivery.ack().await?;
                Ok(Disposition::Discarded)
            }
        }
    }
}
