use clap::Parser;
use std::sync::Arc;
use task_agent_client::AuthorityClient;
use task_agent_core::TaskType;
use task_agent_worker::metrics::SysinfoProvider;
use task_agent_worker::{
    AmqpBroker, ErrorAction, ExchangeKind, MetricsCollectionHandler, PolicyPreset,
    TaskHandlerRegistry, Worker, WorkerConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ta-worker")]
#[command(about = "Task lifecycle worker", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(long)]
    config: Option<String>,

    /// Broker host
    #[arg(long)]
    host: Option<String>,

    /// Broker port
    #[arg(long)]
    port: Option<u16>,

    /// Broker user
    #[arg(long)]
    user: Option<String>,

    /// Broker password
    #[arg(long)]
    password: Option<String>,

    /// Broker virtual host
    #[arg(long)]
    vhost: Option<String>,

    #[arg(long)]
    exchange_name: Option<String>,

    #[arg(long, value_enum)]
    exchange_kind: Option<ExchangeKind>,

    #[arg(long)]
    queue_name: Option<String>,

    /// Ignored for fanout exchanges
    #[arg(long)]
    routing_key: Option<String>,

    /// Maximum unacknowledged deliveries
    #[arg(long)]
    prefetch: Option<u16>,

    /// Identity matched against broadcast tasks
    #[arg(long)]
    device_id: Option<String>,

    /// Failure policy preset; the per-error flags below refine it
    #[arg(long, value_enum)]
    policy: Option<PolicyPreset>,

    #[arg(long, value_enum)]
    on_decode_error: Option<ErrorAction>,

    #[arg(long, value_enum)]
    on_auth_error: Option<ErrorAction>,

    #[arg(long, value_enum)]
    on_terminal_report_error: Option<ErrorAction>,
}

impl Args {
    /// CLI flags win over the config file
    fn apply(self, config: &mut WorkerConfig) {
        let broker = &mut config.broker;
        if let Some(host) = self.host {
            broker.host = host;
        }
        if let Some(port) = self.port {
            broker.port = port;
        }
        if let Some(user) = self.user {
            broker.user = user;
        }
        if let Some(password) = self.password {
            broker.password = password;
        }
        if let Some(vhost) = self.vhost {
            broker.vhost = vhost;
        }
        if let Some(exchange) = self.exchange_name {
            broker.exchange = exchange;
        }
        if let Some(kind) = self.exchange_kind {
            broker.exchange_kind = kind;
        }
        if let Some(queue) = self.queue_name {
            broker.queue = queue;
        }
        if let Some(routing_key) = self.routing_key {
            broker.routing_key = routing_key;
        }
        if let Some(prefetch) = self.prefetch {
            broker.prefetch = prefetch;
        }
        if let Some(device_id) = self.device_id {
            config.device_id = Some(device_id);
        }
        if let Some(preset) = self.policy {
            config.policy = preset.into();
        }
        if let Some(action) = self.on_decode_error {
            config.policy.on_decode_error = action;
        }
        if let Some(action) = self.on_auth_error {
            config.policy.on_auth_error = action;
        }
        if let Some(action) = self.on_terminal_report_error {
            config.policy.on_terminal_report_error = action;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        WorkerConfig::from_file(config_path)?
    } else {
        WorkerConfig::default()
    };
    args.apply(&mut config);
    config.validate()?;

    let consumer_tag = config.generate_consumer_tag();
    config.consumer_tag = Some(consumer_tag.clone());

    let registry = TaskHandlerRegistry::new();
    registry.register(
        TaskType::METRICS_COLLECTION,
        MetricsCollectionHandler::new(Arc::new(SysinfoProvider::new()), &config.metrics),
    );
    tracing::info!("Registered task types: {:?}", registry.task_types());

    let broker = AmqpBroker::connect(config.broker.amqp_uri(), consumer_tag).await?;
    tracing::info!(
        "Connected to broker at {}:{}",
        config.broker.host,
        config.broker.port
    );
    let reporter = AuthorityClient::new(config.authority.clone());

    let worker = Worker::new(config, Arc::new(broker), Arc::new(reporter), registry);

    // Handle shutdown signals
    let shutdown = worker.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal");
        shutdown.shutdown();
    });

    worker.run().await?;

    Ok(())
}
