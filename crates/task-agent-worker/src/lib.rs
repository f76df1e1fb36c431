pub mod audience;
pub mod broker;
pub mod collector;
pub mod config;
pub mod error;
pub mod executor;
pub mod handler;
pub mod lifecycle;
pub mod metrics;
pub mod policy;
pub mod worker;

pub use broker::{AmqpBroker, Broker, Delivery, ExchangeKind, MemoryBroker, Topology};
pub use collector::{MetricsCollectionHandler, MetricsConfig, MetricsTaskConfig};
pub use config::{BrokerConfig, WorkerConfig};
pub use error::{BrokerError, WorkerError};
pub use handler::{TaskHandler, TaskHandlerRegistry};
pub use policy::{ErrorAction, FailurePolicy, PolicyPreset};
pub use worker::{Disposition, ShutdownHandle, Worker};
