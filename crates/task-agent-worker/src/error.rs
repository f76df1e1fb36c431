use task_agent_core::TaskError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Topology error: {0}")]
    Topology(String),

    #[error("Topology not declared before consuming")]
    TopologyMissing,

    #[error("Consume error: {0}")]
    Consume(String),

    #[error("Failed to ack message: {0}")]
    Ack(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("Processing aborted: {0}")]
    Aborted(#[source] TaskError),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
