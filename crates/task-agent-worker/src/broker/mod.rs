//! Broker connector seam.
//!
//! The delivery loop only sees [`Broker`] and [`Delivery`]. Acknowledging
//! consumes the delivery, so a second ack cannot be written.

mod amqp;
mod memory;

pub use amqp::AmqpBroker;
pub use memory::MemoryBroker;

use crate::error::BrokerError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// Exchange type of the declared topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    /// Routed by key, one consumer acts on each message
    #[default]
    Direct,
    /// Broadcast to every bound queue
    Fanout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchange: String,
    pub kind: ExchangeKind,
    pub queue: String,
    /// Ignored for fanout exchanges
    pub routing_key: String,
    pub durable: bool,
}

impl Topology {
    pub fn is_broadcast(&self) -> bool {
        self.kind == ExchangeKind::Fanout
    }

    /// Key used when binding the queue
    pub fn binding_key(&self) -> &str {
        if self.is_broadcast() {
            ""
        } else {
            &self.routing_key
        }
    }
}

/// One in-flight message with the exclusive right to acknowledge it
#[async_trait]
pub trait Delivery: Send {
    fn body(&self) -> &[u8];

    async fn ack(self: Box<Self>) -> BrokerResult<()>;
}

pub type DeliveryStream = BoxStream<'static, BrokerResult<Box<dyn Delivery>>>;

#[async_trait]
pub trait Broker: Send + Sync {
    async fn declare_topology(&self, topology: &Topology) -> BrokerResult<()>;

    /// Cap on unacknowledged deliveries handed to this consumer
    async fn set_prefetch(&self, count: u16) -> BrokerResult<()>;

    async fn consume(&self) -> BrokerResult<DeliveryStream>;
}
