use super::{Broker, BrokerResult, Delivery, DeliveryStream, ExchangeKind, Topology};
use crate::error::BrokerError;
use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicQosOptions, ExchangeDeclareOptions,
        QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    uri::AMQPUri,
    Channel, Connection, ConnectionProperties,
};
use parking_lot::Mutex;
use tracing::info;

/// RabbitMQ connector
pub struct AmqpBroker {
    // Dropping the connection closes the channel
    _connection: Connection,
    channel: Channel,
    consumer_tag: String,
    queue: Mutex<Option<String>>,
}

impl AmqpBroker {
    pub async fn connect(uri: AMQPUri, consumer_tag: impl Into<String>) -> BrokerResult<Self> {
        let connection = Connection::connect_uri(uri, ConnectionProperties::default())
            .await
            .map_err(|e| BrokerError::Connection(format!("Failed to connect to broker: {}", e)))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Connection(format!("Failed to open a channel: {}", e)))?;

        Ok(AmqpBroker {
            _connection: connection,
            channel,
            consumer_tag: consumer_tag.into(),
            queue: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn declare_topology(&self, topology: &Topology) -> BrokerResult<()> {
        let kind = match topology.kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
        };

        self.channel
            .exchange_declare(
                &topology.exchange,
                kind,
                ExchangeDeclareOptions {
                    durable: topology.durable,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Topology(format!("Failed to declare an exchange: {}", e)))?;

        let queue = self
            .channel
            .queue_declare(
                &topology.queue,
                QueueDeclareOptions {
                    durable: topology.durable,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Topology(format!("Failed to declare a queue: {}", e)))?;
        let queue_name = queue.name().as_str().to_string();

        info!(
            "Binding queue {} to exchange {} with routing key {:?}",
            queue_name,
            topology.exchange,
            topology.binding_key()
        );
        self.channel
            .queue_bind(
                &queue_name,
                &topology.exchange,
                topology.binding_key(),
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Topology(format!("Failed to bind a queue: {}", e)))?;

        *self.queue.lock() = Some(queue_name);
        Ok(())
    }

    async fn set_prefetch(&self, count: u16) -> BrokerResult<()> {
        self.channel
            .basic_qos(count, BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::Topology(format!("Failed to set QoS: {}", e)))
    }

    async fn consume(&self) -> BrokerResult<DeliveryStream> {
        let queue = self.queue.lock().clone().ok_or(BrokerError::TopologyMissing)?;

        let consumer = self
            .channel
            .basic_consume(
                &queue,
                &self.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume(format!("Failed to register a consumer: {}", e)))?;

        let stream = consumer.map(|item| {
            item.map(|delivery| Box::new(AmqpDelivery(delivery)) as Box<dyn Delivery>)
                .map_err(|e| BrokerError::Consume(e.to_string()))
        });

        Ok(stream.boxed())
    }
}

struct AmqpDelivery(lapin::message::Delivery);

#[async_trait]
impl Delivery for AmqpDelivery {
    fn body(&self) -> &[u8] {
        &self.0.data
    }

    async fn ack(self: Box<Self>) -> BrokerResult<()> {
        self.0
            .acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| BrokerError::Ack(e.to_string()))
    }
}
