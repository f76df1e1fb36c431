use super::{Broker, BrokerResult, Delivery, DeliveryStream, Topology};
use crate::error::BrokerError;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Default)]
struct Ledger {
    acked: Vec<Vec<u8>>,
    returned: Vec<Vec<u8>>,
    in_flight: usize,
    max_in_flight: usize,
}

/// In-process broker honoring prefetch.
///
/// Deliveries dropped without an ack are recorded as returned, which is what a
/// real broker would requeue.
pub struct MemoryBroker {
    sender: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    topology: Mutex<Option<Topology>>,
    prefetch: Mutex<u16>,
    ledger: Arc<Mutex<Ledger>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        MemoryBroker {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            topology: Mutex::new(None),
            prefetch: Mutex::new(0),
            ledger: Arc::new(Mutex::new(Ledger::default())),
        }
    }

    /// Enqueue a message body. Returns false once the broker is closed.
    pub fn publish(&self, body: impl Into<Vec<u8>>) -> bool {
        match self.sender.lock().as_ref() {
            Some(tx) => tx.send(body.into()).is_ok(),
            None => false,
        }
    }

    /// Stop accepting messages; the delivery stream ends once drained
    pub fn close(&self) {
        self.sender.lock().take();
    }

    pub fn topology(&self) -> Option<Topology> {
        self.topology.lock().clone()
    }

    pub fn prefetch(&self) -> u16 {
        *self.prefetch.lock()
    }

    /// Bodies acknowledged so far, in ack order
    pub fn acked(&self) -> Vec<Vec<u8>> {
        self.ledger.lock().acked.clone()
    }

    /// Bodies dropped without an ack
    pub fn returned(&self) -> Vec<Vec<u8>> {
        self.ledger.lock().returned.clone()
    }

    /// Highest number of simultaneously unacknowledged deliveries observed
    pub fn max_in_flight(&self) -> usize {
        self.ledger.lock().max_in_flight
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn declare_topology(&self, topology: &Topology) -> BrokerResult<()> {
        *self.topology.lock() = Some(topology.clone());
        Ok(())
    }

    async fn set_prefetch(&self, count: u16) -> BrokerResult<()> {
        *self.prefetch.lock() = count;
        Ok(())
    }

    async fn consume(&self) -> BrokerResult<DeliveryStream> {
        if self.topology.lock().is_none() {
            return Err(BrokerError::TopologyMissing);
        }
        let receiver = self
            .receiver
            .lock()
            .take()
            .ok_or_else(|| BrokerError::Consume("Queue already has a consumer".to_string()))?;

        // 0 means unlimited, as in AMQP basic.qos
        let permits = match *self.prefetch.lock() {
            0 => Semaphore::MAX_PERMITS,
            n => n as usize,
        };
        let semaphore = Arc::new(Semaphore::new(permits));
        let ledger = self.ledger.clone();

        let stream = futures::stream::unfold(
            (receiver, semaphore, ledger),
            |(mut receiver, semaphore, ledger)| async move {
                let permit = semaphore.clone().acquire_owned().await.ok()?;
                let body = receiver.recv().await?;

                {
                    let mut l = ledger.lock();
                    l.in_flight += 1;
                    l.max_in_flight = l.max_in_flight.max(l.in_flight);
                }

                let delivery = MemoryDelivery {
                    body,
                    acked: false,
                    ledger: ledger.clone(),
                    _permit: permit,
                };
                Some((
                    Ok(Box::new(delivery) as Box<dyn Delivery>),
                    (receiver, semaphore, ledger),
                ))
            },
        );

        Ok(stream.boxed())
    }
}

struct MemoryDelivery {
    body: Vec<u8>,
    acked: bool,
    ledger: Arc<Mutex<Ledger>>,
    _permit: OwnedSemaphorePermit,
}

#[async_trait]
impl Delivery for MemoryDelivery {
    fn body(&self) -> &[u8] {
        &self.body
    }

    async fn ack(mut self: Box<Self>) -> BrokerResult<()> {
        self.acked = true;
        self.ledger.lock().acked.push(self.body.clone());
        Ok(())
    }
}

impl Drop for MemoryDelivery {
    fn drop(&mut self) {
        let mut ledger = self.ledger.lock();
        ledger.in_flight = ledger.in_flight.saturating_sub(1);
        if !self.acked {
            ledger.returned.push(std::mem::take(&mut self.body));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::ExchangeKind;
    use std::time::Duration;

    fn topology() -> Topology {
        Topology {
            exchange: "ex".to_string(),
            kind: ExchangeKind::Direct,
            queue: "q".to_string(),
            routing_key: "rk".to_string(),
            durable: true,
        }
    }

    #[tokio::test]
    async fn test_consume_requires_topology() {
        let broker = MemoryBroker::new();
        assert!(matches!(
            broker.consume().await,
            Err(BrokerError::TopologyMissing)
        ));
    }

    #[tokio::test]
    async fn test_prefetch_holds_back_next_delivery() {
        let broker = MemoryBroker::new();
        broker.declare_topology(&topology()).await.unwrap();
        broker.set_prefetch(1).await.unwrap();
        broker.publish(b"one".to_vec());
        broker.publish(b"two".to_vec());

        let mut stream = broker.consume().await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.body(), b"one");

        // Second delivery is withheld while the first is unacknowledged
        let blocked = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
        assert!(blocked.is_err());

        first.ack().await.unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.body(), b"two");
        second.ack().await.unwrap();

        assert_eq!(broker.acked(), vec![b"one".to_vec(), b"two".to_vec()]);
        assert_eq!(broker.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_dropped_delivery_is_returned() {
        let broker = MemoryBroker::new();
        broker.declare_topology(&topology()).await.unwrap();
        broker.publish(b"lost?".to_vec());
        broker.close();

        let mut stream = broker.consume().await.unwrap();
        let delivery = stream.next().await.unwrap().unwrap();
        drop(delivery);

        assert!(stream.next().await.is_none());
        assert!(broker.acked().is_empty());
        assert_eq!(broker.returned(), vec![b"lost?".to_vec()]);
    }
}
