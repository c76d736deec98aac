//! In-process broker.
//!
//! Behaves like a single-partition broker per topic: records produced through
//! it are appended to the topic and handed to consumers in order. Tests use it
//! to script poll outcomes, inject failures and inspect what the runtime did
//! (clients created, options passed, subscriptions, records produced).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::client::{
    ClientError, ClientOptions, ConsumerFactory, EventConsumer, EventProducer, ProducerFactory,
};
use crate::event::Event;

/// A record accepted by the in-memory broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedRecord {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, VecDeque<Result<Event, ClientError>>>,
    next_offsets: HashMap<String, i64>,
    produced: Vec<ProducedRecord>,
    subscriptions: Vec<String>,
    consumer_options: Vec<ClientOptions>,
    producer_options: Vec<ClientOptions>,
    consumers_closed: usize,
    polls: usize,
    flush_timeouts: Vec<Option<Duration>>,
    produce_failures: VecDeque<ClientError>,
    delivery_failures: VecDeque<String>,
}

impl BrokerState {
    fn append(&mut self, topic: &str, payload: Vec<u8>) -> i64 {
        let offset = self.next_offsets.entry(topic.to_string()).or_insert(0);
        let event = Event {
            offset: *offset,
            ..Event::new(topic, payload)
        };
        *offset += 1;
        self.queues
            .entry(topic.to_string())
            .or_default()
            .push_back(Ok(event.clone()));
        event.offset
    }
}

/// Shared handle to an in-process broker. Clones see the same broker.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a record to `topic` as if another producer had sent it.
    /// Returns the record's offset.
    pub fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> i64 {
        self.lock().append(topic, payload.into())
    }

    /// Queue a broker error record on `topic`; the next poll past it
    /// returns `Err(ClientError::Poll)`.
    pub fn inject_poll_error(&self, topic: &str, message: &str) {
        self.lock()
            .queues
            .entry(topic.to_string())
            .or_default()
            .push_back(Err(ClientError::Poll(message.to_string())));
    }

    /// Fail the next `produce` call with `err`.
    pub fn fail_next_produce(&self, err: ClientError) {
        self.lock().produce_failures.push_back(err);
    }

    /// Report the next delivery as failed with `message`.
    pub fn fail_next_delivery(&self, message: &str) {
        self.lock()
            .delivery_failures
            .push_back(message.to_string());
    }

    /// Every record accepted by the broker, in order.
    pub fn produced(&self) -> Vec<ProducedRecord> {
        self.lock().produced.clone()
    }

    /// Topics subscribed to, one entry per `subscribe` call.
    pub fn subscriptions(&self) -> Vec<String> {
        self.lock().subscriptions.clone()
    }

    /// Options each consumer was created with.
    pub fn consumer_options(&self) -> Vec<ClientOptions> {
        self.lock().consumer_options.clone()
    }

    /// Options each producer was created with.
    pub fn producer_options(&self) -> Vec<ClientOptions> {
        self.lock().producer_options.clone()
    }

    pub fn consumers_created(&self) -> usize {
        self.lock().consumer_options.len()
    }

    pub fn consumers_closed(&self) -> usize {
        self.lock().consumers_closed
    }

    pub fn producers_created(&self) -> usize {
        self.lock().producer_options.len()
    }

    /// Number of consumer polls served so far.
    pub fn polls(&self) -> usize {
        self.lock().polls
    }

    /// Timeout passed to every producer flush, in order.
    pub fn flush_timeouts(&self) -> Vec<Option<Duration>> {
        self.lock().flush_timeouts.clone()
    }

    /// Records (and error records) not yet consumed from `topic`.
    pub fn pending(&self, topic: &str) -> usize {
        self.lock().queues.get(topic).map_or(0, VecDeque::len)
    }
}

impl ConsumerFactory for MemoryBroker {
    fn create(&self, options: &ClientOptions) -> Result<Box<dyn EventConsumer>, ClientError> {
        self.lock().consumer_options.push(options.clone());
        Ok(Box::new(MemoryConsumer {
            broker: self.clone(),
            topic: None,
        }))
    }
}

impl ProducerFactory for MemoryBroker {
    fn create(&self, options: &ClientOptions) -> Result<Box<dyn EventProducer>, ClientError> {
        self.lock().producer_options.push(options.clone());
        Ok(Box::new(MemoryProducer {
            broker: self.clone(),
            pending: Mutex::new(Vec::new()),
        }))
    }
}

struct MemoryConsumer {
    broker: MemoryBroker,
    topic: Option<String>,
}

impl EventConsumer for MemoryConsumer {
    fn subscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        self.broker.lock().subscriptions.push(topic.to_string());
        self.topic = Some(topic.to_string());
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Option<Result<Event, ClientError>> {
        let next = {
            let mut state = self.broker.lock();
            state.polls += 1;
            self.topic
                .as_ref()
                .and_then(|topic| state.queues.get_mut(topic))
                .and_then(VecDeque::pop_front)
        };
        if next.is_none() {
            std::thread::sleep(timeout);
        }
        next
    }

    fn close(self: Box<Self>) {
        self.broker.lock().consumers_closed += 1;
        debug!("Memory consumer closed");
    }
}

struct MemoryProducer {
    broker: MemoryBroker,
    pending: Mutex<Vec<ProducedRecord>>,
}

impl MemoryProducer {
    fn commit(&self) -> Result<(), ClientError> {
        let records: Vec<ProducedRecord> = std::mem::take(
            &mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if records.is_empty() {
            return Ok(());
        }

        let mut state = self.broker.lock();
        if let Some(message) = state.delivery_failures.pop_front() {
            return Err(ClientError::Broker(message));
        }
        for record in records {
            state.append(&record.topic, record.payload.clone());
            state.produced.push(record);
        }
        Ok(())
    }
}

impl EventProducer for MemoryProducer {
    fn produce(&self, topic: &str, payload: &[u8]) -> Result<(), ClientError> {
        if let Some(err) = self.broker.lock().produce_failures.pop_front() {
            return Err(err);
        }
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ProducedRecord {
                topic: topic.to_string(),
                payload: payload.to_vec(),
            });
        Ok(())
    }

    fn await_delivery(&self, _timeout: Duration) -> Result<(), ClientError> {
        self.commit()
    }

    fn flush(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
        self.broker.lock().flush_timeouts.push(timeout);
        self.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_are_consumed_in_order() {
        let broker = MemoryBroker::new();
        assert_eq!(broker.publish("t", "a"), 0);
        assert_eq!(broker.publish("t", "b"), 1);

        let mut consumer = ConsumerFactory::create(&broker, &ClientOptions::new()).unwrap();
        consumer.subscribe("t").unwrap();

        let first = consumer.poll(Duration::ZERO).unwrap().unwrap();
        let second = consumer.poll(Duration::ZERO).unwrap().unwrap();
        assert_eq!((first.payload.as_slice(), first.offset), (b"a".as_slice(), 0));
        assert_eq!((second.payload.as_slice(), second.offset), (b"b".as_slice(), 1));
        assert!(consumer.poll(Duration::ZERO).is_none());
        assert_eq!(broker.polls(), 3);
    }

    #[test]
    fn test_unsubscribed_consumer_sees_nothing() {
        let broker = MemoryBroker::new();
        broker.publish("t", "a");
        let mut consumer = ConsumerFactory::create(&broker, &ClientOptions::new()).unwrap();
        assert!(consumer.poll(Duration::ZERO).is_none());
        assert_eq!(broker.pending("t"), 1);
    }

    #[test]
    fn test_produced_records_loop_back_to_consumers() {
        let broker = MemoryBroker::new();
        let producer = ProducerFactory::create(&broker, &ClientOptions::new()).unwrap();
        producer.produce("t", b"x").unwrap();
        assert!(broker.produced().is_empty());

        producer.await_delivery(Duration::ZERO).unwrap();
        producer.flush(None).unwrap();

        assert_eq!(
            broker.produced(),
            vec![ProducedRecord {
                topic: "t".to_string(),
                payload: b"x".to_vec()
            }]
        );
        assert_eq!(broker.pending("t"), 1);
    }

    #[test]
    fn test_scripted_failures() {
        let broker = MemoryBroker::new();
        broker.fail_next_produce(ClientError::QueueFull);
        broker.fail_next_delivery("unknown topic");

        let producer = ProducerFactory::create(&broker, &ClientOptions::new()).unwrap();
        assert_eq!(producer.produce("t", b"x"), Err(ClientError::QueueFull));

        producer.produce("t", b"y").unwrap();
        assert_eq!(
            producer.await_delivery(Duration::ZERO),
            Err(ClientError::Broker("unknown topic".to_string()))
        );
        assert!(broker.produced().is_empty());
    }
}
