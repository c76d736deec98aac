//! rdkafka backend.
//!
//! Uses the blocking `BaseConsumer` and `BaseProducer` so the listen loop and
//! the send path stay on the caller's thread.

use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{BaseProducer, BaseRecord, DeliveryResult, Producer, ProducerContext};
use rdkafka::util::Timeout;
use rdkafka::{ClientConfig, ClientContext, Message};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::client::{
    ClientError, ClientOptions, ConsumerFactory, EventConsumer, EventProducer, ProducerFactory,
};
use crate::event::Event;

/// Longest single producer poll while waiting for delivery reports.
const DELIVERY_POLL_SLICE: Duration = Duration::from_millis(100);

/// Creates rdkafka consumers and producers.
#[derive(Debug, Clone, Copy, Default)]
pub struct KafkaClients;

fn client_config(options: &ClientOptions) -> ClientConfig {
    let mut config = ClientConfig::new();
    for (key, value) in options {
        config.set(key.clone(), value.clone());
    }
    config
}

fn broker_error(err: KafkaError) -> ClientError {
    ClientError::Broker(err.to_string())
}

impl ConsumerFactory for KafkaClients {
    fn create(&self, options: &ClientOptions) -> Result<Box<dyn EventConsumer>, ClientError> {
        let inner: BaseConsumer = client_config(options).create().map_err(broker_error)?;
        Ok(Box::new(KafkaConsumer { inner }))
    }
}

impl ProducerFactory for KafkaClients {
    fn create(&self, options: &ClientOptions) -> Result<Box<dyn EventProducer>, ClientError> {
        let inner: BaseProducer<DeliveryTracker> = client_config(options)
            .create_with_context(DeliveryTracker::default())
            .map_err(broker_error)?;
        Ok(Box::new(KafkaProducer { inner }))
    }
}

struct KafkaConsumer {
    inner: BaseConsumer,
}

fn to_event<M: Message>(message: &M) -> Event {
    Event {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec),
        payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        timestamp: message.timestamp().to_millis(),
    }
}

impl EventConsumer for KafkaConsumer {
    fn subscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        self.inner.subscribe(&[topic]).map_err(broker_error)
    }

    fn poll(&mut self, timeout: Duration) -> Option<Result<Event, ClientError>> {
        self.inner.poll(timeout).map(|result| {
            result
                .map(|message| to_event(&message))
                .map_err(|err| ClientError::Poll(err.to_string()))
        })
    }

    fn close(self: Box<Self>) {
        self.inner.unsubscribe();
        // Dropping the BaseConsumer closes it and leaves the group.
        drop(self);
        debug!("Kafka consumer closed");
    }
}

/// Counts outstanding records and keeps the first negative delivery report.
#[derive(Default)]
struct DeliveryTracker {
    outstanding: AtomicUsize,
    failure: Mutex<Option<String>>,
}

impl DeliveryTracker {
    fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl ClientContext for DeliveryTracker {}

impl ProducerContext for DeliveryTracker {
    type DeliveryOpaque = ();

    fn delivery(&self, result: &DeliveryResult<'_>, _opaque: Self::DeliveryOpaque) {
        match result {
            Ok(message) => debug!(
                "Delivered record to {} [{}] at offset {}",
                message.topic(),
                message.partition(),
                message.offset()
            ),
            Err((err, message)) => {
                let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
                if failure.is_none() {
                    *failure = Some(format!("delivery to {} failed: {err}", message.topic()));
                }
            }
        }
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

struct KafkaProducer {
    inner: BaseProducer<DeliveryTracker>,
}

impl KafkaProducer {
    fn tracker(&self) -> &DeliveryTracker {
        self.inner.context()
    }

    fn check_failure(&self) -> Result<(), ClientError> {
        match self.tracker().take_failure() {
            Some(message) => Err(ClientError::Broker(message)),
            None => Ok(()),
        }
    }
}

impl EventProducer for KafkaProducer {
    fn produce(&self, topic: &str, payload: &[u8]) -> Result<(), ClientError> {
        let tracker = self.tracker();
        tracker.outstanding.fetch_add(1, Ordering::SeqCst);

        let record = BaseRecord::<(), [u8]>::to(topic).payload(payload);
        match self.inner.send(record) {
            Ok(()) => Ok(()),
            Err((err, _)) => {
                tracker.outstanding.fetch_sub(1, Ordering::SeqCst);
                match err {
                    KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull) => {
                        Err(ClientError::QueueFull)
                    }
                    other => Err(broker_error(other)),
                }
            }
        }
    }

    fn await_delivery(&self, timeout: Duration) -> Result<(), ClientError> {
        let deadline = Instant::now().checked_add(timeout);
        while self.tracker().outstanding() > 0 {
            let now = Instant::now();
            let remaining = deadline.map_or(DELIVERY_POLL_SLICE, |deadline| {
                deadline.saturating_duration_since(now)
            });
            if remaining.is_zero() {
                debug!(
                    "{} records still awaiting delivery reports after {timeout:?}",
                    self.tracker().outstanding()
                );
                break;
            }
            self.inner.poll(remaining.min(DELIVERY_POLL_SLICE));
        }
        self.check_failure()
    }

    fn flush(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
        self.inner
            .flush(Timeout::from(timeout))
            .map_err(|err| ClientError::Broker(format!("flush failed: {err}")))?;
        self.check_failure()
    }
}
