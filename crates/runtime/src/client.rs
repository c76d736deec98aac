use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::event::Event;

/// Flat `key -> value` options handed to the broker client.
pub type ClientOptions = BTreeMap<String, String>;

/// Errors reported by a broker client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The local producer queue is saturated.
    #[error("local producer queue is full")]
    QueueFull,

    /// Client creation, subscription, produce, delivery or flush failure.
    #[error("{0}")]
    Broker(String),

    /// An error record returned by a consumer poll. Never fatal to the loop.
    #[error("poll error: {0}")]
    Poll(String),
}

/// Creates consumers from flat client options.
pub trait ConsumerFactory: Send + Sync {
    fn create(&self, options: &ClientOptions) -> Result<Box<dyn EventConsumer>, ClientError>;
}

/// A consumer handle owned by a single `listen` call.
pub trait EventConsumer: Send {
    fn subscribe(&mut self, topic: &str) -> Result<(), ClientError>;

    /// Wait at most `timeout` for the next record.
    ///
    /// `None` means nothing arrived in time. `Some(Err(_))` is a broker-reported
    /// error record.
    fn poll(&mut self, timeout: Duration) -> Option<Result<Event, ClientError>>;

    /// Leave the group and release the handle.
    fn close(self: Box<Self>);
}

/// Creates producers from flat client options.
pub trait ProducerFactory: Send + Sync {
    fn create(&self, options: &ClientOptions) -> Result<Box<dyn EventProducer>, ClientError>;
}

/// A short-lived producer handle owned by a single `send` call.
pub trait EventProducer: Send {
    /// Enqueue one record.
    fn produce(&self, topic: &str, payload: &[u8]) -> Result<(), ClientError>;

    /// Serve delivery reports until every enqueued record was reported or
    /// `timeout` elapses. Fails only on a negative delivery report; records
    /// still outstanding at the deadline are left to [`EventProducer::flush`].
    fn await_delivery(&self, timeout: Duration) -> Result<(), ClientError>;

    /// Block until the queue drains, or at most `timeout` when one is given.
    /// Fails on timeout or a negative report.
    fn flush(&self, timeout: Option<Duration>) -> Result<(), ClientError>;
}
