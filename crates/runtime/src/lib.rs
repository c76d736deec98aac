//! Synapse runtime.
//!
//! A [`Synapse`] consumes events from one logical topic and hands each one to
//! an [`EventHandler`]. Handlers may produce to other logical topics through
//! the [`Context`] they are given. Logical topic names are resolved to physical
//! broker topics through the settings file (see `synapse-settings`).
//!
//! # Lifecycle
//!
//! ```text
//! Idle --listen(topic)--> Listening --stop() + next loop check--> Stopped
//! ```
//!
//! - [`Synapse::listen`] blocks the calling thread. Each iteration first checks
//!   the stop signal, then polls the broker for at most `poll_timeout_ms`.
//! - [`Synapse::stop`] only flips the signal. The consumer is closed by the
//!   loop itself on its next check, so shutdown takes up to one poll timeout
//!   plus the duration of a handler that is already running.
//! - [`Synapse::send`] is independent of the loop: a fresh producer is created
//!   per call, the payload is enqueued, delivery reports are awaited and the
//!   producer is flushed before returning. The flush is unbounded unless
//!   `flush_timeout_ms` is set.
//!
//! # Backends
//!
//! - [`kafka::KafkaClients`] - rdkafka `BaseConsumer` / `BaseProducer`
//! - [`memory::MemoryBroker`] - in-process broker for tests and dry runs

/// Broker client traits the runtime is written against
pub mod client;
pub mod error;
pub mod event;
pub mod handler;
pub mod kafka;
pub mod memory;
mod sender;
pub mod shutdown;
mod synapse;

pub use client::{
    ClientError, ClientOptions, ConsumerFactory, EventConsumer, EventProducer, ProducerFactory,
};
pub use error::{Result, SynapseError};
pub use event::Event;
pub use handler::{handler_fn, Context, EventHandler, FnHandler, ForwardHandler, LogHandler};
pub use kafka::KafkaClients;
pub use memory::{MemoryBroker, ProducedRecord};
pub use shutdown::{SignalState, StopHandle};
pub use synapse::{State, Synapse};

// Settings types used in the public API
pub use synapse_settings::{ConfigError, Settings, SettingsStore};
