use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use synapse_settings::{Settings, SettingsStore};
use tracing::{debug, error, info, warn};

use crate::client::{ConsumerFactory, ProducerFactory};
use crate::error::{Result, SynapseError};
use crate::event::Event;
use crate::handler::{Context, EventHandler};
use crate::kafka::KafkaClients;
use crate::sender::Sender;
use crate::shutdown::StopHandle;

/// Lifecycle of a [`Synapse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Constructed, no consumer yet.
    Idle,
    /// A `listen` call owns an open consumer and is polling.
    Listening,
    /// The consumer was closed after a stop request. Terminal.
    Stopped,
}

/// Consumes one logical topic and hands events to `H`.
///
/// `Synapse` is `Sync` when `H: Send`, so it can be shared behind an `Arc`:
/// one thread runs [`Synapse::listen`] while others call [`Synapse::send`],
/// [`Synapse::reload`] or [`Synapse::stop`].
pub struct Synapse<H> {
    sender: Sender,
    consumers: Arc<dyn ConsumerFactory>,
    stop: StopHandle,
    state: Mutex<State>,
    handler: Mutex<H>,
}

impl<H: EventHandler> Synapse<H> {
    /// Load `settings_file` and talk to Kafka through rdkafka.
    pub fn new(settings_file: impl Into<PathBuf>, handler: H) -> Result<Self> {
        Self::with_clients(
            settings_file,
            handler,
            Arc::new(KafkaClients),
            Arc::new(KafkaClients),
        )
    }

    /// Load `settings_file` and use the given client factories.
    pub fn with_clients(
        settings_file: impl Into<PathBuf>,
        handler: H,
        consumers: Arc<dyn ConsumerFactory>,
        producers: Arc<dyn ProducerFactory>,
    ) -> Result<Self> {
        let store = SettingsStore::open(settings_file)?;
        info!("Synapse settings loaded from {}", store.path().display());
        Ok(Self::from_store(store, handler, consumers, producers))
    }

    pub fn from_store(
        store: SettingsStore,
        handler: H,
        consumers: Arc<dyn ConsumerFactory>,
        producers: Arc<dyn ProducerFactory>,
    ) -> Self {
        Self {
            sender: Sender::new(Arc::new(store), producers),
            consumers,
            stop: StopHandle::new(),
            state: Mutex::new(State::Idle),
            handler: Mutex::new(handler),
        }
    }

    pub fn state(&self) -> State {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: State) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Settings currently in effect.
    pub fn settings(&self) -> Arc<Settings> {
        self.sender.settings()
    }

    /// Consume `topic` until a stop is requested. Blocks the calling thread.
    ///
    /// The stop signal is checked at the top of every iteration, before
    /// polling. When it is set the consumer is closed and this returns
    /// `Ok(())`. Broker error records are logged and skipped. Handler errors
    /// and panics are logged and consumption continues.
    pub fn listen(&self, topic: &str) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match *state {
                State::Idle => *state = State::Listening,
                State::Listening => return Err(SynapseError::AlreadyListening),
                State::Stopped => return Err(SynapseError::Stopped),
            }
        }

        let settings = self.settings();
        let physical = match settings.physical_topic(topic) {
            Ok(physical) => physical,
            Err(err) => {
                self.set_state(State::Idle);
                return Err(err.into());
            }
        };

        let consumer = self
            .consumers
            .create(&settings.consumer_config())
            .and_then(|mut consumer| consumer.subscribe(physical).map(|()| consumer));
        let mut consumer = match consumer {
            Ok(consumer) => consumer,
            Err(err) => {
                self.set_state(State::Idle);
                return Err(SynapseError::client(physical, err));
            }
        };

        let poll_timeout = settings.synapse.poll_timeout();
        info!("Listening on {physical} (logical topic '{topic}')");

        loop {
            if self.stop.is_stopping() {
                consumer.close();
                self.set_state(State::Stopped);
                info!("Stopped listening on {physical}");
                return Ok(());
            }

            match consumer.poll(poll_timeout) {
                None => {}
                Some(Err(err)) => warn!("Broker error while consuming {physical}: {err}"),
                Some(Ok(event)) => self.dispatch(&event),
            }
        }
    }

    fn dispatch(&self, event: &Event) {
        debug!(
            "Received event from {} [{}] at offset {}",
            event.topic, event.partition, event.offset
        );
        let ctx = Context::new(&self.sender, &self.stop);
        let mut handler = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
        match catch_unwind(AssertUnwindSafe(|| handler.handle(event, &ctx))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(
                "Handler failed on {} [{}] at offset {}: {err:#}",
                event.topic, event.partition, event.offset
            ),
            Err(panic) => error!(
                "Handler panicked on {} [{}] at offset {}: {}",
                event.topic,
                event.partition,
                event.offset,
                panic_message(panic.as_ref())
            ),
        }
    }

    /// Produce `payload` to the logical `topic`.
    ///
    /// Works in any state and never changes it. A new producer is created for
    /// every call and flushed before returning.
    pub fn send(&self, topic: &str, payload: &[u8]) -> Result<()> {
        self.sender.send(topic, payload)
    }

    /// Request the listen loop to stop. Does not block.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// A handle other threads can use to request a stop.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Re-read the settings file. An already-open consumer keeps the options
    /// and topic it was created with; the next `listen` or `send` uses the
    /// reloaded settings.
    pub fn reload(&self) -> Result<()> {
        self.sender.store().reload()?;
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, LogHandler};
    use crate::memory::MemoryBroker;
    use tempfile::TempDir;

    fn synapse<H: EventHandler>(dir: &TempDir, broker: &MemoryBroker, handler: H) -> Synapse<H> {
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{
                "kafka": {
                    "connection": {},
                    "consumer": {"group.id": "g"},
                    "topics": {"in": "topic-in", "out": "topic-out"}
                },
                "synapse": {"poll_timeout_ms": 5}
            }"#,
        )
        .unwrap();
        Synapse::with_clients(
            path,
            handler,
            Arc::new(broker.clone()),
            Arc::new(broker.clone()),
        )
        .unwrap()
    }

    #[test]
    fn test_new_synapse_is_idle() {
        let dir = TempDir::new().unwrap();
        let broker = MemoryBroker::new();
        let synapse = synapse(&dir, &broker, LogHandler);
        assert_eq!(synapse.state(), State::Idle);
        assert_eq!(
            synapse.settings().settings_file(),
            dir.path().join("settings.json")
        );
    }

    #[test]
    fn test_unknown_topic_keeps_synapse_idle() {
        let dir = TempDir::new().unwrap();
        let broker = MemoryBroker::new();
        let synapse = synapse(&dir, &broker, LogHandler);

        let result = synapse.listen("nope");
        assert!(matches!(result, Err(SynapseError::Config(_))));
        assert_eq!(synapse.state(), State::Idle);
        assert_eq!(broker.consumers_created(), 0);
    }

    #[test]
    fn test_listen_after_stopped_is_rejected() {
        let dir = TempDir::new().unwrap();
        let broker = MemoryBroker::new();
        let synapse = synapse(&dir, &broker, LogHandler);

        synapse.stop();
        synapse.listen("in").unwrap();
        assert_eq!(synapse.state(), State::Stopped);
        assert!(matches!(synapse.listen("in"), Err(SynapseError::Stopped)));
    }

    #[test]
    fn test_handler_errors_do_not_stop_consumption() {
        let dir = TempDir::new().unwrap();
        let broker = MemoryBroker::new();
        broker.publish("topic-in", "fail");
        broker.publish("topic-in", "ok");

        let synapse = synapse(
            &dir,
            &broker,
            handler_fn(|event: &Event, ctx: &Context<'_>| {
                if event.payload == b"fail" {
                    anyhow::bail!("rejected");
                }
                ctx.stop();
                Ok(())
            }),
        );

        synapse.listen("in").unwrap();
        assert_eq!(broker.pending("topic-in"), 0);
        assert_eq!(synapse.state(), State::Stopped);
    }

    #[test]
    fn test_handler_panic_is_contained() {
        let dir = TempDir::new().unwrap();
        let broker = MemoryBroker::new();
        broker.publish("topic-in", "boom");
        broker.publish("topic-in", "ok");

        let synapse = synapse(
            &dir,
            &broker,
            handler_fn(|event: &Event, ctx: &Context<'_>| {
                if event.payload == b"boom" {
                    panic!("handler exploded");
                }
                ctx.stop();
                Ok(())
            }),
        );

        synapse.listen("in").unwrap();
        assert_eq!(broker.pending("topic-in"), 0);
        assert_eq!(synapse.state(), State::Stopped);
        assert_eq!(broker.consumers_closed(), 1);
    }

    #[test]
    fn test_handler_can_pass_stop_handle_to_another_thread() {
        let dir = TempDir::new().unwrap();
        let broker = MemoryBroker::new();
        broker.publish("topic-in", "start");

        let synapse = synapse(
            &dir,
            &broker,
            handler_fn(|_event: &Event, ctx: &Context<'_>| {
                let stop = ctx.stop_handle();
                std::thread::spawn(move || stop.stop()).join().unwrap();
                Ok(())
            }),
        );

        synapse.listen("in").unwrap();
        assert_eq!(synapse.state(), State::Stopped);
        assert!(synapse.stop_handle().is_stopping());
    }

    #[test]
    fn test_send_does_not_change_state() {
        let dir = TempDir::new().unwrap();
        let broker = MemoryBroker::new();
        let synapse = synapse(&dir, &broker, LogHandler);

        synapse.send("out", b"x").unwrap();
        assert_eq!(synapse.state(), State::Idle);
        assert_eq!(broker.producers_created(), 1);
    }
}
