//! One-shot send path shared by `Synapse::send` and handler contexts.

use std::sync::Arc;
use synapse_settings::{Settings, SettingsStore};
use tracing::debug;

use crate::client::ProducerFactory;
use crate::error::{Result, SynapseError};

pub(crate) struct Sender {
    settings: Arc<SettingsStore>,
    producers: Arc<dyn ProducerFactory>,
}

impl Sender {
    pub(crate) fn new(settings: Arc<SettingsStore>, producers: Arc<dyn ProducerFactory>) -> Self {
        Self {
            settings,
            producers,
        }
    }

    pub(crate) fn settings(&self) -> Arc<Settings> {
        self.settings.current()
    }

    pub(crate) fn store(&self) -> &SettingsStore {
        &self.settings
    }

    /// Resolve `topic`, then create a producer, enqueue, await delivery and flush.
    ///
    /// The topic is resolved before any client is created, so an unknown
    /// logical name never reaches the broker.
    pub(crate) fn send(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let settings = self.settings.current();
        let physical = settings.physical_topic(topic)?;
        let runtime = &settings.synapse;
        let client_err = |err| SynapseError::client(physical, err);

        let producer = self
            .producers
            .create(&settings.producer_config())
            .map_err(client_err)?;
        producer.produce(physical, payload).map_err(client_err)?;
        producer
            .await_delivery(runtime.delivery_timeout())
            .map_err(client_err)?;
        producer
            .flush(runtime.flush_timeout())
            .map_err(client_err)?;

        debug!(
            "Sent {} bytes to {physical} (logical topic '{topic}')",
            payload.len()
        );
        Ok(())
    }
}
