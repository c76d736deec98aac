//! Typed settings document.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::value::OptionValue;

/// Settings for a single synapse, loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    /// Broker connection, consumer and topic settings.
    pub kafka: KafkaSettings,

    /// Runtime timeouts. The whole section is optional.
    #[serde(default)]
    pub synapse: RuntimeSettings,

    /// Any other top-level sections, kept for concrete synapses.
    #[serde(flatten)]
    extra: Map<String, Value>,

    /// Path the settings were loaded from. Filled in after parsing.
    #[serde(skip)]
    settings_file: PathBuf,
}

/// The `kafka` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KafkaSettings {
    /// Options shared by consumers and producers (`bootstrap.servers`, security, ...).
    pub connection: BTreeMap<String, OptionValue>,

    /// Consumer-only options (`group.id`, `auto.offset.reset`, ...).
    /// Overlaid on `connection` when a consumer is created.
    #[serde(default)]
    pub consumer: BTreeMap<String, OptionValue>,

    /// Logical topic name -> physical topic name.
    pub topics: BTreeMap<String, String>,
}

/// The optional `synapse` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Upper bound on a single consumer poll. Also the worst-case delay
    /// between `stop()` and the consumer closing.
    pub poll_timeout_ms: u64,
    /// How long `send` waits for delivery reports after enqueuing.
    pub delivery_timeout_ms: u64,
    /// Optional bound on the final flush of `send`. Absent means the flush
    /// waits until every record is delivered or the client gives up on it
    /// (`message.timeout.ms`).
    pub flush_timeout_ms: Option<u64>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 1000,
            delivery_timeout_ms: 10_000,
            flush_timeout_ms: None,
        }
    }
}

impl RuntimeSettings {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    /// `None` means unbounded.
    pub fn flush_timeout(&self) -> Option<Duration> {
        self.flush_timeout_ms.map(Duration::from_millis)
    }
}

impl Settings {
    /// Read and parse the settings file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Settings =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.settings_file = path.to_path_buf();

        debug!(
            "Loaded settings from {}: {} topics, {} connection options",
            path.display(),
            settings.kafka.topics.len(),
            settings.kafka.connection.len()
        );
        Ok(settings)
    }

    /// The file these settings were loaded from.
    pub fn settings_file(&self) -> &Path {
        &self.settings_file
    }

    /// Resolve a logical topic name to the physical broker topic.
    pub fn physical_topic(&self, logical: &str) -> Result<&str> {
        self.kafka
            .topics
            .get(logical)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownTopic(logical.to_string()))
    }

    /// Connection options overlaid by consumer options. On a key collision
    /// the consumer value wins.
    pub fn consumer_config(&self) -> BTreeMap<String, String> {
        let mut config = self.producer_config();
        for (key, value) in &self.kafka.consumer {
            config.insert(key.clone(), value.to_string());
        }
        config
    }

    /// Connection options only.
    pub fn producer_config(&self) -> BTreeMap<String, String> {
        self.kafka
            .connection
            .iter()
            .map(|(key, value)| (key.clone(), value.to_string()))
            .collect()
    }

    /// Deserialize a custom top-level section. Returns `Ok(None)` when the
    /// section is absent.
    pub fn section<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.extra.get(name) {
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| ConfigError::Section {
                    name: name.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }
}
