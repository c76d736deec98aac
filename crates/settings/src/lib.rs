//! Settings loader for synapse.
//!
//! A synapse is driven by a single JSON document:
//!
//! ```json
//! {
//!   "kafka": {
//!     "connection": { "bootstrap.servers": "localhost:9092" },
//!     "consumer": { "group.id": "my-synapse", "auto.offset.reset": "earliest" },
//!     "topics": { "in": "orders.created", "out": "orders.enriched" }
//!   },
//!   "synapse": { "poll_timeout_ms": 1000 }
//! }
//! ```
//!
//! [`Settings::load`] parses and validates the document once. [`SettingsStore`]
//! keeps the current [`Settings`] behind an `Arc` and swaps in a freshly loaded
//! copy on [`SettingsStore::reload`], so readers never see a half-replaced value.
//!
//! # Example
//!
//! ```ignore
//! use synapse_settings::SettingsStore;
//!
//! let store = SettingsStore::open("settings.json")?;
//! let topic = store.current().physical_topic("in")?.to_string();
//! store.reload()?;
//! ```

pub mod error;
mod settings;
mod store;
mod value;

pub use error::{ConfigError, Result};
pub use settings::{KafkaSettings, RuntimeSettings, Settings};
pub use store::SettingsStore;
pub use value::OptionValue;
