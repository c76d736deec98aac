//! Synapse library
//!
//! A synapse consumes events from one Kafka topic and optionally produces
//! events to another, driven by a JSON settings file.
//!
//! # Crates
//!
//! - [`settings`] - typed settings loader with atomic reload
//! - [`runtime`] - the blocking listen loop, send path and event handlers
//! - [`trigger`] - action profiles and the HTTP trigger
//!
//! # CLI Usage
//!
//! ```bash
//! # Log every event from the logical topic "in"
//! synapse listen --settings settings.json --topic in
//!
//! # Relay "in" to "out"
//! synapse listen --settings settings.json --topic in --forward-to out
//!
//! # Send one payload
//! synapse send --settings settings.json --topic out --payload '{"hello":"world"}'
//!
//! # Serve GET /event/{event_type}/{name}/{action_profile}
//! synapse serve --settings settings.json --events-dir /web/events --bind 0.0.0.0:5000
//! ```

use clap::Parser;
use std::path::PathBuf;

pub use synapse_runtime as runtime;
pub use synapse_settings as settings;
pub use synapse_trigger as trigger;

pub use synapse_runtime::{EventHandler, Synapse, SynapseError};

#[derive(Parser, Clone, Debug)]
pub struct SettingsOpts {
    /// Path to the synapse settings JSON file
    #[arg(long = "settings", env = "SYNAPSE_SETTINGS", value_name = "PATH")]
    pub settings_file: PathBuf,
}
