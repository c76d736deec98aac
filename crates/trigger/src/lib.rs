//! Action profile trigger for synapse.
//!
//! An action profile is a JSON document listing records to send:
//!
//! ```json
//! { "actions": [ { "topic": "out", "action": { "kind": "door", "state": "open" } } ] }
//! ```
//!
//! Profiles live at `<events_dir>/<event_type>/<name>/<profile>.json`. Firing a
//! profile sends every action, in order, through [`synapse_runtime::Synapse::send`]
//! (the action value is JSON-encoded). The HTTP server exposes this as
//! `GET /event/{event_type}/{name}/{action_profile}`.

pub mod error;
mod escape;
pub mod profile;
pub mod server;

pub use error::{Result, TriggerError};
pub use escape::escape_html;
pub use profile::{fire, Action, ActionProfile, TriggerRequest};
pub use server::{router, serve, AppState};
