//! Action profiles and firing them through a synapse.

use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use synapse_runtime::{EventHandler, Synapse};
use tracing::{debug, info};

use crate::error::{Result, TriggerError};
use crate::escape::escape_html;

/// One record to send: a logical topic and a JSON value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Action {
    pub topic: String,
    pub action: Value,
}

/// A list of actions fired together.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActionProfile {
    pub actions: Vec<Action>,
}

impl ActionProfile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                TriggerError::ProfileNotFound(path.to_path_buf())
            } else {
                TriggerError::ProfileRead {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        serde_json::from_str(&contents).map_err(|source| TriggerError::ProfileParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The three request parameters that identify a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRequest {
    pub event_type: String,
    pub name: String,
    pub profile: String,
}

fn validate_segment(segment: &str) -> Result<()> {
    let reason = if segment.is_empty() {
        "must not be empty"
    } else if segment == "." || segment == ".." {
        "must not be a relative directory"
    } else if segment.contains(['/', '\\', '\0']) {
        "must not contain path separators or NUL"
    } else {
        return Ok(());
    };
    Err(TriggerError::InvalidSegment {
        segment: segment.to_string(),
        reason,
    })
}

impl TriggerRequest {
    pub fn new(
        event_type: impl Into<String>,
        name: impl Into<String>,
        profile: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            name: name.into(),
            profile: profile.into(),
        }
    }

    /// `<events_dir>/<event_type>/<name>/<profile>.json`, after checking that
    /// no segment can leave `events_dir`.
    pub fn profile_path(&self, events_dir: &Path) -> Result<PathBuf> {
        validate_segment(&self.event_type)?;
        validate_segment(&self.name)?;
        validate_segment(&self.profile)?;
        Ok(events_dir
            .join(&self.event_type)
            .join(&self.name)
            .join(format!("{}.json", self.profile)))
    }

    /// Plain-text confirmation with every parameter HTML-escaped.
    pub fn confirmation(&self) -> String {
        format!(
            "Running action of Type: {} Name: {} Profile: {}",
            escape_html(&self.event_type),
            escape_html(&self.name),
            escape_html(&self.profile)
        )
    }
}

/// Load the profile for `request` and send each action, in order.
///
/// Stops at the first failing action. Returns the confirmation text.
pub fn fire<H: EventHandler>(
    synapse: &Synapse<H>,
    events_dir: &Path,
    request: &TriggerRequest,
) -> Result<String> {
    let path = request.profile_path(events_dir)?;
    let profile = ActionProfile::load(&path)?;
    info!(
        "Firing {} actions from {}",
        profile.actions.len(),
        path.display()
    );

    for action in &profile.actions {
        let payload = serde_json::to_vec(&action.action).map_err(|source| TriggerError::Encode {
            topic: action.topic.clone(),
            source,
        })?;
        synapse.send(&action.topic, &payload)?;
        debug!("Sent action to logical topic '{}'", action.topic);
    }

    Ok(request.confirmation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_path() {
        let request = TriggerRequest::new("alarm", "front-door", "open");
        assert_eq!(
            request.profile_path(Path::new("/web/events")).unwrap(),
            PathBuf::from("/web/events/alarm/front-door/open.json")
        );
    }

    #[test]
    fn test_traversal_segments_are_rejected() {
        for (event_type, name, profile) in [
            ("..", "n", "p"),
            ("t", ".", "p"),
            ("t", "n", ""),
            ("t", "a/b", "p"),
            ("t", "n", "..\\secret"),
            ("t\0", "n", "p"),
        ] {
            let request = TriggerRequest::new(event_type, name, profile);
            assert!(
                matches!(
                    request.profile_path(Path::new("/web/events")),
                    Err(TriggerError::InvalidSegment { .. })
                ),
                "{request:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_confirmation_is_escaped() {
        let request = TriggerRequest::new("alarm", "<b>door</b>", "open&close");
        assert_eq!(
            request.confirmation(),
            "Running action of Type: alarm Name: &lt;b&gt;door&lt;/b&gt; Profile: open&amp;close"
        );
    }

    #[test]
    fn test_load_missing_profile() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            ActionProfile::load(&dir.path().join("absent.json")),
            Err(TriggerError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_load_profile() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("p.json");
        std::fs::write(
            &path,
            r#"{"actions": [{"topic": "out", "action": {"light": "on"}}, {"topic": "log", "action": "text"}]}"#,
        )
        .unwrap();

        let profile = ActionProfile::load(&path).unwrap();
        assert_eq!(profile.actions.len(), 2);
        assert_eq!(profile.actions[0].topic, "out");
        assert_eq!(profile.actions[0].action, serde_json::json!({"light": "on"}));
        assert_eq!(profile.actions[1].action, serde_json::json!("text"));
    }
}
