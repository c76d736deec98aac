//! HTTP front end for firing action profiles.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use synapse_runtime::{ConsumerFactory, KafkaClients, LogHandler, ProducerFactory, Synapse};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::TriggerError;
use crate::profile::{fire, TriggerRequest};

/// Shared state for the trigger routes.
#[derive(Clone)]
pub struct AppState {
    settings_file: PathBuf,
    events_dir: PathBuf,
    consumers: Arc<dyn ConsumerFactory>,
    producers: Arc<dyn ProducerFactory>,
}

impl AppState {
    /// State that sends through Kafka.
    pub fn new(settings_file: impl Into<PathBuf>, events_dir: impl Into<PathBuf>) -> Self {
        Self::with_clients(
            settings_file,
            events_dir,
            Arc::new(KafkaClients),
            Arc::new(KafkaClients),
        )
    }

    pub fn with_clients(
        settings_file: impl Into<PathBuf>,
        events_dir: impl Into<PathBuf>,
        consumers: Arc<dyn ConsumerFactory>,
        producers: Arc<dyn ProducerFactory>,
    ) -> Self {
        Self {
            settings_file: settings_file.into(),
            events_dir: events_dir.into(),
            consumers,
            producers,
        }
    }

    /// Construct a synapse from the settings file and fire one profile.
    /// Runs on the calling thread; sends block.
    fn fire_blocking(&self, request: &TriggerRequest) -> Result<String, TriggerError> {
        let synapse = Synapse::with_clients(
            &self.settings_file,
            LogHandler,
            Arc::clone(&self.consumers),
            Arc::clone(&self.producers),
        )?;
        fire(&synapse, &self.events_dir, request)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/event/:event_type/:name/:action_profile", get(trigger_event))
        .with_state(state)
}

/// Serve the trigger routes until the listener fails.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    info!("Trigger server listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

async fn trigger_event(
    State(state): State<AppState>,
    Path((event_type, name, profile)): Path<(String, String, String)>,
) -> Result<String, (StatusCode, String)> {
    let request = TriggerRequest::new(event_type, name, profile);

    let result = {
        let request = request.clone();
        tokio::task::spawn_blocking(move || state.fire_blocking(&request)).await
    };

    match result {
        Ok(Ok(confirmation)) => Ok(confirmation),
        Ok(Err(err)) => {
            let status = err.status_code();
            if status.is_server_error() {
                error!("Failed to fire {request:?}: {err}");
            } else {
                warn!("Rejected trigger {request:?}: {err}");
            }
            Err((status, err.to_string()))
        }
        Err(err) => {
            error!("Trigger task for {request:?} panicked: {err}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "trigger task failed".to_string(),
            ))
        }
    }
}
