//! Command-line interface for synapse
//!
//! # Usage Examples
//!
//! ## Listen
//! ```bash
//! # Log every event from the logical topic "in" until Ctrl+C
//! synapse listen --settings settings.json --topic in
//!
//! # Re-send every event from "in" to "out"
//! synapse listen --settings settings.json --topic in --forward-to out
//! ```
//!
//! ## Send
//! ```bash
//! synapse send --settings settings.json --topic out --payload 'hello'
//! synapse send --settings settings.json --topic out --file event.json
//! ```
//!
//! ## Action profiles
//! ```bash
//! # Fire /web/events/alarm/front-door/open.json once
//! synapse trigger --settings settings.json --events-dir /web/events alarm front-door open
//!
//! # Serve GET /event/{event_type}/{name}/{action_profile}
//! synapse serve --settings settings.json --events-dir /web/events --bind 0.0.0.0:5000
//! ```
//!
//! The settings path can also be given through `SYNAPSE_SETTINGS`.

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use synapse::runtime::{EventHandler, ForwardHandler, LogHandler, Synapse};
use synapse::trigger::{fire, AppState, TriggerRequest};
use synapse::SettingsOpts;
use tracing::info;

#[derive(Parser)]
#[command(name = "synapse")]
#[command(about = "Consume and produce Kafka events driven by a JSON settings file")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume a logical topic until interrupted
    Listen {
        #[command(flatten)]
        settings: SettingsOpts,

        /// Logical topic to consume
        #[arg(long)]
        topic: String,

        /// Re-send every event to this logical topic instead of logging it
        #[arg(long, value_name = "TOPIC")]
        forward_to: Option<String>,
    },

    /// Send one payload to a logical topic
    #[command(group(ArgGroup::new("body").required(true).args(["payload", "file"])))]
    Send {
        #[command(flatten)]
        settings: SettingsOpts,

        /// Logical topic to send to
        #[arg(long)]
        topic: String,

        /// Payload text
        #[arg(long)]
        payload: Option<String>,

        /// Read the payload from a file
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// Fire an action profile once
    Trigger {
        #[command(flatten)]
        settings: SettingsOpts,

        /// Root directory of the action profiles
        #[arg(long, value_name = "DIR")]
        events_dir: PathBuf,

        event_type: String,
        name: String,
        profile: String,
    },

    /// Serve the action profile HTTP trigger
    Serve {
        #[command(flatten)]
        settings: SettingsOpts,

        /// Root directory of the action profiles
        #[arg(long, value_name = "DIR")]
        events_dir: PathBuf,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1:5000")]
        bind: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Listen {
            settings,
            topic,
            forward_to,
        } => match forward_to {
            Some(output) => {
                run_listen(settings.settings_file, topic, ForwardHandler::new(output)).await?
            }
            None => run_listen(settings.settings_file, topic, LogHandler).await?,
        },
        Commands::Send {
            settings,
            topic,
            payload,
            file,
        } => {
            let payload = match (payload, file) {
                (Some(text), _) => text.into_bytes(),
                (None, Some(path)) => std::fs::read(&path)
                    .with_context(|| format!("Failed to read payload from {}", path.display()))?,
                (None, None) => anyhow::bail!("Either --payload or --file is required"),
            };
            let settings_file = settings.settings_file;
            tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
                let synapse = Synapse::new(&settings_file, LogHandler)?;
                synapse
                    .send(&topic, &payload)
                    .with_context(|| format!("Failed to send to logical topic '{topic}'"))?;
                info!("Sent {} bytes to '{topic}'", payload.len());
                Ok(())
            })
            .await??;
        }
        Commands::Trigger {
            settings,
            events_dir,
            event_type,
            name,
            profile,
        } => {
            let settings_file = settings.settings_file;
            let confirmation = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
                let synapse = Synapse::new(&settings_file, LogHandler)?;
                let request = TriggerRequest::new(event_type, name, profile);
                Ok(fire(&synapse, &events_dir, &request)?)
            })
            .await??;
            println!("{confirmation}");
        }
        Commands::Serve {
            settings,
            events_dir,
            bind,
        } => {
            let listener = tokio::net::TcpListener::bind(bind)
                .await
                .with_context(|| format!("Failed to bind {bind}"))?;
            synapse::trigger::serve(listener, AppState::new(settings.settings_file, events_dir))
                .await?;
        }
    }

    Ok(())
}

/// Run the blocking listen loop on the blocking pool. Ctrl+C requests a stop;
/// the loop notices it within one poll timeout.
async fn run_listen<H: EventHandler + 'static>(
    settings_file: PathBuf,
    topic: String,
    handler: H,
) -> anyhow::Result<()> {
    let synapse = Arc::new(
        Synapse::new(&settings_file, handler)
            .with_context(|| format!("Failed to start synapse from {}", settings_file.display()))?,
    );

    let stop = synapse.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping");
            stop.stop();
        }
    });

    tokio::task::spawn_blocking(move || synapse.listen(&topic)).await??;
    Ok(())
}
