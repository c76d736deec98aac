//! Event handlers.
//!
//! A concrete synapse is a [`crate::Synapse`] plus an [`EventHandler`]. The
//! handler runs on the listen thread, synchronously: the next poll only
//! happens once `handle` returns.

use std::sync::Arc;
use synapse_settings::Settings;
use tracing::info;

use crate::error::Result;
use crate::event::Event;
use crate::sender::Sender;
use crate::shutdown::StopHandle;

/// Domain logic of a synapse.
pub trait EventHandler: Send {
    /// Handle one event. An `Err` or a panic is logged by the runtime and
    /// consumption continues with the next poll.
    fn handle(&mut self, event: &Event, ctx: &Context<'_>) -> anyhow::Result<()>;
}

/// What a handler can do besides looking at the event.
pub struct Context<'a> {
    sender: &'a Sender,
    stop: &'a StopHandle,
}

impl<'a> Context<'a> {
    pub(crate) fn new(sender: &'a Sender, stop: &'a StopHandle) -> Self {
        Self { sender, stop }
    }

    /// Same as [`crate::Synapse::send`].
    pub fn send(&self, topic: &str, payload: &[u8]) -> Result<()> {
        self.sender.send(topic, payload)
    }

    /// Ask the listen loop to stop after this handler returns.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// A stop handle the handler can keep or move to another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Settings currently in effect.
    pub fn settings(&self) -> Arc<Settings> {
        self.sender.settings()
    }
}

/// Logs every payload as text. Useful to check connectivity.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl EventHandler for LogHandler {
    fn handle(&mut self, event: &Event, _ctx: &Context<'_>) -> anyhow::Result<()> {
        info!(
            topic = %event.topic,
            partition = event.partition,
            offset = event.offset,
            "{}",
            event.payload_lossy()
        );
        Ok(())
    }
}

/// Re-sends every payload unchanged to another logical topic.
#[derive(Debug, Clone)]
pub struct ForwardHandler {
    output: String,
}

impl ForwardHandler {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }
}

impl EventHandler for ForwardHandler {
    fn handle(&mut self, event: &Event, ctx: &Context<'_>) -> anyhow::Result<()> {
        ctx.send(&self.output, &event.payload)?;
        Ok(())
    }
}

/// Handler built from a closure. See [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

/// Wrap a closure as an [`EventHandler`].
///
/// ```ignore
/// let handler = handler_fn(|event: &Event, ctx: &Context<'_>| {
///     ctx.send("out", &event.payload)?;
///     Ok(())
/// });
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: FnMut(&Event, &Context<'_>) -> anyhow::Result<()> + Send,
{
    FnHandler { f }
}

impl<F> EventHandler for FnHandler<F>
where
    F: FnMut(&Event, &Context<'_>) -> anyhow::Result<()> + Send,
{
    fn handle(&mut self, event: &Event, ctx: &Context<'_>) -> anyhow::Result<()> {
        (self.f)(event, ctx)
    }
}
