//! Progress reporting capability.
//!
//! Components never talk to a sink directly: they hold a [`Progress`] handle
//! which swallows sink failures so a broken consumer cannot abort a run.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("progress consumer is gone")]
    Closed,

    #[error("progress sink failed: {0}")]
    Other(String),
}

/// Receives human-readable progress lines.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn emit(&self, message: &str) -> Result<(), SinkError>;
}

/// Cheap clonable handle around a sink.
#[derive(Clone)]
pub struct Progress {
    sink: Arc<dyn LogSink>,
}

impl Progress {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Progress that only reaches the tracing subscriber.
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }

    pub async fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        if let Err(err) = self.sink.emit(message).await {
            debug!(target: "fxportal::progress", error = %err, message, "progress line dropped");
        }
    }

    pub async fn warn(&self, message: impl AsRef<str>) {
        self.log(format!("⚠️ {}", message.as_ref())).await;
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}

/// Forwards every line to `tracing::info!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl LogSink for TracingSink {
    async fn emit(&self, message: &str) -> Result<(), SinkError> {
        info!(target: "fxportal::progress", "{message}");
        Ok(())
    }
}

/// Pushes lines into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    pub fn pair() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl LogSink for ChannelSink {
    async fn emit(&self, message: &str) -> Result<(), SinkError> {
        self.tx
            .send(message.to_string())
            .map_err(|_| SinkError::Closed)
    }
}

/// Collects lines in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn emit(&self, message: &str) -> Result<(), SinkError> {
        self.lines.lock().push(message.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    #[async_trait]
    impl LogSink for FailingSink {
        async fn emit(&self, _message: &str) -> Result<(), SinkError> {
            Err(SinkError::Other("boom".into()))
        }
    }

    #[tokio::test]
    async fn failing_sink_is_swallowed() {
        let progress = Progress::new(Arc::new(FailingSink));
        progress.log("still running").await;
        progress.warn("and again").await;
    }

    #[tokio::test]
    async fn channel_sink_reports_closed_receiver() {
        let (sink, rx) = ChannelSink::pair();
        drop(rx);
        assert_eq!(sink.emit("x").await, Err(SinkError::Closed));
        Progress::new(Arc::new(sink)).log("ignored").await;
    }

    #[tokio::test]
    async fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        let progress = Progress::new(Arc::new(sink.clone()));
        progress.log("one").await;
        progress.warn("two").await;
        assert_eq!(sink.lines(), vec!["one".to_string(), "⚠️ two".to_string()]);
        assert!(sink.contains("two"));
    }
}
