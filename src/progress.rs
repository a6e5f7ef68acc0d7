//! Progress and status reporting.
//!
//! The pipeline narrates every decision point as a human-readable line and reports a
//! 0-100 percentage. Where those go is up to the caller: implement [`ProgressSink`], or
//! use [`LogProgress`] (the `log` facade), [`ChannelProgress`] (a tokio channel for a UI
//! task) or [`NullProgress`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use log::{debug, info};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Destination for status lines and percentages.
pub trait ProgressSink: Send + Sync {
    fn line(&self, message: &str);
    fn percent(&self, value: u8);
}

/// Forwards lines to `log::info!` and percentages to `log::debug!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn line(&self, message: &str) {
        info!("{}", message);
    }

    fn percent(&self, value: u8) {
        debug!("progress {}%", value);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn line(&self, _message: &str) {}
    fn percent(&self, _value: u8) {}
}

/// A single progress event as delivered by [`ChannelProgress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Line(String),
    Percent(u8),
}

/// Sends events over an unbounded tokio channel. Send errors (receiver dropped) are ignored.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelProgress {
    fn line(&self, message: &str) {
        let _ = self.sender.send(ProgressEvent::Line(message.to_string()));
    }

    fn percent(&self, value: u8) {
        let _ = self.sender.send(ProgressEvent::Percent(value));
    }
}

/// Wraps a sink and guarantees the percentages it forwards never decrease and never exceed 100.
#[derive(Clone)]
pub struct ProgressTracker {
    sink: Arc<dyn ProgressSink>,
    last_percent: Arc<AtomicU8>,
}

impl ProgressTracker {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            last_percent: Arc::new(AtomicU8::new(0)),
        }
    }

    pub fn line(&self, message: impl AsRef<str>) {
        self.sink.line(message.as_ref());
    }

    /// Reports `value` if it is not lower than the last reported percentage.
    pub fn percent(&self, value: u8) {
        let value = value.min(100);
        let previous = self.last_percent.fetch_max(value, Ordering::SeqCst);
        if value >= previous {
            self.sink.percent(value);
        }
    }

    pub fn last_percent(&self) -> u8 {
        self.last_percent.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("last_percent", &self.last_percent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracker_is_monotonic() {
        let (sink, mut rx) = ChannelProgress::new();
        let tracker = ProgressTracker::new(Arc::new(sink));

        tracker.percent(10);
        tracker.percent(5);
        tracker.percent(60);
        tracker.percent(250);
        tracker.line("done");
        drop(tracker);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                ProgressEvent::Percent(10),
                ProgressEvent::Percent(60),
                ProgressEvent::Percent(100),
                ProgressEvent::Line("done".to_string()),
            ]
        );
    }
}
