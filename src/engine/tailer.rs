// src/engine/tailer.rs

//! Log tailing for a single container stream.
//!
//! A [`LogTailer`] polls one stream from its beginning and hands every entry
//! to a `should_continue` predicate. Entries the predicate accepts are emitted
//! to an [`OutputSink`]; the first entry it rejects is the sentinel and ends
//! the tail without being emitted.
//!
//! Two tokens bound the tail:
//! - `finished` is cancelled by the run engine after the container's finish
//!   marker is written. From then on the tailer drains without sleeping
//!   between non-empty pages and stops at the first empty page, even if it
//!   never matched a sentinel.
//! - `cancel` is the run-wide cancellation; it interrupts a fetch or a sleep
//!   immediately.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::{LogBackend, LogCursor, LogEvent};
use crate::engine::stream::LogStreamRef;

/// Where accepted log entries go.
pub trait OutputSink: Send + Sync {
    fn emit(&self, container: &str, message: &str);
}

/// Prints each entry on stdout, optionally prefixed with `[container]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink {
    prefix_names: bool,
}

impl StdoutSink {
    pub fn new(prefix_names: bool) -> Self {
        Self { prefix_names }
    }
}

impl OutputSink for StdoutSink {
    fn emit(&self, container: &str, message: &str) {
        if self.prefix_names {
            println!("[{container}] {message}");
        } else {
            println!("{message}");
        }
    }
}

/// Why a tail ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailExit {
    /// The predicate rejected an entry.
    Sentinel,
    /// Completion was signalled and the stream had nothing left.
    Drained,
    /// Run-wide cancellation.
    Cancelled,
}

pub struct LogTailer {
    logs: Arc<dyn LogBackend>,
    group: String,
    stream: LogStreamRef,
    poll_interval: Duration,
}

impl LogTailer {
    pub fn new(
        logs: Arc<dyn LogBackend>,
        group: &str,
        stream: LogStreamRef,
        poll_interval: Duration,
    ) -> Self {
        Self {
            logs,
            group: group.to_string(),
            stream,
            poll_interval,
        }
    }

    pub fn stream(&self) -> &LogStreamRef {
        &self.stream
    }

    /// Follow the stream until the sentinel, drain-after-finish, or
    /// cancellation.
    ///
    /// A failed fetch ends the tail with an error; callers log it and carry on.
    pub async fn watch<P>(
        &self,
        mut should_continue: P,
        sink: &dyn OutputSink,
        finished: &CancellationToken,
        cancel: &CancellationToken,
    ) -> Result<TailExit>
    where
        P: FnMut(&LogEvent) -> bool,
    {
        let stream_name = self.stream.to_string();
        let label = self.stream.container_name.as_str();
        let mut cursor = LogCursor::start();
        let mut finishing = false;

        debug!(group = %self.group, stream = %stream_name, "log tailer started");

        loop {
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(stream = %stream_name, "log tailer cancelled");
                    return Ok(TailExit::Cancelled);
                }
                page = self.logs.fetch_events(&self.group, &stream_name, cursor) => {
                    page.with_context(|| format!("fetching events from {stream_name}"))?
                }
            };

            let drained = page.events.is_empty();
            for event in page.events.iter() {
                if !should_continue(event) {
                    info!(stream = %stream_name, message = %event.message, "sentinel found");
                    return Ok(TailExit::Sentinel);
                }
                sink.emit(label, &event.message);
            }
            cursor = page.next;

            if finishing {
                if drained {
                    info!(stream = %stream_name, "container finished and stream drained");
                    return Ok(TailExit::Drained);
                }
                continue;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(stream = %stream_name, "log tailer cancelled");
                    return Ok(TailExit::Cancelled);
                }
                _ = finished.cancelled() => {
                    debug!(stream = %stream_name, "completion signalled; draining");
                    finishing = true;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
