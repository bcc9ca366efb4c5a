use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use runtask::backend::{LogBackend, LogCursor, LogEvent, LogPage};

/// In-memory `LogBackend`.
///
/// - streams are plain vectors keyed by `(group, stream)`
/// - `fail_fetches_for` makes every fetch of one stream error out
/// - `fail_groups` makes `ensure_group` error out
pub struct MemoryLogStore {
    streams: Mutex<HashMap<(String, String), Vec<LogEvent>>>,
    groups: Mutex<Vec<String>>,
    failing_streams: Mutex<HashSet<String>>,
    fail_groups: bool,
    page_size: usize,
    fetches: AtomicUsize,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            groups: Mutex::new(Vec::new()),
            failing_streams: Mutex::new(HashSet::new()),
            fail_groups: false,
            page_size: 100,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn failing_groups(mut self) -> Self {
        self.fail_groups = true;
        self
    }

    pub fn fail_fetches_for(&self, stream: &str) {
        self.failing_streams.lock().unwrap().insert(stream.to_string());
    }

    /// Append without going through the async trait.
    pub fn push(&self, group: &str, stream: &str, message: &str) {
        let mut streams = self.streams.lock().unwrap();
        streams
            .entry((group.to_string(), stream.to_string()))
            .or_default()
            .push(LogEvent::now(message));
    }

    pub fn messages(&self, group: &str, stream: &str) -> Vec<String> {
        let streams = self.streams.lock().unwrap();
        streams
            .get(&(group.to_string(), stream.to_string()))
            .map(|events| events.iter().map(|e| e.message.clone()).collect())
            .unwrap_or_default()
    }

    pub fn stream_names(&self, group: &str) -> Vec<String> {
        let streams = self.streams.lock().unwrap();
        let mut names: Vec<String> = streams
            .keys()
            .filter(|(g, _)| g == group)
            .map(|(_, s)| s.clone())
            .collect();
        names.sort();
        names
    }

    pub fn groups(&self) -> Vec<String> {
        self.groups.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Default for MemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogBackend for MemoryLogStore {
    async fn ensure_group(&self, group: &str) -> Result<()> {
        if self.fail_groups {
            return Err(anyhow!("access denied creating log group {group}"));
        }
        let mut groups = self.groups.lock().unwrap();
        if !groups.iter().any(|g| g == group) {
            groups.push(group.to_string());
        }
        Ok(())
    }

    async fn fetch_events(&self, group: &str, stream: &str, cursor: LogCursor) -> Result<LogPage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if self.failing_streams.lock().unwrap().contains(stream) {
            return Err(anyhow!("throttled reading {stream}"));
        }

        let streams = self.streams.lock().unwrap();
        let events: Vec<LogEvent> = streams
            .get(&(group.to_string(), stream.to_string()))
            .map(|events| {
                events
                    .iter()
                    .skip(cursor.0 as usize)
                    .take(self.page_size)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let next = cursor.advance(events.len());
        Ok(LogPage { events, next })
    }

    async fn append_event(&self, group: &str, stream: &str, message: &str) -> Result<()> {
        self.push(group, stream, message);
        Ok(())
    }
}
