// src/backend/file_store.rs

//! Log backend that keeps every stream as a JSON-lines file.
//!
//! Layout: `<root>/<group>/<stream>.jsonl`. Stream names contain `/`
//! (`prefix/container/task`), which simply become nested directories.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::debug;

use super::{LogBackend, LogCursor, LogEvent, LogPage};

/// Entries returned per fetch.
const DEFAULT_PAGE_SIZE: usize = 1000;

/// Cursors are byte offsets into the stream file, always at a line start.
/// Fetches take no lock and only consume `\n`-terminated lines. Appends to
/// one stream hold that stream's lock.
#[derive(Debug)]
pub struct FileLogStore {
    root: PathBuf,
    page_size: usize,
    append_locks: StdMutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl FileLogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
            append_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn group_dir(&self, group: &str) -> Result<PathBuf> {
        ensure_relative_name("group", group)?;
        Ok(self.root.join(group))
    }

    fn stream_path(&self, group: &str, stream: &str) -> Result<PathBuf> {
        ensure_relative_name("stream", stream)?;
        Ok(self.group_dir(group)?.join(format!("{stream}.jsonl")))
    }

    fn append_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self
            .append_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }
}

/// Reject names that would escape the store root.
fn ensure_relative_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("log {kind} name must not be empty");
    }
    let escapes = Path::new(name)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        bail!("log {kind} name {name:?} must be a plain relative path");
    }
    Ok(())
}

#[async_trait]
impl LogBackend for FileLogStore {
    async fn ensure_group(&self, group: &str) -> Result<()> {
        let dir = self.group_dir(group)?;
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating log group dir {:?}", dir))?;
        debug!(group, dir = %dir.display(), "log group ready");
        Ok(())
    }

    async fn fetch_events(&self, group: &str, stream: &str, cursor: LogCursor) -> Result<LogPage> {
        let path = self.stream_path(group, stream)?;

        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LogPage {
                    events: Vec::new(),
                    next: cursor,
                });
            }
            Err(e) => return Err(e).with_context(|| format!("opening log stream {:?}", path)),
        };
        file.seek(SeekFrom::Start(cursor.0))
            .await
            .with_context(|| format!("seeking in log stream {:?}", path))?;

        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut offset = cursor.0;
        let mut line = Vec::new();

        while events.len() < self.page_size {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .await
                .with_context(|| format!("reading log stream {:?}", path))?;
            // EOF, or a line still being written.
            if read == 0 || !line.ends_with(b"\n") {
                break;
            }

            let event: LogEvent = serde_json::from_slice(&line)
                .with_context(|| format!("decoding entry in log stream {:?}", path))?;
            events.push(event);
            offset += read as u64;
        }

        Ok(LogPage {
            events,
            next: LogCursor(offset),
        })
    }

    async fn append_event(&self, group: &str, stream: &str, message: &str) -> Result<()> {
        let path = self.stream_path(group, stream)?;
        let mut line = serde_json::to_vec(&LogEvent::now(message))?;
        line.push(b'\n');

        let lock = self.append_lock(&path);
        let _guard = lock.lock().await;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating dir {:?}", parent))?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("opening log stream {:?}", path))?;
        file.write_all(&line)
            .await
            .with_context(|| format!("appending to log stream {:?}", path))?;
        file.flush().await?;
        Ok(())
    }
}
