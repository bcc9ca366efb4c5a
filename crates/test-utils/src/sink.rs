use std::sync::Mutex;

use runtask::engine::OutputSink;

/// Records every emitted `(container, message)` pair.
#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(String, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn messages_for(&self, container: &str) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == container)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl OutputSink for RecordingSink {
    fn emit(&self, container: &str, message: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((container.to_string(), message.to_string()));
    }
}
