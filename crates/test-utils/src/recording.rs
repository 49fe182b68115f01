use std::sync::{Arc, Mutex};

use tailexec::exec::{Completion, Listener, OutputChannel};

#[derive(Debug, Default)]
struct Recorded {
    chunks: Vec<(OutputChannel, Vec<u8>)>,
    completions: Vec<Completion>,
}

/// A listener that:
/// - records every chunk with its channel, in arrival order
/// - records every completion (there should only ever be one)
#[derive(Debug, Default)]
pub struct RecordingListener {
    recorded: Mutex<Recorded>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All bytes received on `channel`, concatenated.
    pub fn bytes(&self, channel: OutputChannel) -> Vec<u8> {
        let guard = self.recorded.lock().unwrap();
        guard
            .chunks
            .iter()
            .filter(|(c, _)| *c == channel)
            .flat_map(|(_, chunk)| chunk.iter().copied())
            .collect()
    }

    pub fn text(&self, channel: OutputChannel) -> String {
        String::from_utf8_lossy(&self.bytes(channel)).into_owned()
    }

    pub fn chunk_count(&self) -> usize {
        self.recorded.lock().unwrap().chunks.len()
    }

    pub fn finished_count(&self) -> usize {
        self.recorded.lock().unwrap().completions.len()
    }

    pub fn completion(&self) -> Option<Completion> {
        self.recorded.lock().unwrap().completions.first().copied()
    }
}

impl Listener for RecordingListener {
    fn on_data(&self, channel: OutputChannel, chunk: &[u8]) {
        let mut guard = self.recorded.lock().unwrap();
        guard.chunks.push((channel, chunk.to_vec()));
    }

    fn on_finished(&self, completion: &Completion) {
        let mut guard = self.recorded.lock().unwrap();
        guard.completions.push(*completion);
    }
}
