use std::collections::VecDeque;

use crate::types::TelemetryMessage;

pub const DEFAULT_BATCH_SOFT_CAP: usize = 20;

/// FIFO of encrypted messages waiting for the next flush.
///
/// The cap is soft: `push` never refuses a message, it only reports that the
/// batch is due for a flush.
#[derive(Debug)]
pub struct TelemetryBatch {
    queue: VecDeque<TelemetryMessage>,
    soft_cap: usize,
}

impl TelemetryBatch {
    pub fn new(soft_cap: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            soft_cap: soft_cap.max(1),
        }
    }

    pub fn push(&mut self, message: TelemetryMessage) -> bool {
        self.queue.push_back(message);
        self.queue.len() >= self.soft_cap
    }

    pub fn drain_all(&mut self) -> Vec<TelemetryMessage> {
        self.queue.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_bytes(&self) -> usize {
        self.queue
            .iter()
            .map(|message| message.ciphertext_hex.len() + 8)
            .sum()
    }

    pub fn soft_cap(&self) -> usize {
        self.soft_cap
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for TelemetryBatch {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SOFT_CAP)
    }
}
