use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryMessage {
    pub created_at_unix_millis: u64,
    pub ciphertext_hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorEntry {
    pub msg: String,
}

/// Body of the single request issued per flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorPayload {
    pub messages: Vec<CollectorEntry>,
}

impl CollectorPayload {
    pub fn from_messages(messages: &[TelemetryMessage]) -> Self {
        Self {
            messages: messages
                .iter()
                .map(|message| CollectorEntry {
                    msg: message.ciphertext_hex.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    Skipped,
    Delivered { count: usize, status: u16 },
    Dropped { count: usize, detail: String },
}
