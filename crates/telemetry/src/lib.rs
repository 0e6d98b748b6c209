mod batch;
mod channel;
mod cipher;
mod config;
mod request;
mod types;

pub use batch::{TelemetryBatch, DEFAULT_BATCH_SOFT_CAP};
pub use channel::TelemetryChannel;
pub use cipher::{encode_hex_upper, xor_keystream, TelemetryCipher};
pub use config::TelemetryConfig;
pub use request::{DECOY_QUERY_KEYS, GENERIC_USER_AGENTS};
pub use types::{CollectorEntry, CollectorPayload, FlushOutcome, TelemetryMessage};
