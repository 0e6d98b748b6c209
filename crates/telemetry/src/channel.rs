use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use shroud_host::{Clock, Transport};

use crate::batch::TelemetryBatch;
use crate::cipher::TelemetryCipher;
use crate::config::TelemetryConfig;
use crate::request::build_collector_request;
use crate::types::{FlushOutcome, TelemetryMessage};

/// Write-only diagnostic sink with at-most-once, best-effort delivery.
pub struct TelemetryChannel {
    config: TelemetryConfig,
    cipher: TelemetryCipher,
    session_id: String,
    batch: TelemetryBatch,
    transport: Box<dyn Transport>,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    flush_count: u64,
}

impl TelemetryChannel {
    pub fn new(
        config: TelemetryConfig,
        transport: Box<dyn Transport>,
        clock: Arc<dyn Clock>,
        process_start_unix_millis: u64,
    ) -> Self {
        Self::with_rng(
            config,
            transport,
            clock,
            process_start_unix_millis,
            StdRng::from_entropy(),
        )
    }

    pub fn with_rng(
        config: TelemetryConfig,
        transport: Box<dyn Transport>,
        clock: Arc<dyn Clock>,
        process_start_unix_millis: u64,
        rng: StdRng,
    ) -> Self {
        let cipher = TelemetryCipher::derive(&config.host_id, process_start_unix_millis);
        let batch = TelemetryBatch::new(config.batch_soft_cap);
        Self {
            session_id: session_id_for(process_start_unix_millis),
            config,
            cipher,
            batch,
            transport,
            clock,
            rng,
            flush_count: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn cipher(&self) -> &TelemetryCipher {
        &self.cipher
    }

    pub fn pending(&self) -> usize {
        self.batch.pending_count()
    }

    pub fn flush_count(&self) -> u64 {
        self.flush_count
    }

    /// Queues one diagnostic line. Returns the flush outcome when this append
    /// filled the batch up to its soft cap.
    pub fn append(&mut self, message: &str) -> Option<FlushOutcome> {
        if !self.config.enabled {
            return None;
        }

        let now = self.clock.wall_unix_millis();
        let ciphertext_hex = self.cipher.encrypt_hex(&format!("[{}] {}", now, message));
        let cap_reached = self.batch.push(TelemetryMessage {
            created_at_unix_millis: now,
            ciphertext_hex,
        });
        if cap_reached {
            debug!(
                pending = self.batch.pending_count(),
                soft_cap = self.batch.soft_cap(),
                "telemetry batch reached soft cap"
            );
            return Some(self.flush());
        }
        None
    }

    /// Sends everything queued in one request. The batch is empty afterwards
    /// whatever the transport reports.
    pub fn flush(&mut self) -> FlushOutcome {
        let messages = self.batch.drain_all();
        if messages.is_empty() {
            return FlushOutcome::Skipped;
        }
        let count = messages.len();

        if self.config.collector_url.trim().is_empty() {
            warn!(count, "no telemetry collector configured; dropping batch");
            return FlushOutcome::Dropped {
                count,
                detail: "no collector configured".to_string(),
            };
        }

        let now = self.clock.wall_unix_millis();
        let request = match build_collector_request(
            &self.config.collector_url,
            &messages,
            &self.session_id,
            now,
            &mut self.rng,
        ) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, count, "failed building telemetry request; dropping batch");
                return FlushOutcome::Dropped {
                    count,
                    detail: err.to_string(),
                };
            }
        };

        self.flush_count += 1;
        match self.transport.send(&request) {
            Ok(response) if response.is_success() => {
                info!(count, status = response.status, "telemetry batch delivered");
                FlushOutcome::Delivered {
                    count,
                    status: response.status,
                }
            }
            Ok(response) => {
                warn!(
                    count,
                    status = response.status,
                    "telemetry collector rejected batch; dropping"
                );
                FlushOutcome::Dropped {
                    count,
                    detail: format!("collector answered status {}", response.status),
                }
            }
            Err(err) => {
                warn!(error = %err, count, "telemetry transport failed; dropping batch");
                FlushOutcome::Dropped {
                    count,
                    detail: err.to_string(),
                }
            }
        }
    }
}

impl std::fmt::Debug for TelemetryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryChannel")
            .field("enabled", &self.config.enabled)
            .field("session_id", &self.session_id)
            .field("pending", &self.batch.pending_count())
            .field("flush_count", &self.flush_count)
            .finish()
    }
}

fn session_id_for(process_start_unix_millis: u64) -> String {
    let mixed = process_start_unix_millis
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .rotate_left(17);
    format!("{:016x}", mixed)
}
