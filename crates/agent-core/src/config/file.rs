use anyhow::{Context, Result};
use serde::Deserialize;

use super::paths::resolve_config_path;
use super::types::AgentConfig;
use super::util::non_empty;

impl AgentConfig {
    pub(super) fn apply_file_config(&mut self) -> Result<bool> {
        let Some(path) = resolve_config_path()? else {
            return Ok(false);
        };

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed reading config file {}", path.display()))?;
        self.apply_file_text(&raw)
            .with_context(|| format!("failed parsing TOML config {}", path.display()))?;
        Ok(true)
    }

    pub(super) fn apply_file_text(&mut self, raw: &str) -> Result<()> {
        let file_cfg: FileConfig = toml::from_str(raw)?;
        self.apply_file_telemetry(file_cfg.telemetry);
        self.apply_file_polling(file_cfg.polling);
        self.apply_file_secure_store(file_cfg.secure_store);
        self.apply_file_detector(file_cfg.detector);
        self.apply_file_host(file_cfg.host);
        Ok(())
    }

    fn apply_file_telemetry(&mut self, telemetry: Option<FileTelemetryConfig>) {
        let Some(telemetry) = telemetry else {
            return;
        };

        if let Some(v) = telemetry.enabled {
            self.telemetry_enabled = v;
        }
        if let Some(v) = non_empty(telemetry.collector_url) {
            self.collector_url = v.trim().to_string();
        }
        if let Some(v) = non_empty(telemetry.host_id) {
            self.host_id = v.trim().to_string();
        }
        if let Some(v) = telemetry.batch_soft_cap {
            if v > 0 {
                self.telemetry_batch_soft_cap = v;
            }
        }
    }

    fn apply_file_polling(&mut self, polling: Option<FilePollingConfig>) {
        let Some(polling) = polling else {
            return;
        };

        if let Some(v) = polling.candidate_intervals_ms {
            let intervals: Vec<u64> = v.into_iter().filter(|ms| *ms > 0).collect();
            if !intervals.is_empty() {
                self.poll_candidate_intervals_ms = intervals;
            }
        }
        if let Some(v) = polling.max_polls {
            self.max_polls = v;
        }
    }

    fn apply_file_secure_store(&mut self, store: Option<FileSecureStoreConfig>) {
        let Some(store) = store else {
            return;
        };
        if let Some(v) = store.ttl_secs {
            self.secure_value_ttl_secs = v;
        }
    }

    fn apply_file_detector(&mut self, detector: Option<FileDetectorConfig>) {
        let Some(detector) = detector else {
            return;
        };

        if let Some(v) = detector.execution_probability.filter(|v| v.is_finite()) {
            self.anomaly_execution_probability = v.clamp(0.0, 1.0);
        }
        if let Some(v) = detector.timing_probe {
            self.anomaly_timing_probe = v;
        }
        if let Some(v) = detector.recursion_probe {
            self.anomaly_recursion_probe = v;
        }
        if let Some(v) = detector.drift_probe {
            self.anomaly_drift_probe = v;
        }
    }

    fn apply_file_host(&mut self, host: Option<FileHostConfig>) {
        let Some(host) = host else {
            return;
        };
        if let Some(v) = host.simulated_records {
            if v > 0 {
                self.simulated_records = v;
            }
        }
        if let Some(v) = host.target_quantity {
            self.target_quantity = v;
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default)]
    telemetry: Option<FileTelemetryConfig>,
    #[serde(default)]
    polling: Option<FilePollingConfig>,
    #[serde(default)]
    secure_store: Option<FileSecureStoreConfig>,
    #[serde(default)]
    detector: Option<FileDetectorConfig>,
    #[serde(default)]
    host: Option<FileHostConfig>,
}

#[derive(Debug, Deserialize)]
struct FileTelemetryConfig {
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    collector_url: Option<String>,
    #[serde(default)]
    host_id: Option<String>,
    #[serde(default)]
    batch_soft_cap: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct FilePollingConfig {
    #[serde(default)]
    candidate_intervals_ms: Option<Vec<u64>>,
    #[serde(default)]
    max_polls: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileSecureStoreConfig {
    #[serde(default)]
    ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileDetectorConfig {
    #[serde(default)]
    execution_probability: Option<f64>,
    #[serde(default)]
    timing_probe: Option<bool>,
    #[serde(default)]
    recursion_probe: Option<bool>,
    #[serde(default)]
    drift_probe: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct FileHostConfig {
    #[serde(default)]
    simulated_records: Option<u32>,
    #[serde(default)]
    target_quantity: Option<u32>,
}
