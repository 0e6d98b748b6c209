use std::time::Duration;

use self_protect::{AnomalyConfig, GuardConfig, SecureStoreConfig, DEFAULT_SECURE_VALUE_TTL};
use shroud_telemetry::{TelemetryConfig, DEFAULT_BATCH_SOFT_CAP};

use super::constants::{
    DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVALS_MS, DEFAULT_SIMULATED_RECORDS,
    DEFAULT_TARGET_QUANTITY,
};
use super::types::AgentConfig;
use super::util::default_host_id;

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host_id: default_host_id(),
            telemetry_enabled: false,
            collector_url: String::new(),
            telemetry_batch_soft_cap: DEFAULT_BATCH_SOFT_CAP,
            secure_value_ttl_secs: DEFAULT_SECURE_VALUE_TTL.as_secs(),
            anomaly_execution_probability: 0.8,
            anomaly_timing_probe: true,
            anomaly_recursion_probe: true,
            anomaly_drift_probe: true,
            poll_candidate_intervals_ms: DEFAULT_POLL_INTERVALS_MS.to_vec(),
            max_polls: DEFAULT_MAX_POLLS,
            simulated_records: DEFAULT_SIMULATED_RECORDS,
            target_quantity: DEFAULT_TARGET_QUANTITY,
        }
    }
}

impl AgentConfig {
    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            store: SecureStoreConfig {
                ttl: Duration::from_secs(self.secure_value_ttl_secs),
            },
            anomaly: AnomalyConfig {
                execution_probability: self.anomaly_execution_probability,
                enable_timing_probe: self.anomaly_timing_probe,
                enable_recursion_probe: self.anomaly_recursion_probe,
                enable_drift_probe: self.anomaly_drift_probe,
                ..AnomalyConfig::default()
            },
            telemetry: TelemetryConfig {
                enabled: self.telemetry_enabled,
                collector_url: self.collector_url.clone(),
                host_id: self.host_id.clone(),
                batch_soft_cap: self.telemetry_batch_soft_cap,
            },
        }
    }

    pub fn poll_intervals(&self) -> Vec<Duration> {
        self.poll_candidate_intervals_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }
}
