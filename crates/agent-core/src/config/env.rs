use shroud_host::env::{env_string, parse_bool};

use super::types::AgentConfig;
use super::util::split_millis_csv;

impl AgentConfig {
    pub(super) fn apply_env_overrides(&mut self) {
        self.apply_env_telemetry();
        self.apply_env_polling();
        self.apply_env_secure_store();
        self.apply_env_detector();
        self.apply_env_host();
    }

    fn apply_env_telemetry(&mut self) {
        if let Some(v) = env_string("SHROUD_TELEMETRY_ENABLED") {
            self.telemetry_enabled = parse_bool(&v);
        }
        if let Some(v) = env_string("SHROUD_COLLECTOR_URL") {
            self.collector_url = v.trim().to_string();
        }
        if let Some(v) = env_string("SHROUD_HOST_ID") {
            self.host_id = v.trim().to_string();
        }
        if let Some(v) = env_string("SHROUD_TELEMETRY_SOFT_CAP") {
            if let Ok(parsed) = v.trim().parse::<usize>() {
                if parsed > 0 {
                    self.telemetry_batch_soft_cap = parsed;
                }
            }
        }
    }

    fn apply_env_polling(&mut self) {
        if let Some(v) = env_string("SHROUD_POLL_INTERVALS_MS") {
            let intervals = split_millis_csv(&v);
            if !intervals.is_empty() {
                self.poll_candidate_intervals_ms = intervals;
            }
        }
        if let Some(v) = env_string("SHROUD_MAX_POLLS") {
            if let Ok(parsed) = v.trim().parse::<u64>() {
                self.max_polls = parsed;
            }
        }
    }

    fn apply_env_secure_store(&mut self) {
        if let Some(v) = env_string("SHROUD_SECURE_VALUE_TTL_SECS") {
            if let Ok(parsed) = v.trim().parse::<u64>() {
                self.secure_value_ttl_secs = parsed;
            }
        }
    }

    fn apply_env_detector(&mut self) {
        if let Some(v) = env_string("SHROUD_ANOMALY_EXECUTION_PROBABILITY") {
            if let Some(parsed) = v.parse::<f64>().ok().filter(|p| p.is_finite()) {
                self.anomaly_execution_probability = parsed.clamp(0.0, 1.0);
            }
        }
        if let Some(v) = env_string("SHROUD_ANOMALY_ENABLE_TIMING") {
            self.anomaly_timing_probe = parse_bool(&v);
        }
        if let Some(v) = env_string("SHROUD_ANOMALY_ENABLE_RECURSION") {
            self.anomaly_recursion_probe = parse_bool(&v);
        }
        if let Some(v) = env_string("SHROUD_ANOMALY_ENABLE_DRIFT") {
            self.anomaly_drift_probe = parse_bool(&v);
        }
    }

    fn apply_env_host(&mut self) {
        if let Some(v) = env_string("SHROUD_SIMULATED_RECORDS") {
            if let Ok(parsed) = v.trim().parse::<u32>() {
                if parsed > 0 {
                    self.simulated_records = parsed;
                }
            }
        }
        if let Some(v) = env_string("SHROUD_TARGET_QUANTITY") {
            if let Ok(parsed) = v.trim().parse::<u32>() {
                self.target_quantity = parsed;
            }
        }
    }
}
