use shroud_host::env::{env_bool, env_string, env_usize};

use crate::batch::DEFAULT_BATCH_SOFT_CAP;

pub const DEFAULT_HOST_ID: &str = "shroud-host";

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub collector_url: String,
    pub host_id: String,
    pub batch_soft_cap: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: env_bool("SHROUD_TELEMETRY_ENABLED", false),
            collector_url: env_string("SHROUD_COLLECTOR_URL").unwrap_or_default(),
            host_id: env_string("SHROUD_HOST_ID")
                .or_else(|| env_string("HOSTNAME"))
                .unwrap_or_else(|| DEFAULT_HOST_ID.to_string()),
            batch_soft_cap: env_usize("SHROUD_TELEMETRY_SOFT_CAP", DEFAULT_BATCH_SOFT_CAP),
        }
    }
}

impl TelemetryConfig {
    pub fn enabled_for(collector_url: &str, host_id: &str) -> Self {
        Self {
            enabled: true,
            collector_url: collector_url.to_string(),
            host_id: host_id.to_string(),
            batch_soft_cap: DEFAULT_BATCH_SOFT_CAP,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            collector_url: String::new(),
            host_id: DEFAULT_HOST_ID.to_string(),
            batch_soft_cap: DEFAULT_BATCH_SOFT_CAP,
        }
    }
}
