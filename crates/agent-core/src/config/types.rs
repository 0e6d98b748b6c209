#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub host_id: String,
    pub telemetry_enabled: bool,
    pub collector_url: String,
    pub telemetry_batch_soft_cap: usize,
    pub secure_value_ttl_secs: u64,
    pub anomaly_execution_probability: f64,
    pub anomaly_timing_probe: bool,
    pub anomaly_recursion_probe: bool,
    pub anomaly_drift_probe: bool,
    pub poll_candidate_intervals_ms: Vec<u64>,
    pub max_polls: u64,
    pub simulated_records: u32,
    pub target_quantity: u32,
}
