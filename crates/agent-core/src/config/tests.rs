use super::util::split_millis_csv;
use super::*;
use shroud_host::env::parse_bool;
use std::io::Write;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn clear_env() {
    let vars = [
        "SHROUD_CONFIG_PATH",
        "SHROUD_TELEMETRY_ENABLED",
        "SHROUD_COLLECTOR_URL",
        "SHROUD_HOST_ID",
        "SHROUD_TELEMETRY_SOFT_CAP",
        "SHROUD_POLL_INTERVALS_MS",
        "SHROUD_MAX_POLLS",
        "SHROUD_SECURE_VALUE_TTL_SECS",
        "SHROUD_ANOMALY_EXECUTION_PROBABILITY",
        "SHROUD_ANOMALY_ENABLE_TIMING",
        "SHROUD_ANOMALY_ENABLE_RECURSION",
        "SHROUD_ANOMALY_ENABLE_DRIFT",
        "SHROUD_SIMULATED_RECORDS",
        "SHROUD_TARGET_QUANTITY",
    ];
    for v in vars {
        std::env::remove_var(v);
    }
}

fn temp_config_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "shroud-config-{}.toml",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default()
    ))
}

#[test]
fn defaults_match_documented_values() {
    let cfg = AgentConfig::default();
    assert!(!cfg.telemetry_enabled);
    assert_eq!(cfg.telemetry_batch_soft_cap, 20);
    assert_eq!(cfg.secure_value_ttl_secs, 3_600);
    assert_eq!(cfg.poll_candidate_intervals_ms, vec![500, 700, 900, 1_100, 1_300]);
    assert!((cfg.anomaly_execution_probability - 0.8).abs() < f64::EPSILON);
}

#[test]
fn file_sections_override_defaults() {
    let mut cfg = AgentConfig::default();
    cfg.apply_file_text(
        "[telemetry]\nenabled=true\ncollector_url=\" https://collector.example/ingest \"\nhost_id=\"bench\"\nbatch_soft_cap=5\n[polling]\ncandidate_intervals_ms=[250, 0, 750]\nmax_polls=12\n[secure_store]\nttl_secs=60\n[detector]\nexecution_probability=1.5\ndrift_probe=false\n[host]\nsimulated_records=3\ntarget_quantity=42",
    )
    .expect("parse config");

    assert!(cfg.telemetry_enabled);
    assert_eq!(cfg.collector_url, "https://collector.example/ingest");
    assert_eq!(cfg.host_id, "bench");
    assert_eq!(cfg.telemetry_batch_soft_cap, 5);
    assert_eq!(cfg.poll_candidate_intervals_ms, vec![250, 750]);
    assert_eq!(cfg.max_polls, 12);
    assert_eq!(cfg.secure_value_ttl_secs, 60);
    assert_eq!(cfg.anomaly_execution_probability, 1.0);
    assert!(cfg.anomaly_timing_probe);
    assert!(!cfg.anomaly_drift_probe);
    assert_eq!(cfg.simulated_records, 3);
    assert_eq!(cfg.target_quantity, 42);

    let guard = cfg.guard_config();
    assert_eq!(guard.store.ttl, Duration::from_secs(60));
    assert!(!guard.anomaly.enable_drift_probe);
    assert_eq!(guard.telemetry.batch_soft_cap, 5);
    assert_eq!(
        cfg.poll_intervals(),
        vec![Duration::from_millis(250), Duration::from_millis(750)]
    );
}

#[test]
fn malformed_file_is_rejected() {
    let mut cfg = AgentConfig::default();
    assert!(cfg.apply_file_text("[polling]\nmax_polls=\"many\"").is_err());
}

#[test]
fn env_overrides_file_values() {
    let _guard = env_lock().lock().expect("env lock");
    clear_env();

    let path = temp_config_path();
    let mut f = std::fs::File::create(&path).expect("create file");
    writeln!(
        f,
        "[telemetry]\nenabled=false\nhost_id=\"from-file\"\n[polling]\nmax_polls=3"
    )
    .expect("write file");

    std::env::set_var("SHROUD_CONFIG_PATH", &path);
    std::env::set_var("SHROUD_TELEMETRY_ENABLED", "yes");
    std::env::set_var("SHROUD_POLL_INTERVALS_MS", "100, x, 300");
    std::env::set_var("SHROUD_ANOMALY_ENABLE_TIMING", "off");
    let cfg = AgentConfig::load().expect("load config");

    assert!(cfg.telemetry_enabled);
    assert_eq!(cfg.host_id, "from-file");
    assert_eq!(cfg.max_polls, 3);
    assert_eq!(cfg.poll_candidate_intervals_ms, vec![100, 300]);
    assert!(!cfg.anomaly_timing_probe);

    clear_env();
    let _ = std::fs::remove_file(path);
}

#[test]
fn missing_explicit_config_path_is_an_error() {
    let _guard = env_lock().lock().expect("env lock");
    clear_env();
    std::env::set_var("SHROUD_CONFIG_PATH", "/nonexistent/shroud.toml");
    assert!(AgentConfig::load().is_err());
    clear_env();
}

#[test]
fn helpers_parse_loose_input() {
    assert!(parse_bool(" On "));
    assert!(!parse_bool("nope"));
    assert_eq!(split_millis_csv("5,,0, 9"), vec![5, 9]);
}

#[test]
fn non_finite_probability_is_ignored_in_file_and_env() {
    let mut cfg = AgentConfig::default();
    cfg.apply_file_text("[detector]\nexecution_probability = nan\n")
        .expect("parse config");
    assert!((cfg.anomaly_execution_probability - 0.8).abs() < f64::EPSILON);

    let _guard = env_lock().lock().expect("env lock");
    clear_env();
    std::env::set_var("SHROUD_ANOMALY_EXECUTION_PROBABILITY", "NaN");
    let cfg = AgentConfig::load().expect("load config");
    assert!(cfg.anomaly_execution_probability.is_finite());
    assert!((cfg.anomaly_execution_probability - 0.8).abs() < f64::EPSILON);
    clear_env();
}
