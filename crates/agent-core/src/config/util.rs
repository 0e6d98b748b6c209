pub(super) fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// Parses `500,700,900` style lists, skipping entries that are not positive
/// integers.
pub(super) fn split_millis_csv(raw: &str) -> Vec<u64> {
    raw.split(',')
        .filter_map(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .collect()
}

pub(super) fn default_host_id() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "shroud-host".to_string())
}
