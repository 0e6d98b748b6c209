pub(super) const CONFIG_PATH_ENV: &str = "SHROUD_CONFIG_PATH";

pub(super) const CONFIG_CANDIDATES: [&str; 2] = ["./conf/shroud.toml", "./shroud.toml"];

pub(super) const DEFAULT_POLL_INTERVALS_MS: [u64; 5] = [500, 700, 900, 1_100, 1_300];
pub(super) const DEFAULT_MAX_POLLS: u64 = 5;
pub(super) const DEFAULT_SIMULATED_RECORDS: u32 = 8;
pub(super) const DEFAULT_TARGET_QUANTITY: u32 = 500;
