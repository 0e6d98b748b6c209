use anyhow::Result;
use tracing::debug;

use super::types::AgentConfig;

impl AgentConfig {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let from_file = cfg.apply_file_config()?;
        cfg.apply_env_overrides();
        debug!(from_file, "agent configuration loaded");
        Ok(cfg)
    }
}
