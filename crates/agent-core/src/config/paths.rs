use std::path::PathBuf;

use anyhow::Result;

use super::constants::{CONFIG_CANDIDATES, CONFIG_PATH_ENV};

pub(super) fn resolve_config_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(CONFIG_PATH_ENV) {
        let p = p.trim();
        if !p.is_empty() {
            let path = PathBuf::from(p);
            if !path.exists() {
                anyhow::bail!(
                    "configured {} does not exist: {}",
                    CONFIG_PATH_ENV,
                    path.display()
                );
            }
            return Ok(Some(path));
        }
    }

    Ok(CONFIG_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists()))
}
