use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Global configuration loaded from `~/.config/adm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmConfig {
    /// Maximum archives fetched concurrently (download pool capacity).
    pub max_concurrent_downloads: usize,
    /// Maximum files hashed concurrently (hashing pool capacity).
    pub max_concurrent_hashes: usize,
    /// Upper bound on archives fetched in a single download-all run.
    pub max_downloads_per_run: usize,
}

impl Default for AdmConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 16,
            max_concurrent_hashes: 8,
            max_downloads_per_run: 6000,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("adm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<AdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = AdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: AdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = AdmConfig::default();
        assert_eq!(cfg.max_concurrent_downloads, 16);
        assert_eq!(cfg.max_concurrent_hashes, 8);
        assert_eq!(cfg.max_downloads_per_run, 6000);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = AdmConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: AdmConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_concurrent_downloads, cfg.max_concurrent_downloads);
        assert_eq!(parsed.max_concurrent_hashes, cfg.max_concurrent_hashes);
        assert_eq!(parsed.max_downloads_per_run, cfg.max_downloads_per_run);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            max_concurrent_downloads = 4
            max_concurrent_hashes = 2
            max_downloads_per_run = 100
        "#;
        let cfg: AdmConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_concurrent_downloads, 4);
        assert_eq!(cfg.max_concurrent_hashes, 2);
        assert_eq!(cfg.max_downloads_per_run, 100);
    }
}
