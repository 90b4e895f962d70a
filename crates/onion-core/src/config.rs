use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ambient configuration for the whole orchestrator, following the
/// teacher's `TorServiceConfig::from_env()` convention: defaults, then an
/// optional file, then environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub install_root: PathBuf,
    pub require_gpg: bool,
    pub http_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub tar_timeout_secs: u64,
    pub gpg_timeout_secs: u64,
    pub allowed_fingerprints: Vec<String>,
    pub log_level: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            install_root: std::env::temp_dir().join("onion-install"),
            require_gpg: false,
            http_timeout_secs: 120,
            download_timeout_secs: 300,
            tar_timeout_secs: 600,
            gpg_timeout_secs: 60,
            allowed_fingerprints: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_file(path: &std::path::Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        toml::from_str(&text).map_err(|e| e.to_string())
    }

    /// Layers `ONION_INSTALL_ROOT` / `ONION_REQUIRE_GPG` / `ONION_LOG_LEVEL`
    /// on top of `base` (defaults, or a loaded config file).
    pub fn from_env_over(mut base: Self) -> Self {
        if let Ok(root) = std::env::var("ONION_INSTALL_ROOT") {
            base.install_root = PathBuf::from(root);
        }
        if let Ok(flag) = std::env::var("ONION_REQUIRE_GPG") {
            base.require_gpg = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(level) = std::env::var("ONION_LOG_LEVEL") {
            base.log_level = level;
        }
        base
    }

    pub fn from_env() -> Self {
        Self::from_env_over(Self::default())
    }
}
