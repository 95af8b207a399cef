//! Gateway configuration.

use anyhow::{Context, Result};
use fleetsync_client::{PrimaryConfig, SecondaryConfig};
use fleetsync_dualwrite::DualWriteConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything the gateway binary needs to wire the dual-write core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub primary: PrimaryConfig,
    pub secondary: SecondaryConfig,
    pub dual_write: DualWriteConfig,
    /// SQLite file holding the sync log.
    pub sync_log_path: PathBuf,
    pub http_port: u16,
    /// Run a reconciliation sweep this often, in seconds. `None` disables it.
    pub sync_interval_secs: Option<u64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            primary: PrimaryConfig::default(),
            secondary: SecondaryConfig::default(),
            dual_write: DualWriteConfig::default(),
            sync_log_path: PathBuf::from("fleetsync-sync-log.db"),
            http_port: 8080,
            sync_interval_secs: None,
        }
    }
}

impl GatewayConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"dual_write": {{"prefer_secondary": true}}, "http_port": 9090}}"#
        )
        .unwrap();

        let config = GatewayConfig::load(file.path()).unwrap();
        assert!(config.dual_write.prefer_secondary);
        assert!(config.dual_write.fallback_enabled);
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.primary.base_url, "http://localhost:9000");
        assert_eq!(config.secondary.timeout_secs, 30);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let err = GatewayConfig::load(Path::new("/nonexistent/fleetsync.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
