//! CLI Configuration.
//!
//! Configuration management for the `tierstake` operator tool.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::output::OutputFormat;
use crate::error::{Error, Result};
use crate::utils::crypto::Address;

/// Name of the config file inside the data directory
pub const CONFIG_FILE: &str = "config.json";

// ═══════════════════════════════════════════════════════════════════════════════
// CLI CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// CLI Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Data directory holding the local deployment
    pub data_dir: PathBuf,
    /// Default output format
    pub format: OutputFormat,
    /// Operator identity (hex address or label) used for admin commands
    pub operator: String,
    /// Colored output
    pub color: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            format: OutputFormat::Text,
            operator: "operator".into(),
            color: true,
        }
    }
}

impl CliConfig {
    /// Load from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        serde_json::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Config(e.to_string()))?;
        }

        std::fs::write(path, content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("TIERSTAKE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(operator) = std::env::var("TIERSTAKE_OPERATOR") {
            config.operator = operator;
        }

        if let Ok(format) = std::env::var("TIERSTAKE_OUTPUT") {
            match format.parse() {
                Ok(f) => config.format = f,
                Err(e) => tracing::warn!("Ignoring TIERSTAKE_OUTPUT: {}", e),
            }
        }

        config
    }

    /// Config file path inside the configured data directory
    pub fn path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    /// Operator address
    pub fn operator_address(&self) -> Address {
        Address::parse(&self.operator)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("data directory cannot be empty".into()));
        }

        if self.operator.trim().is_empty() {
            return Err(Error::Config("operator cannot be empty".into()));
        }

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Get default data directory
pub fn default_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".tierstake");
    }

    PathBuf::from(".tierstake")
}

/// Expand a leading `~` to `$HOME`
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let (Some(rest), Ok(home)) = (path_str.strip_prefix('~'), std::env::var("HOME")) {
        PathBuf::from(format!("{}{}", home, rest))
    } else {
        path.to_path_buf()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
