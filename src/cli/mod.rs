//! tierstake Command Line Interface.
//!
//! Operator tooling around a local, file-backed deployment.

pub mod config;
pub mod deployment;
pub mod output;

pub use config::*;
pub use deployment::*;
pub use output::*;

use std::path::PathBuf;

use crate::core::config::EngineParams;
use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════════
// CLI APPLICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// CLI Application state
#[derive(Debug)]
pub struct CliApp {
    config: CliConfig,
    output: OutputFormatter,
    now: Option<u64>,
}

impl CliApp {
    /// Create new CLI application
    pub fn new(config: CliConfig) -> Self {
        let mut output = OutputFormatter::new(config.format);
        if !config.color {
            output = output.without_color();
        }
        Self {
            config,
            output,
            now: None,
        }
    }

    /// Pin the clock to a unix timestamp
    pub fn with_now(mut self, now: Option<u64>) -> Self {
        self.now = now;
        self
    }

    /// Override the output format
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self.output = OutputFormatter::new(format);
        if !self.config.color {
            self.output = self.output.without_color();
        }
        self
    }

    /// Get configuration
    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    /// Get output formatter
    pub fn output(&self) -> &OutputFormatter {
        &self.output
    }

    /// Data directory with `~` expanded
    pub fn data_dir(&self) -> PathBuf {
        expand_path(&self.config.data_dir)
    }

    /// Create the deployment and write the config file next to it
    pub fn init(&self, params: EngineParams, force: bool) -> Result<LocalDeployment> {
        let dir = self.data_dir();
        let deployment = LocalDeployment::init(
            &dir,
            params,
            self.config.operator_address(),
            self.now,
            force,
        )?;
        self.config.save(&dir.join(CONFIG_FILE))?;
        Ok(deployment)
    }

    /// Open the existing deployment
    pub fn open(&self) -> Result<LocalDeployment> {
        LocalDeployment::open(&self.data_dir(), self.now)
    }
}

impl Default for CliApp {
    fn default() -> Self {
        Self::new(CliConfig::default())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
