//! `coinbal.toml` loader. Every field is optional; command-line flags win.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use coinbal_core::Role;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "coinbal.toml";
pub const DEFAULT_STATE_FILE: &str = "coinbal.state.json";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// JSON snapshot holding the committed ledger state.
    pub state_file: Option<PathBuf>,
    /// Role attribute attested for every invocation made by this host.
    pub caller_role: Option<Role>,
    /// Actor ids the actor registry reports as existing.
    pub known_actors: Vec<String>,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

impl CliConfig {
    /// Reads `path`. A missing default file yields defaults; a missing
    /// explicitly requested file is an error.
    pub fn load(path: &Path, explicit: bool) -> Result<Self> {
        if !path.exists() {
            if explicit {
                bail!("configuration file not found: {}", path.display());
            }
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn apply_overrides(&mut self, state_file: Option<PathBuf>, caller_role: Option<Role>) {
        if state_file.is_some() {
            self.state_file = state_file;
        }
        if caller_role.is_some() {
            self.caller_role = caller_role;
        }
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}
