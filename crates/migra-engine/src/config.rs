//! Runner configuration
//!
//! Read once per run from defaults, an optional TOML file, and the
//! environment (`REDEPLOY`, `MIGRA_NETWORK`, `MIGRA_STORE_DIR`).

use crate::error::MigrationError;
use migra_registry::{NetworkId, PersistMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment switch that bypasses alias reuse for a whole run
///
/// Any non-empty value turns it on, including `0` and `false`.
pub const FORCE_REDEPLOY_ENV: &str = "REDEPLOY";
/// Environment override for the target network
pub const NETWORK_ENV: &str = "MIGRA_NETWORK";
/// Environment override for the store directory
pub const STORE_DIR_ENV: &str = "MIGRA_STORE_DIR";

/// Migration runner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    /// Target network; defaults to the chain client's network
    pub network: Option<NetworkId>,
    /// Directory for the file store
    pub store_dir: PathBuf,
    /// Redeploy every target even when its alias is bound
    pub force_redeploy: bool,
    /// Persistence of alias writes during prepare
    pub prepare_mode: PersistMode,
}

impl MigrationConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With target network
    #[inline]
    #[must_use]
    pub fn with_network(mut self, network: NetworkId) -> Self {
        self.network = Some(network);
        self
    }

    /// With store directory
    #[inline]
    #[must_use]
    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = dir.into();
        self
    }

    /// With force-redeploy switch
    #[inline]
    #[must_use]
    pub fn with_force_redeploy(mut self, force: bool) -> Self {
        self.force_redeploy = force;
        self
    }

    /// With prepare-phase persistence
    #[inline]
    #[must_use]
    pub fn with_prepare_mode(mut self, mode: PersistMode) -> Self {
        self.prepare_mode = mode;
        self
    }

    /// Parse TOML
    ///
    /// # Errors
    /// Returns [`MigrationError::Config`] on malformed input.
    pub fn from_toml_str(raw: &str) -> Result<Self, MigrationError> {
        toml::from_str(raw).map_err(|e| MigrationError::Config(e.to_string()))
    }

    /// Load TOML file
    ///
    /// # Errors
    /// Returns [`MigrationError::Config`] if the file is unreadable or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MigrationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| MigrationError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Apply environment overrides from the process environment
    ///
    /// # Errors
    /// Returns [`MigrationError::Config`] if `MIGRA_NETWORK` is invalid.
    pub fn with_env_overrides(self) -> Result<Self, MigrationError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`
    ///
    /// # Errors
    /// Returns [`MigrationError::Config`] if the network override is invalid.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, MigrationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(FORCE_REDEPLOY_ENV) {
            self.force_redeploy = flag_enabled(&raw);
        }
        if let Some(raw) = lookup(NETWORK_ENV) {
            let network =
                NetworkId::new(raw).map_err(|e| MigrationError::Config(e.to_string()))?;
            self.network = Some(network);
        }
        if let Some(raw) = lookup(STORE_DIR_ENV).filter(|s| !s.is_empty()) {
            self.store_dir = PathBuf::from(raw);
        }
        Ok(self)
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            network: None,
            store_dir: PathBuf::from("deployments"),
            force_redeploy: false,
            prepare_mode: PersistMode::Ephemeral,
        }
    }
}

/// Set means non-empty
fn flag_enabled(raw: &str) -> bool {
    !raw.trim().is_empty()
}
