//! Vault configuration.
//!
//! Loaded from a TOML file when one exists; every field has a default so a
//! partial file is valid.

use crate::crypto::KdfParams;
use crate::platform;
use crate::sync::ConflictPolicy;
use crate::{CriptaError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriptaConfig {
    /// Owner of the local vault
    pub user_id: String,
    pub vault_path: PathBuf,
    pub session: SessionConfig,
    /// Argon2id parameters for newly created credentials
    pub kdf: KdfParams,
    pub sync: SyncConfig,
}

impl Default for CriptaConfig {
    fn default() -> Self {
        Self {
            user_id: "local".to_string(),
            vault_path: platform::get_default_vault_path(),
            session: SessionConfig::default(),
            kdf: KdfParams::default(),
            sync: SyncConfig::default(),
        }
    }
}

/// Session timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub inactivity_timeout_secs: u64,
    pub background_grace_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: 60,
            background_grace_secs: 10,
        }
    }
}

impl SessionConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn background_grace(&self) -> Duration {
        Duration::from_secs(self.background_grace_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub conflict_policy: ConflictPolicy,
}

impl CriptaConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CriptaError::Config(format!("{}: {}", path.display(), e)))?;
        config.kdf.validate()?;
        Ok(config)
    }

    /// Parse `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| CriptaError::Config(e.to_string()))?;
        platform::ensure_parent_dir(path)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CriptaConfig::default();
        assert_eq!(config.session.inactivity_timeout(), Duration::from_secs(60));
        assert_eq!(config.session.background_grace(), Duration::from_secs(10));
        assert_eq!(config.kdf, KdfParams::default());
        assert_eq!(config.sync.conflict_policy, ConflictPolicy::RemoteWins);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
user_id = "alice"

[session]
inactivity_timeout_secs = 300

[sync]
conflict_policy = "keep_local_copy"
"#,
        )
        .unwrap();

        let config = CriptaConfig::load(&path).unwrap();
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.session.inactivity_timeout_secs, 300);
        assert_eq!(config.session.background_grace_secs, 10);
        assert_eq!(config.sync.conflict_policy, ConflictPolicy::KeepLocalCopy);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "user_id = [").unwrap();
        assert!(matches!(
            CriptaConfig::load(&path),
            Err(CriptaError::Config(_))
        ));

        std::fs::write(&path, "[kdf]\niterations = 0\n").unwrap();
        assert!(CriptaConfig::load(&path).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = CriptaConfig::default();
        config.user_id = "bob".to_string();
        config.vault_path = dir.path().join("vault.db");
        config.save(&path).unwrap();

        assert_eq!(CriptaConfig::load_or_default(&path).unwrap(), config);
        assert_eq!(
            CriptaConfig::load_or_default(&dir.path().join("missing.toml")).unwrap(),
            CriptaConfig::default()
        );
    }
}
