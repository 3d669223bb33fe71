//! Platform-specific paths for the local vault and its configuration

use std::path::PathBuf;

const APP_DIR: &str = "Cripta";

/// Database file name of the local vault
pub const VAULT_DB_NAME: &str = "cripta_vault.db";

/// Config file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the platform-specific data directory for storing the vault
///
/// Returns:
/// - Windows: %LOCALAPPDATA%\Cripta
/// - macOS: ~/Library/Application Support/Cripta
/// - Linux/Other: ~/.local/share/Cripta
pub fn get_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".data")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

/// Get the platform-specific config directory
pub fn get_config_dir() -> PathBuf {
    let base = dirs::config_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

/// Get the default vault database path
pub fn get_default_vault_path() -> PathBuf {
    get_data_dir().join(VAULT_DB_NAME)
}

/// Get the default config file path
pub fn get_default_config_path() -> PathBuf {
    get_config_dir().join(CONFIG_FILE_NAME)
}

/// Create the parent directory of `path` if needed
pub fn ensure_parent_dir(path: &std::path::Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let vault = get_default_vault_path();
        assert!(vault.ends_with(format!("{}/{}", APP_DIR, VAULT_DB_NAME)));

        let config = get_default_config_path();
        assert!(config.ends_with(format!("{}/{}", APP_DIR, CONFIG_FILE_NAME)));
    }

    #[test]
    fn test_ensure_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("vault.db");
        ensure_parent_dir(&path).unwrap();
        assert!(dir.path().join("a").join("b").is_dir());

        // Bare file name has no parent to create
        ensure_parent_dir(std::path::Path::new("vault.db")).unwrap();
    }
}
