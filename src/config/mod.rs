use crate::models::UserConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// File name of the user configuration inside the config directory
pub const USER_CONFIG_FILE: &str = "PrimeScan Config.yaml";

/// Prefix of environment variables that override file settings
pub const ENV_PREFIX: &str = "PRIMESCAN";

/// Configuration manager for loading and saving the YAML configuration file.
///
/// Settings come from `PrimeScan Config.yaml` in the config directory, then
/// environment variables override them: `PRIMESCAN_SCAN_SETTINGS__DEBUG_MODE=true`
/// sets `scan_settings.debug_mode`. A missing file means defaults.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    user_config_path: Utf8PathBuf,
    env_prefix: String,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// The directory is created if it does not exist.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        Self::with_env_prefix(config_dir, ENV_PREFIX)
    }

    /// Like [`new`](Self::new) but reading overrides from `<prefix>_...` variables.
    pub fn with_env_prefix<P: AsRef<Utf8Path>>(config_dir: P, env_prefix: &str) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            user_config_path: config_dir.join(USER_CONFIG_FILE),
            config_dir,
            env_prefix: env_prefix.to_string(),
        })
    }

    /// Load the user configuration, layering environment overrides on the file.
    pub fn load_user_config(&self) -> Result<UserConfig> {
        if self.user_config_path.exists() {
            tracing::info!("Loading user config from {}", self.user_config_path);
        } else {
            tracing::warn!(
                "User config file not found at {}, using defaults",
                self.user_config_path
            );
        }

        let layered = Config::builder()
            .add_source(
                File::from(self.user_config_path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read user config: {}", self.user_config_path))?;

        let config: UserConfig = layered
            .try_deserialize()
            .with_context(|| format!("Failed to parse user config: {}", self.user_config_path))?;

        tracing::debug!("Effective user config: {:?}", config);
        Ok(config)
    }

    /// Save the user configuration file.
    pub fn save_user_config(&self, config: &UserConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize user config to YAML")?;

        fs::write(&self.user_config_path, yaml_string)
            .with_context(|| format!("Failed to write user config: {}", self.user_config_path))?;

        tracing::info!("Saved user config to {}", self.user_config_path);
        Ok(())
    }

    /// Write a default configuration file unless one already exists.
    ///
    /// # Returns
    /// `true` if a file was written
    pub fn ensure_user_config(&self) -> Result<bool> {
        if self.user_config_path.exists() {
            return Ok(false);
        }

        self.save_user_config(&UserConfig::default())?;
        Ok(true)
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn user_config_path(&self) -> &Utf8Path {
        &self.user_config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager =
            ConfigManager::with_env_prefix(&config_path, "PRIMESCAN_UNIT_TEST_UNSET").unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_create_config_manager() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(manager.user_config_path().as_str().ends_with(USER_CONFIG_FILE));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();

        let loaded = manager.load_user_config().unwrap();
        assert_eq!(loaded, UserConfig::default());
    }

    #[test]
    fn test_load_save_user_config() {
        let (manager, _temp_dir) = create_test_config_manager();

        let mut config = UserConfig::default();
        config.scan_settings.default_end = "1000".to_string();
        config.scan_settings.worker_threads = 4;
        manager.save_user_config(&config).unwrap();

        let loaded = manager.load_user_config().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ensure_user_config_writes_once() {
        let (manager, _temp_dir) = create_test_config_manager();

        assert!(manager.ensure_user_config().unwrap());
        assert!(manager.user_config_path().exists());
        assert!(!manager.ensure_user_config().unwrap());
    }
}
