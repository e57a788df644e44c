//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Configuration loading and saving
//! - Default configuration generation
//! - Partial files falling back to defaults
//! - Environment variable overrides
//! - Invalid YAML handling

use camino::Utf8PathBuf;
use primescan::config::USER_CONFIG_FILE;
use primescan::{ConfigManager, UserConfig};
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

/// Manager whose environment prefix no other test sets
fn isolated_manager(config_path: &Utf8PathBuf) -> ConfigManager {
    ConfigManager::with_env_prefix(config_path, "PRIMESCAN_IT_UNSET").unwrap()
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
    assert_eq!(
        manager.user_config_path(),
        config_path.join(USER_CONFIG_FILE).as_path()
    );
}

#[test]
fn test_load_default_user_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = isolated_manager(&config_path);

    let config = manager.load_user_config().unwrap();
    let settings = config.scan_settings;

    assert_eq!(settings.default_start, "1");
    assert_eq!(settings.default_end, "100");
    assert!(!settings.debug_mode);
    assert!(!settings.console_logging);
    assert_eq!(settings.log_dir, "logs");
    assert_eq!(settings.worker_threads, 2);
}

#[test]
fn test_save_and_load_user_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = isolated_manager(&config_path);

    let mut config = UserConfig::default();
    config.scan_settings.default_start = "-10".to_string();
    config.scan_settings.default_end = "5000".to_string();
    config.scan_settings.debug_mode = true;
    config.scan_settings.log_dir = "scan-logs".to_string();

    manager.save_user_config(&config).unwrap();

    let written = fs::read_to_string(manager.user_config_path()).unwrap();
    assert!(written.contains("scan_settings:"));
    assert!(written.contains("debug_mode: true"));

    let loaded = manager.load_user_config().unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_config_uses_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = isolated_manager(&config_path);

    fs::write(
        config_path.join(USER_CONFIG_FILE),
        "scan_settings:\n  worker_threads: 8\n",
    )
    .unwrap();

    let settings = manager.load_user_config().unwrap().scan_settings;
    assert_eq!(settings.worker_threads, 8);
    assert_eq!(settings.default_end, "100");
    assert_eq!(settings.log_dir, "logs");
}

#[test]
fn test_environment_overrides_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::with_env_prefix(&config_path, "PRIMESCAN_IT_ENV").unwrap();

    let mut config = UserConfig::default();
    config.scan_settings.worker_threads = 3;
    manager.save_user_config(&config).unwrap();

    // Only this test reads the PRIMESCAN_IT_ENV prefix
    unsafe {
        std::env::set_var("PRIMESCAN_IT_ENV_SCAN_SETTINGS__WORKER_THREADS", "7");
        std::env::set_var("PRIMESCAN_IT_ENV_SCAN_SETTINGS__DEBUG_MODE", "true");
        std::env::set_var("PRIMESCAN_IT_ENV_SCAN_SETTINGS__DEFAULT_END", "500");
    }

    let settings = manager.load_user_config().unwrap().scan_settings;

    unsafe {
        std::env::remove_var("PRIMESCAN_IT_ENV_SCAN_SETTINGS__WORKER_THREADS");
        std::env::remove_var("PRIMESCAN_IT_ENV_SCAN_SETTINGS__DEBUG_MODE");
        std::env::remove_var("PRIMESCAN_IT_ENV_SCAN_SETTINGS__DEFAULT_END");
    }

    assert_eq!(settings.worker_threads, 7);
    assert!(settings.debug_mode);
    assert_eq!(settings.default_end, "500");
    assert_eq!(settings.default_start, "1");
}

#[test]
fn test_ensure_user_config_creates_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = isolated_manager(&config_path);

    assert!(manager.ensure_user_config().unwrap());

    let loaded = manager.load_user_config().unwrap();
    assert_eq!(loaded, UserConfig::default());
}

#[test]
fn test_ensure_user_config_keeps_existing_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = isolated_manager(&config_path);

    let mut config = UserConfig::default();
    config.scan_settings.default_end = "250".to_string();
    manager.save_user_config(&config).unwrap();

    assert!(!manager.ensure_user_config().unwrap());
    assert_eq!(manager.load_user_config().unwrap(), config);
}

#[test]
fn test_config_directory_creation() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf())
        .unwrap()
        .join("nonexistent_dir");

    // Directory doesn't exist yet
    assert!(!config_path.exists());

    // Creating ConfigManager should create the directory
    let _manager = ConfigManager::new(&config_path).unwrap();

    // Directory should now exist
    assert!(config_path.exists());
}

#[test]
fn test_invalid_yaml_handling() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = isolated_manager(&config_path);

    fs::write(
        config_path.join(USER_CONFIG_FILE),
        "scan_settings: [unclosed",
    )
    .unwrap();

    let result = manager.load_user_config();
    assert!(result.is_err(), "Should fail to parse invalid YAML");
}

#[test]
fn test_concurrent_config_access() {
    use std::sync::Arc;

    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = Arc::new(isolated_manager(&config_path));
    manager.ensure_user_config().unwrap();

    let mut handles = vec![];

    for _ in 0..10 {
        let manager_clone = manager.clone();
        let handle = std::thread::spawn(move || {
            let config = manager_clone.load_user_config().unwrap();
            assert_eq!(config.scan_settings.worker_threads, 2);
        });
        handles.push(handle);
    }

    // All threads should complete successfully
    for handle in handles {
        handle.join().unwrap();
    }
}
