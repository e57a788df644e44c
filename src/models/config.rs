use serde::{Deserialize, Serialize};

/// User configuration from `PrimeScan Config.yaml`
///
/// Every field has a default, so a missing or partial file is fine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub scan_settings: ScanSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Start text used by a bare `start` command
    #[serde(default = "default_start")]
    pub default_start: String,

    /// End text used by a bare `start` command
    #[serde(default = "default_end")]
    pub default_end: String,

    #[serde(default)]
    pub debug_mode: bool,

    /// Mirror log output to the terminal (off by default so it does not
    /// interleave with scan output)
    #[serde(default)]
    pub console_logging: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            default_start: default_start(),
            default_end: default_end(),
            debug_mode: false,
            console_logging: false,
            log_dir: default_log_dir(),
            worker_threads: default_worker_threads(),
        }
    }
}

fn default_start() -> String {
    "1".to_string()
}

fn default_end() -> String {
    "100".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_worker_threads() -> usize {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_settings_defaults() {
        let settings = ScanSettings::default();
        assert_eq!(settings.default_start, "1");
        assert_eq!(settings.default_end, "100");
        assert_eq!(settings.log_dir, "logs");
        assert_eq!(settings.worker_threads, 2);
        assert!(!settings.debug_mode);
        assert!(!settings.console_logging);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: UserConfig =
            serde_yaml_ng::from_str("scan_settings:\n  default_end: \"500\"\n").unwrap();
        assert_eq!(config.scan_settings.default_end, "500");
        assert_eq!(config.scan_settings.default_start, "1");
    }

    #[test]
    fn test_empty_document_is_default() {
        let config: UserConfig = serde_yaml_ng::from_str("{}").unwrap();
        assert_eq!(config, UserConfig::default());
    }
}
