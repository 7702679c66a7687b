//! Configuration loader

use std::path::Path;

use weft_utils::{config_file, Result, WeftError};

use crate::options::find_option;

use super::AppConfig;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the default location. A missing file gives
    /// the defaults.
    pub fn load() -> Result<AppConfig> {
        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(AppConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| WeftError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<AppConfig> {
        toml::from_str(content).map_err(|e| WeftError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate configuration
    pub fn validate(config: &AppConfig) -> Result<()> {
        if config.server.attach_timeout_ms == 0 {
            return Err(WeftError::config("attach_timeout_ms must be positive"));
        }
        if config.server.client_queue_depth < 8 {
            return Err(WeftError::config("client_queue_depth must be at least 8"));
        }
        if config.server.default_cols == 0 || config.server.default_rows == 0 {
            return Err(WeftError::config("default size must be at least 1x1"));
        }

        let relay = &config.relay;
        if relay.enabled() && relay.token_rw.is_none() && relay.token_ro.is_none() {
            return Err(WeftError::config(
                "relay.listen needs token_rw or token_ro",
            ));
        }
        if relay.token_rw.is_some() && relay.token_rw == relay.token_ro {
            return Err(WeftError::config("relay tokens must differ"));
        }
        if [&relay.token_rw, &relay.token_ro]
            .into_iter()
            .flatten()
            .any(|t| t.is_empty())
        {
            return Err(WeftError::config("relay tokens must not be empty"));
        }

        for (name, value) in config.option_values() {
            let spec = find_option(&name)
                .ok_or_else(|| WeftError::config(format!("unknown option: {}", name)))?;
            spec.parse_value(&value)
                .map_err(|e| WeftError::config(e.to_string()))?;
        }

        Ok(())
    }

    /// Load from `path` (or the default location) and validate
    pub fn load_and_validate(path: Option<&Path>) -> Result<AppConfig> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load()?,
        };
        Self::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_from_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(
            &path,
            r#"
            [server]
            attach_timeout_ms = 2500

            [relay]
            listen = "127.0.0.1:7711"
            token_rw = "alpha"

            [options]
            history-limit = 5000
            remain-on-exit = true
            update-environment = ["DISPLAY", "TERM"]
            "#,
        )
        .unwrap();

        let config = ConfigLoader::load_and_validate(Some(&path)).unwrap();
        assert_eq!(config.server.attach_timeout_ms, 2500);
        assert_eq!(config.server.client_queue_depth, 256);
        assert_eq!(config.relay.listen.as_deref(), Some("127.0.0.1:7711"));
        assert_eq!(
            config.option_values(),
            vec![
                ("history-limit".to_string(), "5000".to_string()),
                ("remain-on-exit".to_string(), "on".to_string()),
                ("update-environment".to_string(), "DISPLAY TERM".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_path_fails() {
        let dir = tempdir().unwrap();
        let result = ConfigLoader::load_from_path(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(WeftError::FileRead { .. })));
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = ConfigLoader::parse("invalid { toml", Path::new("test.toml"));
        assert!(matches!(result, Err(WeftError::ConfigInvalid { .. })));
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_validate_rejects_unknown_option() {
        let config = ConfigLoader::parse("[options]\nno-such-thing = 1\n", Path::new("c.toml")).unwrap();
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_option_value() {
        let config =
            ConfigLoader::parse("[options]\nhistory-limit = \"lots\"\n", Path::new("c.toml")).unwrap();
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validate_relay_needs_token() {
        let mut config = AppConfig::default();
        config.relay.listen = Some("127.0.0.1:0".into());
        assert!(ConfigLoader::validate(&config).is_err());

        config.relay.token_ro = Some("view".into());
        assert!(ConfigLoader::validate(&config).is_ok());

        config.relay.token_rw = Some("view".into());
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validate_queue_depth() {
        let mut config = AppConfig::default();
        config.server.client_queue_depth = 1;
        assert!(ConfigLoader::validate(&config).is_err());
    }
}
