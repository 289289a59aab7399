use anyhow::{Context, Result};
use grove_repo::{Dispatch, Threshold};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub access: AccessConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind to
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding static resources (favicon)
    #[serde(default = "default_resources")]
    pub resources: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Which permission class must be able to read an entry for it to be served
    #[serde(default)]
    pub threshold: Threshold,
    /// How page requests are routed once a repository is found
    #[serde(default)]
    pub dispatch: Dispatch,
}

pub fn default_bind() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    8860
}

pub fn default_resources() -> PathBuf {
    PathBuf::from("/usr/share/grove")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            resources: default_resources(),
        }
    }
}

impl ServerConfig {
    /// `bind:port`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Config {
    /// Load config from the default location, or create it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = get_config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(get_config_path())
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }
}

/// Get the grove directory (~/.grove)
pub fn get_grove_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".grove")
}

/// Get the config file path (~/.grove/config.toml)
pub fn get_config_path() -> PathBuf {
    get_grove_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 8860);
        assert_eq!(config.server.addr(), "0.0.0.0:8860");
        assert_eq!(config.server.resources, PathBuf::from("/usr/share/grove"));
        assert_eq!(config.access.threshold, Threshold::Other);
        assert_eq!(config.access.dispatch, Dispatch::Structural);
    }

    #[test]
    fn test_partial_config_fills_defaults() -> Result<()> {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000

            [access]
            threshold = "group"
            "#,
        )?;
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.access.threshold, Threshold::Group);
        assert_eq!(config.access.dispatch, Dispatch::Structural);
        Ok(())
    }

    #[test]
    fn test_unknown_threshold_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str(
            r#"
            [access]
            threshold = "world"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.server.bind = "127.0.0.1".to_string();
        config.access.threshold = Threshold::Owner;
        config.access.dispatch = Dispatch::Substring;
        config.save_to(&path)?;

        let loaded = Config::load_from(&path)?;
        assert_eq!(loaded.server.bind, "127.0.0.1");
        assert_eq!(loaded.access.threshold, Threshold::Owner);
        assert_eq!(loaded.access.dispatch, Dispatch::Substring);

        Ok(())
    }

    #[test]
    fn test_load_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Config::load_from(temp_dir.path().join("absent.toml")).is_err());
    }
}
