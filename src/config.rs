use crate::error::ConfigError;
use log::{LevelFilter, info};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILENAME: &str = "turtledb.toml";
pub const DEFAULT_DATA_FILENAME: &str = "users.json";
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

const ENV_CONFIG: &str = "TURTLEDB_CONFIG";
const ENV_DATA_PATH: &str = "TURTLEDB_DATA_PATH";
const ENV_LOG_LEVEL: &str = "TURTLEDB_LOG_LEVEL";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backing JSON file.
    pub path: PathBuf,
    pub pretty: bool,
    /// Write to a temporary file and rename it over the target.
    pub atomic_writes: bool,
    /// Re-read the file after every row-affecting UPDATE.
    pub reload_after_write: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: PathBuf::from(DEFAULT_DATA_FILENAME),
            pretty: true,
            atomic_writes: true,
            reload_after_write: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

/// Wrapper for LevelFilter so it can be read from TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLevel(pub LevelFilter);

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel(DEFAULT_LOG_LEVEL)
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LevelFilter::from_str(s.trim())
            .map(LogLevel)
            .map_err(|_| ConfigError::Invalid {
                key: "logging.level",
                message: format!("'{}' is not a log level", s),
            })
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        LogLevel::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Config {
    /// Load configuration.
    ///
    /// Loading order:
    /// 1. `explicit` path, else `TURTLEDB_CONFIG`, else `./turtledb.toml`
    /// 2. Defaults when no file exists (an explicit path must exist)
    /// 3. `TURTLEDB_*` environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var(ENV_CONFIG).ok().map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load_toml(&path)?,
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILENAME);
                if default.exists() {
                    Self::load_toml(&default)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_toml(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = toml::from_str(&contents).map_err(|e| ConfigError::Toml {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `TURTLEDB_DATA_PATH` and `TURTLEDB_LOG_LEVEL` from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATA_PATH).filter(|p| !p.trim().is_empty()) {
            self.store.path = PathBuf::from(path);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level.parse()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.store.path, PathBuf::from("users.json"));
        assert!(config.store.pretty);
        assert!(config.store.atomic_writes);
        assert!(!config.store.reload_after_write);
        assert_eq!(config.logging.level, LogLevel(LevelFilter::Info));
    }

    #[test]
    fn test_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turtledb.toml");
        std::fs::write(
            &path,
            "[store]\npath = \"data/users.json\"\nreload_after_write = true\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = Config::load_toml(&path).unwrap();
        assert_eq!(config.store.path, PathBuf::from("data/users.json"));
        assert!(config.store.reload_after_write);
        assert!(config.store.atomic_writes);
        assert_eq!(config.logging.level, LogLevel(LevelFilter::Debug));
    }

    #[test]
    fn test_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turtledb.toml");
        std::fs::write(&path, "[logging]\nlevel = \"loud\"\n").unwrap();
        assert!(matches!(
            Config::load_toml(&path),
            Err(ConfigError::Toml { .. })
        ));
        assert!(matches!(
            Config::load_toml(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TURTLEDB_DATA_PATH", "/tmp/other.json"),
            ("TURTLEDB_LOG_LEVEL", "warn"),
        ]);
        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.store.path, PathBuf::from("/tmp/other.json"));
        assert_eq!(config.logging.level, LogLevel(LevelFilter::Warn));

        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == "TURTLEDB_LOG_LEVEL").then(|| "chatty".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
