use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Library configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// User whose tree all components address
    pub user: String,
    /// Deadline applied to every remote call, in seconds
    pub remote_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: "default".to_string(),
            remote_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut config = Self::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
        }

        // Apply environment variable overrides
        if let Ok(user) = std::env::var("DAYBOOK_USER") {
            config.user = user;
        }
        if let Ok(secs) = std::env::var("DAYBOOK_REMOTE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                config.remote_timeout_secs = secs;
            }
        }

        Ok(config)
    }

    /// Default config file path: ~/.config/daybook/config.yaml
    pub fn default_config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join(".config")
            .join("daybook")
            .join("config.yaml")
    }

    /// The remote-call deadline as a `Duration`, for the timeout decorators.
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    e
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.user, "default");
        assert_eq!(config.remote_timeout_secs, 30);
    }

    #[test]
    fn test_load_no_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.user, "default");
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "user: testuser").unwrap();
        writeln!(file, "remote_timeout_secs: 5").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.user, "testuser");
        assert_eq!(config.remote_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "user: fromfile").unwrap();

        // Set env var
        std::env::set_var("DAYBOOK_USER", "fromenv");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.user, "fromenv");

        // Clean up
        std::env::remove_var("DAYBOOK_USER");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
