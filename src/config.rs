use crate::error::{AgError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "deepseek-r1";
pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
const CONFIG_FILE: &str = "config.toml";

/// Central configuration for ag
#[derive(Debug, Clone, PartialEq)]
pub struct AgConfig {
    /// Directory holding `sessions/` and the current-session pointer
    pub root: PathBuf,
    pub model: String,
    pub base_url: String,
    /// Piped input beyond this many characters is dropped
    pub max_input_chars: usize,
    pub spinner_interval: Duration,
    pub connect_timeout: Duration,
}

impl Default for AgConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_input_chars: 57_000,
            spinner_interval: Duration::from_millis(250),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Optional overrides read from `<root>/config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    model: Option<String>,
    base_url: Option<String>,
    max_input_chars: Option<usize>,
    spinner_interval_ms: Option<u64>,
    connect_timeout_secs: Option<u64>,
}

impl AgConfig {
    /// Builds the configuration for `root`, applying `config.toml` when present.
    pub fn load(root: PathBuf) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        let mut config = Self {
            root,
            ..Self::default()
        };

        if path.exists() {
            let file = read_config_file(&path)?;
            config.apply(file);
            tracing::debug!(path = %path.display(), "Loaded config file");
        }

        Ok(config)
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(model) = file.model {
            self.model = model;
        }
        if let Some(base_url) = file.base_url {
            self.base_url = base_url;
        }
        if let Some(max) = file.max_input_chars {
            self.max_input_chars = max;
        }
        if let Some(ms) = file.spinner_interval_ms {
            self.spinner_interval = Duration::from_millis(ms.max(10));
        }
        if let Some(secs) = file.connect_timeout_secs {
            self.connect_timeout = Duration::from_secs(secs);
        }
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| AgError::Config(format!("Invalid {}: {}", path.display(), e)))
}

/// `$AG_HOME`, or `~/.ag/<user>`.
pub fn default_root() -> PathBuf {
    if let Some(home) = std::env::var_os("AG_HOME") {
        return PathBuf::from(home);
    }
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "default".to_string());
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".ag")
        .join(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = AgConfig::load(temp_dir.path().to_path_buf()).unwrap();

        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_input_chars, 57_000);
        assert_eq!(config.spinner_interval, Duration::from_millis(250));
        assert_eq!(config.root, temp_dir.path());
    }

    #[test]
    fn test_file_overrides() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE),
            "model = \"qwen-max\"\nmax_input_chars = 1000\nspinner_interval_ms = 100\n",
        )
        .unwrap();

        let config = AgConfig::load(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(config.model, "qwen-max");
        assert_eq!(config.max_input_chars, 1000);
        assert_eq!(config.spinner_interval, Duration::from_millis(100));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE), "colour = \"red\"\n").unwrap();

        let err = AgConfig::load(temp_dir.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, AgError::Config(_)));
    }
}
