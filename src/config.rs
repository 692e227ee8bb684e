use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000";
pub const DEFAULT_QUERY_PATH: &str = "/run_query";

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub query_path: String,
    pub data_dir: PathBuf,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            query_path: DEFAULT_QUERY_PATH.to_string(),
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".querychat"))
        .unwrap_or_else(|| PathBuf::from(".querychat"))
}

impl ClientConfig {
    /// Defaults, then `<data_dir>/config.json`, then `QUERYCHAT_*` environment variables.
    pub fn load() -> Result<Self> {
        let lookup = |key: &str| std::env::var(key).ok();

        // The data dir may itself be overridden, so resolve it before reading the file.
        let data_dir = lookup("QUERYCHAT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let mut config = Self::from_dir(&data_dir)?;
        config.data_dir = data_dir;
        config.apply_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Read `config.json` from `dir`, falling back to defaults when the file is absent.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|err| Error::Config(format!("failed to parse {}: {err}", path.display())))
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup("QUERYCHAT_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(query_path) = lookup("QUERYCHAT_QUERY_PATH") {
            self.query_path = query_path;
        }
        if let Some(data_dir) = lookup("QUERYCHAT_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }
        if let Some(level) = lookup("QUERYCHAT_LOG") {
            self.log_level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(Error::Config(format!(
                "endpoint must be an http(s) URL, got {:?}",
                self.endpoint
            )));
        }
        if !self.query_path.starts_with('/') {
            return Err(Error::Config(format!(
                "query_path must start with '/', got {:?}",
                self.query_path
            )));
        }
        Ok(())
    }

    pub fn query_url(&self) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), self.query_path)
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join("storage")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.query_url(), "http://127.0.0.1:5000/run_query");
    }

    #[test]
    fn query_url_does_not_double_slashes() {
        let config = ClientConfig {
            endpoint: "https://db.example.com/".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(config.query_url(), "https://db.example.com/run_query");
    }

    #[test]
    fn from_dir_merges_partial_file_over_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{ "endpoint": "http://10.0.0.5:8080" }"#,
        )
        .unwrap();

        let config = ClientConfig::from_dir(dir.path()).unwrap();
        assert_eq!(config.endpoint, "http://10.0.0.5:8080");
        assert_eq!(config.query_path, DEFAULT_QUERY_PATH);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn from_dir_rejects_malformed_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{ not json").unwrap();

        let err = ClientConfig::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn overrides_replace_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("QUERYCHAT_ENDPOINT", "https://remote.example.com"),
            ("QUERYCHAT_LOG", "debug"),
        ]);
        let mut config = ClientConfig::default();
        config.apply_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.endpoint, "https://remote.example.com");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.query_path, DEFAULT_QUERY_PATH);
    }

    #[test]
    fn validate_rejects_bad_endpoint_and_path() {
        let config = ClientConfig {
            endpoint: "localhost:5000".to_string(),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            query_path: "run_query".to_string(),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
