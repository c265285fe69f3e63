//! Configuration loaded from nightcap.toml
//!
//! Every key is optional. A missing default file means defaults; a file
//! named with `--config` must exist.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use nightcap_core::{Error, Result};
use serde::Deserialize;
use tracing::info;

use crate::state;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub client: ClientSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
    /// Defaults to `nightcap.db` in the platform data directory
    pub database: Option<PathBuf>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: nightcap_net::DEFAULT_PORT,
            database: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    pub request_timeout_ms: u64,
    pub history_limit: u32,
    /// Defaults to the working directory
    pub export_dir: Option<PathBuf>,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5000,
            history_limit: 20,
            export_dir: None,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None => {
                let path = state::default_config_path()?;
                if path.exists() {
                    Self::read(&path)
                } else {
                    info!(path = %path.display(), "No config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::parse(&contents)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::InvalidOperation(format!("invalid config: {}", e)))
    }

    /// Address to listen on, with an optional port override
    pub fn bind_addr(&self, port: Option<u16>) -> Result<SocketAddr> {
        let ip: IpAddr = self.server.bind.parse().map_err(|_| {
            Error::InvalidOperation(format!("invalid bind address {}", self.server.bind))
        })?;
        Ok(SocketAddr::new(ip, port.unwrap_or(self.server.port)))
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.server.database {
            Some(path) => Ok(path.clone()),
            None => state::default_database_path(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.client.request_timeout_ms)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.client
            .export_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 7440);
        assert_eq!(config.client.history_limit, 20);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.bind_addr(None).unwrap(),
            "0.0.0.0:7440".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [server]
            port = 9000
            database = "/tmp/bar.db"

            [client]
            export_dir = "/tmp/exports"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.bind_addr(Some(9100)).unwrap().port(), 9100);
        assert_eq!(config.bind_addr(None).unwrap().port(), 9000);
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/bar.db"));
        assert_eq!(config.client.request_timeout_ms, 5000);
        assert_eq!(config.export_dir(), PathBuf::from("/tmp/exports"));
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(Config::parse("[server]\nport = \"high\"").is_err());

        let config = Config::parse("[server]\nbind = \"not an ip\"").unwrap();
        assert!(config.bind_addr(None).is_err());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());

        let path = dir.path().join("nightcap.toml");
        std::fs::write(&path, "[client]\nhistory_limit = 5\n").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().client.history_limit, 5);
    }
}
