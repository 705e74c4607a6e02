//! Node configuration: a TOML file with environment overrides.
//!
//! Environment variables win over the file: `PORT`, `SB_FEDERATES`
//! (comma-separated), `SB_FQDN`, `SB_PROPAGATE_WAIT_SECS`, `SB_ADMIN_BOARD`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Which backend holds the boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    Memory,
    Sled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub driver: StoreDriver,
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            driver: StoreDriver::Sled,
            path: PathBuf::from("./spring83-db"),
        }
    }
}

/// Everything the node needs to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Peer base URLs boards are propagated to.
    pub federates: Vec<String>,
    /// Hostname broadcast in outbound `Via` headers. Defaults to the OS
    /// hostname, then the literal "localhost".
    pub fqdn: Option<String>,
    /// Delay before the first delivery attempt for a queued board.
    pub propagate_wait_secs: u64,
    /// Board key pinned at the top of the index view.
    pub admin_board: Option<String>,
    pub store: StoreConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            federates: Vec::new(),
            fqdn: None,
            propagate_wait_secs: 300,
            admin_board: None,
            store: StoreConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load from a TOML file (or start from defaults), then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(port) = env_parse("PORT") {
            self.port = port;
        }
        if let Ok(federates) = std::env::var("SB_FEDERATES") {
            self.federates = federates
                .split(',')
                .map(str::trim)
                .filter(|peer| !peer.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(fqdn) = std::env::var("SB_FQDN") {
            self.fqdn = Some(fqdn);
        }
        if let Some(wait) = env_parse("SB_PROPAGATE_WAIT_SECS") {
            self.propagate_wait_secs = wait;
        }
        if let Ok(admin_board) = std::env::var("SB_ADMIN_BOARD") {
            self.admin_board = Some(admin_board);
        }
    }

    /// The hostname to broadcast in outbound `Via` headers.
    pub fn fqdn(&self) -> String {
        if let Some(fqdn) = &self.fqdn {
            return fqdn.clone();
        }
        std::env::var("HOSTNAME")
            .ok()
            .filter(|hostname| !hostname.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.parse().ok()
}
