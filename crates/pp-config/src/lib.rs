//! Configuration loading for the broker and dispatcher binaries.
//!
//! Configuration is a small TOML key→value file, default name
//! `balancer.cfg`, with exactly one override: a path given on the
//! command line. There is no multi-location discovery chain and no
//! environment variable overlay - the wire-level spec this broker
//! implements names a single file and a single override, and the
//! config loader doesn't grow surface area beyond that.
//!
//! # Example
//!
//! ```toml
//! frontend = "tcp://*:9091"
//! backend = "tcp://*:9092"
//! worker = "tcp://127.0.0.1:9092"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, used when no path is given on the CLI.
pub const DEFAULT_CONFIG_PATH: &str = "balancer.cfg";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Endpoints the broker binds and the dispatcher connects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// Client-facing router bind address, e.g. `tcp://*:9091`.
    pub frontend: String,
    /// Worker-facing router bind address, e.g. `tcp://*:9092`.
    pub backend: String,
    /// Address the query dispatcher connects to; normally equal to
    /// `backend`, kept separate so a worker can run on another host.
    pub worker: String,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            frontend: "tcp://*:9091".to_string(),
            backend: "tcp://*:9092".to_string(),
            worker: "tcp://127.0.0.1:9092".to_string(),
        }
    }
}

impl BalancerConfig {
    /// Load from `path` if given, otherwise from [`DEFAULT_CONFIG_PATH`]
    /// in the current directory. Mirrors the CLI convention of `balancer`
    /// in the original source: one optional path argument, one default.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_file(&path)
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
