use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_QUEUE_MAX_DEPTH: usize = 10;

/// Configuration loaded from a TOML file with `BRC20_*` environment
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
  #[serde(default)]
  pub bitcoin_rpc: BitcoinRpcConfig,
  #[serde(default)]
  pub database: DatabaseConfig,
  #[serde(default = "default_working_dir")]
  pub working_dir: PathBuf,
  #[serde(default = "default_queue_max_depth")]
  pub queue_max_depth: usize,
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Hand-off values for the external block source process; the core
/// never dials bitcoind itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoinRpcConfig {
  pub url: String,
  pub username: String,
  pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
  pub path: PathBuf,
}

impl Default for BitcoinRpcConfig {
  fn default() -> Self {
    Self {
      url: "http://localhost:8332".to_string(),
      username: "bitcoin".to_string(),
      password: "password".to_string(),
    }
  }
}

impl Default for DatabaseConfig {
  fn default() -> Self {
    Self {
      path: PathBuf::from("brc20.db"),
    }
  }
}

impl Default for IndexConfig {
  fn default() -> Self {
    Self {
      bitcoin_rpc: BitcoinRpcConfig::default(),
      database: DatabaseConfig::default(),
      working_dir: default_working_dir(),
      queue_max_depth: default_queue_max_depth(),
      log_level: default_log_level(),
    }
  }
}

fn default_working_dir() -> PathBuf {
  PathBuf::from(".")
}

fn default_queue_max_depth() -> usize {
  DEFAULT_QUEUE_MAX_DEPTH
}

fn default_log_level() -> String {
  "info".to_string()
}

impl IndexConfig {
  pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
      builder = builder.add_source(File::from(path));
    }
    builder
      .add_source(Environment::with_prefix("BRC20").separator("__"))
      .build()?
      .try_deserialize()
  }
}
