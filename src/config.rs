//! Configuration loading and data folder resolution
//!
//! Resolution priority for every path-like setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`ORDERMETRICS_*`)
//! 3. TOML config file
//! 4. Compiled default under the data directory

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable names
const ENV_DATABASE: &str = "ORDERMETRICS_DATABASE";
const ENV_DATA_DIR: &str = "ORDERMETRICS_DATA_DIR";

/// Raw TOML shape; every key optional so a partial file is fine.
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    database: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    customers_csv: Option<PathBuf>,
    orders_xml: Option<PathBuf>,
    pool: Option<PoolConfig>,
}

/// Connection pool bounds
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Recycle connections older than this many seconds
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_min_connections() -> u32 {
    1
}
fn default_max_lifetime_secs() -> u64 {
    3600
}
fn default_acquire_timeout_secs() -> u64 {
    30
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            max_lifetime_secs: default_max_lifetime_secs(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

/// Resolved application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database: PathBuf,
    pub data_dir: PathBuf,
    pub customers_csv: PathBuf,
    pub orders_xml: PathBuf,
    pub pool: PoolConfig,
}

impl Config {
    /// Load configuration, applying the resolution priority order.
    ///
    /// `config_file` and `database_arg` come from the CLI; both optional.
    pub fn load(config_file: Option<&Path>, database_arg: Option<&Path>) -> Result<Self> {
        let toml_config = match config_file {
            Some(path) => read_toml(path)?,
            None => TomlConfig::default(),
        };

        let data_dir = env_path(ENV_DATA_DIR)
            .or(toml_config.data_dir)
            .unwrap_or_else(|| PathBuf::from("data"));

        let database = database_arg
            .map(Path::to_path_buf)
            .or_else(|| env_path(ENV_DATABASE))
            .or(toml_config.database)
            .unwrap_or_else(|| data_dir.join("ordermetrics.db"));

        let customers_csv = toml_config
            .customers_csv
            .unwrap_or_else(|| data_dir.join("raw").join("customers.csv"));
        let orders_xml = toml_config
            .orders_xml
            .unwrap_or_else(|| data_dir.join("raw").join("orders.xml"));

        Ok(Self {
            database,
            data_dir,
            customers_csv,
            orders_xml,
            pool: toml_config.pool.unwrap_or_default(),
        })
    }

    /// Create the data directories if they don't exist
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(self.data_dir.join("raw"))?;
        if let Some(parent) = self.database.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().map(PathBuf::from)
}

fn read_toml(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let parsed = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("invalid TOML in {}: {}", path.display(), e)))?;
    info!("Loaded configuration from {}", path.display());
    Ok(parsed)
}
