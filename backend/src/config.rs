//! Configuration management for the replenishment server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with REPL_ prefix

use std::path::PathBuf;

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::SourceOptions;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Snapshot file locations
    pub snapshots: SnapshotConfig,

    /// Order listing settings
    pub orders: OrdersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key the identity provider signs tokens with
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    /// Active-product catalog export
    pub catalog_path: PathBuf,

    /// Per-store request history export
    pub history_path: PathBuf,

    /// Distribution-center stock export
    pub warehouse_path: PathBuf,

    /// Field delimiter shared by the three exports, a single ASCII character
    pub delimiter: String,
}

impl SnapshotConfig {
    pub fn source_options(&self) -> Result<SourceOptions, ConfigError> {
        match self.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => Ok(SourceOptions { delimiter: *byte }),
            _ => Err(ConfigError::Message(format!(
                "snapshots.delimiter must be a single ASCII character, got `{}`",
                self.delimiter
            ))),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrdersConfig {
    /// Window of the "my recent orders" listing, in days
    pub recent_days: i64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("REPL_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("snapshots.catalog_path", "data/mix.csv")?
            .set_default("snapshots.history_path", "data/historico.csv")?
            .set_default("snapshots.warehouse_path", "data/wms.csv")?
            .set_default("snapshots.delimiter", ";")?
            .set_default("orders.recent_days", 3)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (REPL_ prefix)
            .add_source(
                Environment::with_prefix("REPL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.snapshots.source_options()?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshots(delimiter: &str) -> SnapshotConfig {
        SnapshotConfig {
            catalog_path: "a.csv".into(),
            history_path: "b.csv".into(),
            warehouse_path: "c.csv".into(),
            delimiter: delimiter.to_string(),
        }
    }

    #[test]
    fn test_delimiter_must_be_one_ascii_char() {
        assert_eq!(snapshots(",").source_options().unwrap().delimiter, b',');
        assert_eq!(snapshots("\t").source_options().unwrap().delimiter, b'\t');
        assert!(snapshots("").source_options().is_err());
        assert!(snapshots(";;").source_options().is_err());
        assert!(snapshots("§").source_options().is_err());
    }
}
