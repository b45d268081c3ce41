//! Run configuration: an optional TOML file merged with command line values.
//!
//! ```toml
//! [network]
//! host = "impalad-1"
//! database = "rdf"
//! settle_delay_ms = 3000
//!
//! [embedded]
//! database = "rdf"
//! partitions = 8
//! warehouse = "/data/sempala-warehouse"
//! [[embedded.tables]]
//! name = "bigtable_parquet"
//! path = "/data/bigtable"
//!
//! [run]
//! ledger = "TableOfResults.txt"
//!
//! [options]
//! MEM_LIMIT = "8g"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::{
    BackendConfig, EmbeddedConfig, NetworkConfig, QueryOption, SslMode, TableSource,
    DEFAULT_APPLICATION_NAME, DEFAULT_PORT, DEFAULT_SETTLE_DELAY_MS, DEFAULT_WAREHOUSE_DIR,
};
use crate::error::{Error, Result};
use crate::ledger::DEFAULT_LEDGER_FILE;
use crate::naming::OutputFormat;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub network: NetworkSection,
    pub embedded: EmbeddedSection,
    pub run: RunSection,
    /// Query options applied with `SET` right after connecting.
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub ssl_mode: SslMode,
    pub accept_invalid_certs: bool,
    pub ca_cert_path: Option<String>,
    pub settle_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedSection {
    pub application_name: Option<String>,
    pub database: Option<String>,
    pub partitions: Option<usize>,
    pub warehouse: Option<PathBuf>,
    pub tables: Vec<TableSource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub ledger: Option<PathBuf>,
}

/// Connection values given on the command line; they win over the file.
#[derive(Debug, Clone, Default)]
pub struct ConnectionArgs {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub partitions: Option<usize>,
    pub warehouse: Option<PathBuf>,
    pub settle_delay_ms: Option<u64>,
}

impl FileConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sempala-runner")
            .join("config.toml")
    }

    /// Load `path`, or the default location when no path is given. A missing
    /// default file yields an empty configuration; a missing explicit one is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };
        if !path.exists() {
            if explicit {
                return Err(Error::Configuration(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn ledger_path(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.run.ledger.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_FILE))
    }

    /// File options followed by command line `KEY=VALUE` pairs, later
    /// entries for the same key replacing earlier ones.
    pub fn query_options(&self, cli: &[(QueryOption, String)]) -> Vec<(QueryOption, String)> {
        let mut merged: Vec<(QueryOption, String)> = Vec::new();
        let file = self.options.iter().map(|(key, value)| {
            let option: QueryOption = key.parse().unwrap_or_else(|e| match e {});
            (option, value.clone())
        });
        for (option, value) in file.chain(cli.iter().cloned()) {
            match merged.iter_mut().find(|(existing, _)| *existing == option) {
                Some(entry) => entry.1 = value,
                None => merged.push((option, value)),
            }
        }
        merged
    }
}

/// Decide which backend the run uses.
///
/// The complex property table layout for the embedded engine selects the
/// embedded backend, which needs a database and takes no host or port.
/// Everything else selects the network backend, which needs both a host and a
/// database once any connection value is given.
pub fn resolve_backend(
    format: OutputFormat,
    args: &ConnectionArgs,
    file: &FileConfig,
) -> Result<BackendConfig> {
    if format.requires_embedded() {
        if args.host.is_some() || args.port.is_some() {
            return Err(Error::Configuration(
                "host and port cannot be used with the embedded engine".to_string(),
            ));
        }
        let section = &file.embedded;
        let database = args
            .database
            .clone()
            .or_else(|| section.database.clone())
            .ok_or_else(|| {
                Error::Configuration(
                    "a database is required when using the embedded engine".to_string(),
                )
            })?;
        let partitions = args.partitions.or(section.partitions);
        if partitions == Some(0) {
            return Err(Error::Configuration(
                "partition count must be a positive integer".to_string(),
            ));
        }
        return Ok(BackendConfig::Embedded(EmbeddedConfig {
            application_name: section
                .application_name
                .clone()
                .unwrap_or_else(|| DEFAULT_APPLICATION_NAME.to_string()),
            database,
            partitions,
            tables: section.tables.clone(),
            warehouse: args
                .warehouse
                .clone()
                .or_else(|| section.warehouse.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WAREHOUSE_DIR)),
        }));
    }

    if args.partitions.is_some() {
        return Err(Error::Configuration(
            "a partition count only applies to the embedded engine".to_string(),
        ));
    }
    if args.warehouse.is_some() {
        return Err(Error::Configuration(
            "a warehouse directory only applies to the embedded engine".to_string(),
        ));
    }

    let section = &file.network;
    let host = args.host.clone().or_else(|| section.host.clone());
    let port = args.port.or(section.port);
    let database = args.database.clone().or_else(|| section.database.clone());

    let (host, database) = match (host, port, database) {
        (None, None, None) => {
            return Err(Error::Configuration(
                "no backend selected: give a host and database".to_string(),
            ))
        }
        (Some(host), _, Some(database)) => (host, database),
        _ => {
            return Err(Error::Configuration(
                "if host, port or database is defined, host and database are required"
                    .to_string(),
            ))
        }
    };

    Ok(BackendConfig::Network(NetworkConfig {
        host,
        port: port.unwrap_or(DEFAULT_PORT),
        database,
        username: args.user.clone().or_else(|| section.username.clone()),
        password: String::new(),
        ssl_mode: section.ssl_mode,
        accept_invalid_certs: section.accept_invalid_certs,
        ca_cert_path: section.ca_cert_path.clone(),
        settle_delay_ms: args
            .settle_delay_ms
            .or(section.settle_delay_ms)
            .unwrap_or(DEFAULT_SETTLE_DELAY_MS),
    }))
}
