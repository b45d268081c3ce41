use std::time::Duration;

use async_trait::async_trait;
use postgres_native_tls::MakeTlsConnector;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, info, warn};

use super::{Platform, QueryOption, SqlBackend};
use crate::error::{Error, Result};
use crate::statement::StatementBuilder;

pub const DEFAULT_PORT: u16 = 21050;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 3000;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: String,
    pub ssl_mode: SslMode,
    /// Accept invalid/self-signed certificates.
    pub accept_invalid_certs: bool,
    /// Optional path to a CA certificate file (PEM format).
    pub ca_cert_path: Option<String>,
    /// Pause between heavyweight statements, giving the coordinator time to
    /// settle. Changing it changes measured benchmark numbers.
    pub settle_delay_ms: u64,
}

/// TLS modes, matching libpq's `sslmode` names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    #[default]
    Disable,
    Prefer,
    Require,
}

impl NetworkConfig {
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            username: None,
            password: String::new(),
            ssl_mode: SslMode::default(),
            accept_invalid_certs: false,
            ca_cert_path: None,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }

    pub fn connection_string(&self) -> String {
        let sslmode = match self.ssl_mode {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
        };
        let mut conn = format!(
            "host={} port={} dbname={} sslmode={}",
            quote_conn_value(&self.host),
            self.port,
            quote_conn_value(&self.database),
            sslmode
        );
        if let Some(user) = &self.username {
            conn.push_str(&format!(" user={}", quote_conn_value(user)));
            if !self.password.is_empty() {
                conn.push_str(&format!(" password={}", quote_conn_value(&self.password)));
            }
        }
        conn
    }

    pub fn display_string(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

/// Connection to the MPP engine over the PostgreSQL wire protocol.
///
/// Statements go through the simple query protocol, one blocking round trip
/// each, so DDL and `SET` are accepted verbatim.
pub struct NetworkBackend {
    config: NetworkConfig,
    client: Option<Client>,
    connection_task: Option<JoinHandle<()>>,
    statements: StatementBuilder,
}

impl NetworkBackend {
    pub async fn connect(config: NetworkConfig) -> Result<Self> {
        info!("Connecting to {}", config.display_string());
        let target = config.display_string();
        let conn_string = config.connection_string();

        let (client, connection_task) = match config.ssl_mode {
            SslMode::Disable => {
                let (client, connection) =
                    tokio::time::timeout(CONNECT_TIMEOUT, tokio_postgres::connect(&conn_string, NoTls))
                        .await
                        .map_err(|_| Error::connection(&target, "connection timed out after 15s"))?
                        .map_err(|e| Error::connection(&target, e))?;
                let task = tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        warn!("Connection error: {}", e);
                    }
                });
                (client, task)
            }
            SslMode::Prefer | SslMode::Require => {
                let tls = build_tls_connector(&config).map_err(|e| Error::connection(&target, e))?;
                let (client, connection) =
                    tokio::time::timeout(CONNECT_TIMEOUT, tokio_postgres::connect(&conn_string, tls))
                        .await
                        .map_err(|_| Error::connection(&target, "connection timed out after 15s"))?
                        .map_err(|e| Error::connection(&target, e))?;
                let task = tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        warn!("Connection error: {}", e);
                    }
                });
                (client, task)
            }
        };

        Ok(Self {
            config,
            client: Some(client),
            connection_task: Some(connection_task),
            statements: StatementBuilder::new(Platform::Network),
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or(Error::ConnectionClosed)
    }
}

#[async_trait]
impl SqlBackend for NetworkBackend {
    fn platform(&self) -> Platform {
        Platform::Network
    }

    fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.config.settle_delay_ms)
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        debug!(sql, "execute");
        self.client()?
            .batch_execute(sql)
            .await
            .map_err(|e| Error::backend(sql, e))
    }

    async fn execute_for_row_count(&self, sql: &str) -> Result<u64> {
        debug!(sql, "execute_for_row_count");
        let messages = self
            .client()?
            .simple_query(sql)
            .await
            .map_err(|e| Error::backend(sql, e))?;
        first_integer(&messages).ok_or_else(|| Error::backend(sql, "query returned no row count"))
    }

    async fn execute_and_persist(&self, sql: &str, target_table: &str) -> Result<()> {
        let statement = self
            .statements
            .create_table(target_table)
            .as_select(sql)
            .build()?;
        self.execute(statement.as_str()).await
    }

    async fn create_database_if_absent(&self, name: &str) -> Result<()> {
        let statement = self.statements.create_database(name);
        self.execute(statement.as_str()).await
    }

    async fn set_option(&self, option: &QueryOption, value: &str) -> Result<()> {
        info!("Setting query option '{}' to '{}'", option, value);
        let statement = self.statements.set(option, value);
        self.execute(statement.as_str()).await
    }

    async fn close(&mut self) -> Result<()> {
        let client = self.client.take().ok_or(Error::ConnectionClosed)?;
        drop(client);
        if let Some(task) = self.connection_task.take() {
            if let Err(e) = task.await {
                warn!("Connection task ended abnormally: {}", e);
            }
        }
        info!("Closed connection to {}", self.config.display_string());
        Ok(())
    }
}

fn first_integer(messages: &[SimpleQueryMessage]) -> Option<u64> {
    messages.iter().find_map(|message| match message {
        SimpleQueryMessage::Row(row) => row.get(0).and_then(|v| v.trim().parse().ok()),
        _ => None,
    })
}

fn build_tls_connector(config: &NetworkConfig) -> anyhow::Result<MakeTlsConnector> {
    use anyhow::Context;

    let mut builder = native_tls::TlsConnector::builder();
    if config.accept_invalid_certs {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    } else if let Some(ca_path) = &config.ca_cert_path {
        let pem = std::fs::read(ca_path)
            .with_context(|| format!("Failed to read CA certificate file: {}", ca_path))?;
        let cert = native_tls::Certificate::from_pem(&pem)
            .context("Failed to parse CA certificate")?;
        builder.add_root_certificate(cert);
    }
    let connector = builder.build().context("Failed to build TLS connector")?;
    Ok(MakeTlsConnector::new(connector))
}

/// Quote a value for use in a libpq key=value connection string.
fn quote_conn_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_string_without_user() {
        let config = NetworkConfig::new("impalad-1", DEFAULT_PORT, "rdf");
        assert_eq!(
            config.connection_string(),
            "host='impalad-1' port=21050 dbname='rdf' sslmode=disable"
        );
    }

    #[test]
    fn test_connection_string_with_credentials() {
        let mut config = NetworkConfig::new("h", 5433, "db");
        config.username = Some("bench".to_string());
        config.password = "it's".to_string();
        config.ssl_mode = SslMode::Require;
        let conn = config.connection_string();
        assert!(conn.contains("sslmode=require"));
        assert!(conn.contains("user='bench'"));
        assert!(conn.contains("password='it\\'s'"));
    }

    #[test]
    fn test_display_string() {
        let config = NetworkConfig::new("h", 21050, "db");
        assert_eq!(config.display_string(), "h:21050/db");
    }

    #[test]
    fn test_new_uses_defaults() {
        let config = NetworkConfig::new("h", DEFAULT_PORT, "rdf");
        assert_eq!(config.settle_delay_ms, DEFAULT_SETTLE_DELAY_MS);
        assert_eq!(config.ssl_mode, SslMode::Disable);
        assert!(config.username.is_none());
    }

    #[test]
    fn test_quote_conn_value() {
        assert_eq!(quote_conn_value("simple"), "'simple'");
        assert_eq!(quote_conn_value("a'b"), "'a\\'b'");
        assert_eq!(quote_conn_value("a\\b"), "'a\\\\b'");
    }

    #[test]
    fn test_first_integer_ignores_command_complete() {
        let messages = vec![SimpleQueryMessage::CommandComplete(0)];
        assert_eq!(first_integer(&messages), None);
    }
}
