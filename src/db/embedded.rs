use std::path::{Path, PathBuf};

use async_trait::async_trait;
use datafusion::arrow::array::{Array, Int64Array, UInt64Array};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::prelude::{CsvReadOptions, ParquetReadOptions, SessionConfig, SessionContext};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{Platform, QueryOption, SqlBackend};
use crate::error::{Error, Result};
use crate::statement::StatementBuilder;

pub const DEFAULT_APPLICATION_NAME: &str = "sempala-runner";

/// Directory, relative to the working directory, holding persisted tables.
pub const DEFAULT_WAREHOUSE_DIR: &str = "sempala-warehouse";

const RESULT_FILE: &str = "part-0.parquet";

const DEFAULT_CATALOG: &str = "datafusion";

#[derive(Debug, Clone)]
pub struct EmbeddedConfig {
    pub application_name: String,
    pub database: String,
    /// Number of partitions queries are split into; the engine default when unset.
    pub partitions: Option<usize>,
    /// Files registered as tables of `database` at startup.
    pub tables: Vec<TableSource>,
    /// Persisted tables live in `<warehouse>/<database>/<table>/` as parquet
    /// and are registered again on the next connect.
    pub warehouse: PathBuf,
}

impl EmbeddedConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            database: database.into(),
            partitions: None,
            tables: Vec::new(),
            warehouse: PathBuf::from(DEFAULT_WAREHOUSE_DIR),
        }
    }

    /// Directory holding the files of `table`, qualified or not.
    pub fn table_dir(&self, table: &str) -> PathBuf {
        let (database, name) = table
            .split_once('.')
            .unwrap_or((self.database.as_str(), table));
        self.warehouse.join(database).join(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableSource {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub format: SourceFormat,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    Parquet,
    Csv,
}

/// In-process distributed SQL context.
///
/// Queries become DataFrames. Persisting streams the result into a parquet
/// file under the warehouse and registers a table reading it, so results
/// outlive the process. There is no remote coordinator, so no settle delay
/// applies.
pub struct EmbeddedBackend {
    config: EmbeddedConfig,
    // `None` once closed; the lock only guards against use after close.
    ctx: RwLock<Option<SessionContext>>,
    statements: StatementBuilder,
}

impl EmbeddedBackend {
    pub async fn connect(config: EmbeddedConfig) -> Result<Self> {
        info!(
            "Starting embedded engine '{}' on database '{}'",
            config.application_name, config.database
        );
        let target = format!("embedded engine '{}'", config.application_name);

        let mut session = SessionConfig::new()
            .with_create_default_catalog_and_schema(true)
            .with_default_catalog_and_schema(DEFAULT_CATALOG, &config.database)
            .with_information_schema(true);
        if let Some(partitions) = config.partitions {
            if partitions == 0 {
                return Err(Error::Configuration(
                    "partition count must be a positive integer".to_string(),
                ));
            }
            session = session.with_target_partitions(partitions);
        }
        let ctx = SessionContext::new_with_config(session);

        for source in &config.tables {
            let registered = match source.format {
                SourceFormat::Parquet => {
                    ctx.register_parquet(source.name.as_str(), &source.path, ParquetReadOptions::default())
                        .await
                }
                SourceFormat::Csv => {
                    ctx.register_csv(source.name.as_str(), &source.path, CsvReadOptions::new())
                        .await
                }
            };
            registered.map_err(|e| Error::connection(&target, e))?;
            debug!("Registered table '{}' from {}", source.name, source.path);
        }

        register_warehouse(&ctx, &config.warehouse)
            .await
            .map_err(|e| Error::connection(&target, e))?;

        Ok(Self {
            config,
            ctx: RwLock::new(Some(ctx)),
            statements: StatementBuilder::new(Platform::Embedded),
        })
    }

    pub fn config(&self) -> &EmbeddedConfig {
        &self.config
    }

    async fn context(&self) -> Result<SessionContext> {
        self.ctx
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(Error::ConnectionClosed)
    }

    async fn collect(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        let ctx = self.context().await?;
        let df = ctx.sql(sql).await.map_err(|e| Error::backend(sql, e))?;
        df.collect().await.map_err(|e| Error::backend(sql, e))
    }

    /// Whether `table` (optionally database-qualified) is registered.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let ctx = self.context().await?;
        ctx.table_exist(table).map_err(|e| Error::backend(table, e))
    }
}

#[async_trait]
impl SqlBackend for EmbeddedBackend {
    fn platform(&self) -> Platform {
        Platform::Embedded
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        debug!(sql, "execute");
        self.collect(sql).await.map(|_| ())
    }

    async fn execute_for_row_count(&self, sql: &str) -> Result<u64> {
        debug!(sql, "execute_for_row_count");
        let batches = self.collect(sql).await?;
        first_integer(&batches).ok_or_else(|| Error::backend(sql, "query returned no row count"))
    }

    async fn execute_and_persist(&self, sql: &str, target_table: &str) -> Result<()> {
        let query = self.statements.shape_query(sql);
        debug!(sql = query.as_str(), target_table, "execute_and_persist");

        let ctx = self.context().await?;
        let df = ctx
            .sql(&query)
            .await
            .map_err(|e| Error::backend(query.as_str(), e))?;

        let dir = self.config.table_dir(target_table);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::backend(query.as_str(), e))?;
        let file = dir.join(RESULT_FILE);
        df.write_parquet(
            &file.to_string_lossy(),
            DataFrameWriteOptions::new().with_single_file_output(true),
            None,
        )
        .await
        .map_err(|e| Error::backend(query.as_str(), e))?;

        ctx.register_parquet(target_table, &dir_url(&dir), ParquetReadOptions::default())
            .await
            .map_err(|e| Error::backend(query.as_str(), e))?;
        debug!("Persisted {} to {}", target_table, dir.display());
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        let statement = self.statements.drop_table(table);
        self.execute(statement.as_str()).await?;

        let dir = self.config.table_dir(table);
        if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| Error::backend(statement.as_str(), e))?;
        }
        Ok(())
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
        let ctx = self.ctx.write().await.take().ok_or(Error::ConnectionClosed)?;
        for source in &self.config.tables {
            ctx.deregister_table(source.name.as_str())
                .map_err(|e| Error::backend(&source.name, e))?;
        }
        info!(
            "Stopped embedded engine '{}'",
            self.config.application_name
        );
        Ok(())
    }
}

/// Register every `<warehouse>/<database>/<table>/` left by earlier runs.
async fn register_warehouse(
    ctx: &SessionContext,
    warehouse: &Path,
) -> std::result::Result<(), crate::error::BoxError> {
    if !tokio::fs::try_exists(warehouse).await? {
        return Ok(());
    }
    let mut databases = tokio::fs::read_dir(warehouse).await?;
    while let Some(database) = databases.next_entry().await? {
        if !database.file_type().await?.is_dir() {
            continue;
        }
        let db_name = database.file_name().to_string_lossy().into_owned();
        ctx.sql(&format!("CREATE SCHEMA IF NOT EXISTS {}", db_name))
            .await?;

        let mut tables = tokio::fs::read_dir(database.path()).await?;
        while let Some(table) = tables.next_entry().await? {
            if !table.file_type().await?.is_dir() || !table.path().join(RESULT_FILE).exists() {
                continue;
            }
            let name = format!("{}.{}", db_name, table.file_name().to_string_lossy());
            ctx.register_parquet(name.as_str(), &dir_url(&table.path()), ParquetReadOptions::default())
                .await?;
            debug!("Registered persisted table '{}'", name);
        }
    }
    Ok(())
}

// A trailing separator makes the listing treat the path as a directory.
fn dir_url(dir: &Path) -> String {
    format!("{}/", dir.to_string_lossy().trim_end_matches('/'))
}

fn first_integer(batches: &[RecordBatch]) -> Option<u64> {
    let batch = batches.iter().find(|b| b.num_rows() > 0)?;
    let column = batch.column(0);
    if column.is_null(0) {
        return None;
    }
    if let Some(values) = column.as_any().downcast_ref::<Int64Array>() {
        return u64::try_from(values.value(0)).ok();
    }
    column
        .as_any()
        .downcast_ref::<UInt64Array>()
        .map(|values| values.value(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS: &str = "sempala_results";

    fn config_in(warehouse: &tempfile::TempDir) -> EmbeddedConfig {
        let mut config = EmbeddedConfig::new("rdf");
        config.partitions = Some(2);
        config.warehouse = warehouse.path().to_path_buf();
        config
    }

    async fn backend(warehouse: &tempfile::TempDir) -> EmbeddedBackend {
        let backend = EmbeddedBackend::connect(config_in(warehouse)).await.unwrap();
        backend.create_database_if_absent(RESULTS).await.unwrap();
        backend
    }

    #[tokio::test]
    async fn test_create_database_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir).await;
        backend.create_database_if_absent(RESULTS).await.unwrap();
        backend.create_database_if_absent(RESULTS).await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_partitions_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        config.partitions = Some(0);
        assert!(matches!(
            EmbeddedBackend::connect(config).await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_count_query() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir).await;
        let count = backend
            .execute_for_row_count(
                "SELECT COUNT(*) FROM (SELECT 1 AS a UNION ALL SELECT 2 AS a) tabletemp",
            )
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_persist_count_and_drop() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir).await;
        let table = "sempala_results.q1_sparql_1";

        backend
            .execute_and_persist(
                "(SELECT 1 AS s UNION ALL SELECT 2 AS s UNION ALL SELECT 3 AS s)",
                table,
            )
            .await
            .unwrap();
        assert!(backend.table_exists(table).await.unwrap());

        let count = backend
            .execute_for_row_count(&format!("SELECT COUNT(*) FROM {}", table))
            .await
            .unwrap();
        assert_eq!(count, 3);

        let files = dir.path().join("sempala_results").join("q1_sparql_1");
        assert!(files.join(RESULT_FILE).exists());

        backend.drop_table(table).await.unwrap();
        assert!(!backend.table_exists(table).await.unwrap());
        assert!(!files.exists());
    }

    #[tokio::test]
    async fn test_persisted_table_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let table = "sempala_results.q1_sparql_1";

        let mut first = backend(&dir).await;
        first
            .execute_and_persist("(SELECT 1 AS s UNION ALL SELECT 2 AS s)", table)
            .await
            .unwrap();
        first.close().await.unwrap();

        let second = EmbeddedBackend::connect(config_in(&dir)).await.unwrap();
        assert!(second.table_exists(table).await.unwrap());
        let count = second
            .execute_for_row_count(&format!("SELECT COUNT(*) FROM {}", table))
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_table_dir() {
        let mut config = EmbeddedConfig::new("rdf");
        config.warehouse = PathBuf::from("/wh");
        assert_eq!(
            config.table_dir("sempala_results.q1"),
            PathBuf::from("/wh/sempala_results/q1")
        );
        assert_eq!(config.table_dir("t"), PathBuf::from("/wh/rdf/t"));
    }

    #[tokio::test]
    async fn test_backend_errors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir).await;
        let err = backend
            .execute_for_row_count("SELECT COUNT(*) FROM missing_table")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BackendExecution { .. }));
    }

    #[tokio::test]
    async fn test_use_after_close() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = backend(&dir).await;
        backend.close().await.unwrap();
        assert!(matches!(
            backend.execute("SELECT 1").await,
            Err(Error::ConnectionClosed)
        ));
        assert!(matches!(backend.close().await, Err(Error::ConnectionClosed)));
    }
}
