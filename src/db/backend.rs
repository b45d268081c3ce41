use std::time::Duration;

use async_trait::async_trait;

use super::{Platform, QueryOption};
use crate::error::Result;
use crate::statement::StatementBuilder;

/// Capabilities both backend variants provide to the runner.
///
/// Every call is one round trip that completes before the next is issued.
/// Any error the backend reports comes back as
/// [`Error::BackendExecution`](crate::Error::BackendExecution); calls made
/// after [`SqlBackend::close`] fail with
/// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed).
#[async_trait]
pub trait SqlBackend: Send + Sync {
    fn platform(&self) -> Platform;

    /// Pause inserted between heavyweight statements.
    fn settle_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Run a statement for its side effect (DROP, CREATE DATABASE, SET).
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Run a query returning a single integer in the first column of the first row.
    async fn execute_for_row_count(&self, sql: &str) -> Result<u64>;

    /// Materialize the rows of `sql` into `target_table` (database-qualified).
    async fn execute_and_persist(&self, sql: &str, target_table: &str) -> Result<()>;

    /// Remove `table` (database-qualified) and whatever storage backs it.
    async fn drop_table(&self, table: &str) -> Result<()> {
        let statement = StatementBuilder::new(self.platform()).drop_table(table);
        self.execute(statement.as_str()).await
    }

    async fn create_database_if_absent(&self, name: &str) -> Result<()>;

    async fn set_option(&self, option: &QueryOption, value: &str) -> Result<()>;

    /// Release the connection. Later calls report `ConnectionClosed`.
    async fn close(&mut self) -> Result<()>;
}
