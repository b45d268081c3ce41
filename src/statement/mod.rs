//! Backend-aware builders for the SQL statements the runner issues.
//!
//! Every statement sent to a backend is produced here, so dialect quirks
//! (external tables, overwrite syntax, parenthesized sub-selects) live in one
//! place instead of being spliced together at call sites.

mod create;
mod insert;
mod names;
mod select;

pub use create::*;
pub use insert::*;
pub use names::*;
pub use select::*;

use std::fmt;
use std::sync::Arc;

use crate::db::{Platform, QueryOption};

/// A finished SQL statement. Only the text survives a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
}

impl Statement {
    pub(crate) fn new(sql: String) -> Self {
        Self { sql }
    }

    pub fn as_str(&self) -> &str {
        &self.sql
    }

    pub fn into_sql(self) -> String {
        self.sql
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

impl AsRef<str> for Statement {
    fn as_ref(&self) -> &str {
        &self.sql
    }
}

/// Entry point for building statements for one platform.
#[derive(Debug, Clone)]
pub struct StatementBuilder {
    platform: Platform,
    restricted: Arc<RestrictedNames>,
}

impl StatementBuilder {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            restricted: Arc::new(RestrictedNames::default()),
        }
    }

    pub fn with_restricted_names(mut self, names: RestrictedNames) -> Self {
        self.restricted = Arc::new(names);
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn restricted_names(&self) -> &RestrictedNames {
        &self.restricted
    }

    pub fn create_table(&self, name: impl Into<String>) -> CreateStatement {
        CreateStatement::new(self.platform, Some(name.into()))
    }

    /// CREATE builder for an external table with an implicit name, used to
    /// map a table onto data the translator has already laid out.
    pub fn create_external_table(&self) -> CreateStatement {
        CreateStatement::new(self.platform, None).external()
    }

    pub fn insert_into(&self, table: impl Into<String>) -> InsertStatement {
        InsertStatement::new(self.platform, table.into())
    }

    pub fn insert_overwrite(&self, table: impl Into<String>) -> InsertStatement {
        self.insert_into(table).overwrite()
    }

    pub fn select(&self) -> SelectStatement {
        SelectStatement::new(self.platform, Arc::clone(&self.restricted))
    }

    pub fn select_expr(&self, expression: impl Into<String>) -> SelectStatement {
        self.select().column(expression)
    }

    pub fn drop_table(&self, table: &str) -> Statement {
        Statement::new(format!("DROP TABLE IF EXISTS {}", table))
    }

    /// Refresh table and column statistics. Only the network engine accepts it.
    pub fn compute_stats(&self, table: &str) -> Statement {
        Statement::new(format!("COMPUTE STATS {}", table))
    }

    pub fn create_database(&self, name: &str) -> Statement {
        let keyword = match self.platform {
            Platform::Embedded => "SCHEMA",
            Platform::Network | Platform::None => "DATABASE",
        };
        Statement::new(format!("CREATE {} IF NOT EXISTS {}", keyword, name))
    }

    pub fn set(&self, option: &QueryOption, value: &str) -> Statement {
        Statement::new(format!("SET {}={}", option.name(), value))
    }

    /// `SELECT COUNT(*)` over an arbitrary query, wrapped as a sub-select.
    pub fn count_rows(&self, sql: &str) -> Statement {
        Statement::new(format!(
            "SELECT COUNT(*) FROM ({}) tabletemp",
            unwrap_parenthesized(sql)
        ))
    }

    pub fn count_table(&self, table: &str) -> Statement {
        Statement::new(format!("SELECT COUNT(*) FROM {}", table))
    }

    /// Shape a translated query for top-level execution on this platform.
    ///
    /// The embedded engine's parser rejects a query wrapped in a parenthesis
    /// pair, which the network engine accepts.
    pub fn shape_query(&self, sql: &str) -> String {
        match self.platform {
            Platform::Embedded => unwrap_parenthesized(sql).to_string(),
            Platform::Network | Platform::None => sql.trim().to_string(),
        }
    }

    pub fn qualify(database: &str, table: &str) -> String {
        format!("{}.{}", database, table)
    }
}

/// Strip one parenthesis pair surrounding the whole of `sql`, if present.
pub fn unwrap_parenthesized(sql: &str) -> &str {
    let trimmed = sql.trim();
    if !(trimmed.starts_with('(') && trimmed.ends_with(')')) {
        return trimmed;
    }

    let mut depth = 0usize;
    // String literals and quoted identifiers: '...', "..." and `...`
    let mut quote: Option<char> = None;
    for (i, ch) in trimmed.char_indices() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != trimmed.len() - 1 {
                    // The opening parenthesis closes before the end: `(a) UNION (b)`
                    return trimmed;
                }
            }
            _ => {}
        }
    }

    trimmed[1..trimmed.len() - 1].trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_parenthesized() {
        assert_eq!(unwrap_parenthesized("(SELECT 1)"), "SELECT 1");
        assert_eq!(unwrap_parenthesized("  ( SELECT a FROM t )  "), "SELECT a FROM t");
        assert_eq!(unwrap_parenthesized("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_unwrap_only_one_pair() {
        assert_eq!(unwrap_parenthesized("((SELECT 1))"), "(SELECT 1)");
    }

    #[test]
    fn test_unwrap_keeps_unbalanced_outer_pair() {
        let sql = "(SELECT a FROM t) UNION (SELECT a FROM u)";
        assert_eq!(unwrap_parenthesized(sql), sql);
    }

    #[test]
    fn test_unwrap_ignores_parens_in_literals() {
        let sql = "(SELECT ')' AS x)";
        assert_eq!(unwrap_parenthesized(sql), "SELECT ')' AS x");
    }

    #[test]
    fn test_unwrap_ignores_parens_in_quoted_identifiers() {
        let sql = r#"(SELECT a AS "x)" FROM t)"#;
        assert_eq!(unwrap_parenthesized(sql), r#"SELECT a AS "x)" FROM t"#);
        let sql = "(SELECT `b)` FROM t)";
        assert_eq!(unwrap_parenthesized(sql), "SELECT `b)` FROM t");
        let sql = r#"(SELECT "(" AS a) UNION (SELECT ')' AS a)"#;
        assert_eq!(unwrap_parenthesized(sql), sql);
    }

    #[test]
    fn test_compute_stats() {
        let builder = StatementBuilder::new(Platform::Network);
        assert_eq!(
            builder.compute_stats("rdf.bigtable_parquet").as_str(),
            "COMPUTE STATS rdf.bigtable_parquet"
        );
    }

    #[test]
    fn test_shape_query_per_platform() {
        let sql = "(SELECT s FROM bigtable_parquet)";
        let network = StatementBuilder::new(Platform::Network);
        let embedded = StatementBuilder::new(Platform::Embedded);
        assert_eq!(network.shape_query(sql), sql);
        assert_eq!(embedded.shape_query(sql), "SELECT s FROM bigtable_parquet");
    }

    #[test]
    fn test_count_rows_wraps_once() {
        let builder = StatementBuilder::new(Platform::Network);
        let stmt = builder.count_rows("(SELECT s FROM t)");
        assert_eq!(
            stmt.as_str(),
            "SELECT COUNT(*) FROM (SELECT s FROM t) tabletemp"
        );
    }

    #[test]
    fn test_create_database_dialects() {
        assert_eq!(
            StatementBuilder::new(Platform::Network)
                .create_database("sempala_results")
                .as_str(),
            "CREATE DATABASE IF NOT EXISTS sempala_results"
        );
        assert_eq!(
            StatementBuilder::new(Platform::Embedded)
                .create_database("sempala_results")
                .as_str(),
            "CREATE SCHEMA IF NOT EXISTS sempala_results"
        );
    }

    #[test]
    fn test_set_statement() {
        let builder = StatementBuilder::new(Platform::Network);
        let stmt = builder.set(&QueryOption::MemLimit, "2g");
        assert_eq!(stmt.as_str(), "SET MEM_LIMIT=2g");
        let custom = builder.set(&QueryOption::Custom("RUNTIME_FILTER_MODE".into()), "GLOBAL");
        assert_eq!(custom.as_str(), "SET RUNTIME_FILTER_MODE=GLOBAL");
    }

    #[test]
    fn test_drop_and_count_table() {
        let builder = StatementBuilder::new(Platform::Embedded);
        let table = StatementBuilder::qualify("sempala_results", "q1_sparql_1");
        assert_eq!(
            builder.drop_table(&table).as_str(),
            "DROP TABLE IF EXISTS sempala_results.q1_sparql_1"
        );
        assert_eq!(
            builder.count_table(&table).as_str(),
            "SELECT COUNT(*) FROM sempala_results.q1_sparql_1"
        );
    }
}
