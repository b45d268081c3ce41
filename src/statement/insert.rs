use super::{unwrap_parenthesized, Statement};
use crate::db::Platform;
use crate::error::{Error, Result, StatementKind};

/// Builder for `INSERT INTO` / `INSERT OVERWRITE`.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    platform: Platform,
    table: String,
    overwrite: bool,
    columns: Vec<String>,
    partition: Vec<(String, Option<String>)>,
    source: Option<String>,
}

impl InsertStatement {
    pub(super) fn new(platform: Platform, table: String) -> Self {
        Self {
            platform,
            table,
            overwrite: false,
            columns: Vec::new(),
            partition: Vec::new(),
            source: None,
        }
    }

    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(name.into());
        self
    }

    /// Static (`key=value`) partition key. Only the network engine supports it.
    pub fn partition(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.partition.push((key.into(), Some(value.into())));
        self
    }

    /// Dynamic partition key, filled from the trailing source columns.
    pub fn dynamic_partition(mut self, key: impl Into<String>) -> Self {
        self.partition.push((key.into(), None));
        self
    }

    /// The query whose rows are inserted.
    pub fn select(mut self, query: impl Into<String>) -> Self {
        self.source = Some(query.into());
        self
    }

    pub fn build(self) -> Result<Statement> {
        let table = self.table.trim();
        if table.is_empty() {
            return Err(Error::malformed(StatementKind::Insert, "missing table name"));
        }
        let source = match &self.source {
            Some(query) if !query.trim().is_empty() => unwrap_parenthesized(query),
            _ => {
                return Err(Error::malformed(
                    StatementKind::Insert,
                    "missing source query",
                ))
            }
        };

        let mut parts = Vec::new();
        let verb = if self.overwrite { "OVERWRITE" } else { "INTO" };
        match self.platform {
            Platform::Embedded => parts.push(format!("INSERT {} {}", verb, table)),
            Platform::Network | Platform::None => {
                parts.push(format!("INSERT {} TABLE {}", verb, table))
            }
        }

        if !self.columns.is_empty() {
            parts.push(format!("({})", self.columns.join(", ")));
        }

        if !self.partition.is_empty() {
            if self.platform == Platform::Embedded {
                return Err(Error::malformed(
                    StatementKind::Insert,
                    "partition clauses are not supported by the embedded engine",
                ));
            }
            let keys: Vec<String> = self
                .partition
                .iter()
                .map(|(key, value)| match value {
                    Some(v) => format!("{}={}", key, v),
                    None => key.clone(),
                })
                .collect();
            parts.push(format!("PARTITION ({})", keys.join(", ")));
        }

        parts.push(source.to_string());
        Ok(Statement::new(parts.join(" ")))
    }
}
