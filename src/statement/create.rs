use std::sync::atomic::{AtomicU64, Ordering};

use super::{unwrap_parenthesized, Statement};
use crate::db::Platform;
use crate::error::{Error, Result, StatementKind};

/// On-disk format of a created table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFormat {
    Parquet,
    TextFile,
    Avro,
}

impl StorageFormat {
    fn keyword(&self, platform: Platform) -> &'static str {
        match (self, platform) {
            (StorageFormat::Parquet, _) => "PARQUET",
            (StorageFormat::Avro, _) => "AVRO",
            (StorageFormat::TextFile, Platform::Embedded) => "CSV",
            (StorageFormat::TextFile, _) => "TEXTFILE",
        }
    }
}

static IMPLICIT_TABLE_SEQ: AtomicU64 = AtomicU64::new(0);

fn implicit_table_name() -> String {
    let seq = IMPLICIT_TABLE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!(
        "external_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        seq
    )
}

/// Builder for `CREATE [EXTERNAL] TABLE`.
#[derive(Debug, Clone)]
pub struct CreateStatement {
    platform: Platform,
    name: Option<String>,
    external: bool,
    if_not_exists: bool,
    columns: Vec<(String, String)>,
    partition_columns: Vec<(String, String)>,
    field_delimiter: Option<char>,
    stored_as: Option<StorageFormat>,
    location: Option<String>,
    as_select: Option<String>,
}

impl CreateStatement {
    pub(super) fn new(platform: Platform, name: Option<String>) -> Self {
        Self {
            platform,
            name,
            external: false,
            if_not_exists: false,
            columns: Vec::new(),
            partition_columns: Vec::new(),
            field_delimiter: None,
            stored_as: None,
            location: None,
            as_select: None,
        }
    }

    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn column(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        self.columns.push((name.into(), data_type.into()));
        self
    }

    pub fn partitioned_by(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        self.partition_columns.push((name.into(), data_type.into()));
        self
    }

    pub fn fields_terminated_by(mut self, delimiter: char) -> Self {
        self.field_delimiter = Some(delimiter);
        self
    }

    pub fn stored_as(mut self, format: StorageFormat) -> Self {
        self.stored_as = Some(format);
        self
    }

    pub fn location(mut self, path: impl Into<String>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Create the table from the output of `query` (CTAS).
    pub fn as_select(mut self, query: impl Into<String>) -> Self {
        self.as_select = Some(query.into());
        self
    }

    pub fn build(self) -> Result<Statement> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(Error::malformed(StatementKind::Create, "empty table name"));
        }
        if self.external && self.as_select.is_some() {
            return Err(Error::malformed(
                StatementKind::Create,
                "an external table cannot be created from a query",
            ));
        }
        let embedded = self.platform == Platform::Embedded;
        if embedded && self.external && self.location.is_none() {
            return Err(Error::malformed(
                StatementKind::Create,
                "an external table needs a location on the embedded engine",
            ));
        }

        let name = self.name.unwrap_or_else(implicit_table_name);
        let mut parts = Vec::new();

        let mut create_clause = String::from("CREATE ");
        if self.external {
            create_clause.push_str("EXTERNAL ");
        }
        create_clause.push_str("TABLE ");
        if self.if_not_exists {
            create_clause.push_str("IF NOT EXISTS ");
        }
        create_clause.push_str(name.trim());
        parts.push(create_clause);

        if !self.columns.is_empty() {
            parts.push(format!("({})", column_list(&self.columns)));
        }

        // The embedded engine wants the storage clause before partitioning
        let stored_as = match (self.stored_as, embedded && self.external) {
            (Some(format), _) => Some(format),
            (None, true) => Some(StorageFormat::Parquet),
            (None, false) => None,
        };

        if embedded {
            if let Some(format) = stored_as {
                parts.push(format!("STORED AS {}", format.keyword(self.platform)));
            }
            if !self.partition_columns.is_empty() {
                let names: Vec<&str> = self
                    .partition_columns
                    .iter()
                    .map(|(name, _)| name.as_str())
                    .collect();
                parts.push(format!("PARTITIONED BY ({})", names.join(", ")));
            }
            if let Some(location) = &self.location {
                parts.push(format!("LOCATION '{}'", escape_literal(location)));
            }
            if let Some(delimiter) = self.field_delimiter {
                parts.push(format!(
                    "OPTIONS ('format.delimiter' '{}')",
                    escape_literal(&delimiter.to_string())
                ));
            }
        } else {
            if !self.partition_columns.is_empty() {
                parts.push(format!(
                    "PARTITIONED BY ({})",
                    column_list(&self.partition_columns)
                ));
            }
            if let Some(delimiter) = self.field_delimiter {
                parts.push(format!(
                    "ROW FORMAT DELIMITED FIELDS TERMINATED BY '{}'",
                    escape_literal(&delimiter.to_string())
                ));
            }
            if let Some(format) = stored_as {
                parts.push(format!("STORED AS {}", format.keyword(self.platform)));
            }
            if let Some(location) = &self.location {
                parts.push(format!("LOCATION '{}'", escape_literal(location)));
            }
        }

        if let Some(query) = &self.as_select {
            parts.push(format!("AS {}", unwrap_parenthesized(query)));
        }

        Ok(Statement::new(parts.join(" ")))
    }
}

fn column_list(columns: &[(String, String)]) -> String {
    columns
        .iter()
        .map(|(name, data_type)| format!("{} {}", name, data_type))
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
