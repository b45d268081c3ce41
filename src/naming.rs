use std::fmt;

use serde::{Deserialize, Serialize};

/// Data layout the translator generated the query for.
///
/// Only table naming depends on it here; the translator owns the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[value(name = "propertytable")]
    #[serde(rename = "propertytable")]
    PropertyTable,
    #[value(name = "singletable")]
    #[serde(rename = "singletable")]
    SingleTable,
    ComplexPropertyTable,
    /// Complex property table queried through the embedded engine.
    ComplexPropertyTableSpark,
    #[value(name = "extvp")]
    #[serde(rename = "extvp")]
    ExtVp,
}

impl OutputFormat {
    pub fn label(&self) -> &'static str {
        match self {
            OutputFormat::PropertyTable => "propertytable",
            OutputFormat::SingleTable => "singletable",
            OutputFormat::ComplexPropertyTable => "complex-property-table",
            OutputFormat::ComplexPropertyTableSpark => "complex-property-table-spark",
            OutputFormat::ExtVp => "extvp",
        }
    }

    /// Whether queries for this layout run on the embedded engine.
    pub fn requires_embedded(&self) -> bool {
        matches!(self, OutputFormat::ComplexPropertyTableSpark)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Derives result table names for one run.
#[derive(Debug, Clone)]
pub struct TableNaming {
    format: OutputFormat,
    base_name: Option<String>,
}

impl TableNaming {
    pub fn new(format: OutputFormat, base_name: Option<String>) -> Self {
        Self { format, base_name }
    }

    /// Name for `file_name`, suffixed with the current epoch milliseconds.
    ///
    /// Two queries named within the same millisecond collide; nothing
    /// detects or retries that.
    pub fn table_name(&self, file_name: &str) -> String {
        result_table_name(
            self.format,
            file_name,
            self.base_name.as_deref(),
            chrono::Utc::now().timestamp_millis(),
        )
    }
}

pub fn result_table_name(
    format: OutputFormat,
    file_name: &str,
    base_name: Option<&str>,
    epoch_millis: i64,
) -> String {
    let raw = match (format, base_name) {
        (OutputFormat::ExtVp, Some(base)) => format!("{}_{}_{}", base, file_name, epoch_millis),
        _ => format!("{}_{}", file_name, epoch_millis),
    };
    sanitize_table_name(&raw)
}

/// Drop angle brackets, then collapse every run of non-word characters to a
/// single `_`, never producing `__` in the process.
pub fn sanitize_table_name(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| *c != '<' && *c != '>').collect();
    let mut name = String::with_capacity(stripped.len());
    for ch in stripped.trim().chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            name.push(ch);
        } else if !name.ends_with('_') {
            name.push('_');
        }
    }
    name
}
