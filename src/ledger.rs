use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::runner::ExecutionOutcome;

pub const DEFAULT_LEDGER_FILE: &str = "TableOfResults.txt";

/// Append-only run summary: one `table\tmillis\trows` line per query.
///
/// The file is opened, written, flushed and closed for every line, so each
/// recorded query survives a later failure. No header row is written.
#[derive(Debug, Clone)]
pub struct ResultLedger {
    path: PathBuf,
}

impl Default for ResultLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_FILE)
    }
}

impl ResultLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, table_name: &str, outcome: &ExecutionOutcome) -> Result<()> {
        let line = format_line(table_name, outcome);
        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            file.write_all(line.as_bytes())?;
            file.flush()?;
            file.sync_data()
        };
        write().map_err(|source| Error::LedgerWrite {
            path: self.path.clone(),
            source,
        })?;
        debug!("Recorded {} in {}", table_name, self.path.display());
        Ok(())
    }
}

pub fn format_line(table_name: &str, outcome: &ExecutionOutcome) -> String {
    format!(
        "{}\t{}\t{}\n",
        table_name, outcome.execution_time_ms, outcome.row_count
    )
}
