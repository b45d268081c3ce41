use std::path::Path;

use tracing::warn;

use crate::error::{Error, Result};

/// Extension the translator gives the SQL it writes next to each query file.
pub const TRANSLATED_EXTENSION: &str = "sql";

/// One translated query, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedQuery {
    /// Name of the original query file, e.g. `q1.sparql`.
    pub file_name: String,
    pub sql: String,
}

/// Load the translated query at `path`, or every `*.sql` file in it when it
/// is a directory, in file name order.
pub fn load_queries(path: &Path) -> Result<Vec<TranslatedQuery>> {
    if !path.exists() {
        return Err(Error::Configuration(format!(
            "input path does not exist: {}",
            path.display()
        )));
    }

    let mut files = Vec::new();
    if path.is_dir() {
        let entries = std::fs::read_dir(path).map_err(|source| Error::Input {
            path: path.to_path_buf(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| Error::Input {
                path: path.to_path_buf(),
                source,
            })?;
            let file = entry.path();
            if file.is_file()
                && file.extension().and_then(|e| e.to_str()) == Some(TRANSLATED_EXTENSION)
            {
                files.push(file);
            }
        }
        files.sort();
    } else {
        files.push(path.to_path_buf());
    }

    let mut queries = Vec::with_capacity(files.len());
    for file in files {
        let sql = std::fs::read_to_string(&file).map_err(|source| Error::Input {
            path: file.clone(),
            source,
        })?;
        if sql.trim().is_empty() {
            warn!("Skipping empty query file {}", file.display());
            continue;
        }
        queries.push(TranslatedQuery {
            file_name: query_file_name(&file),
            sql: sql.trim().to_string(),
        });
    }
    Ok(queries)
}

/// `q1.sparql.sql` → `q1.sparql`.
fn query_file_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(".sql") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}
