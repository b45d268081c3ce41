use std::fmt;
use std::str::FromStr;

/// Query option keys understood by the MPP engine.
///
/// Values are passed through `SET key=value` untouched; unknown keys are kept
/// as [`QueryOption::Custom`] and left for the backend to accept or reject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryOption {
    AbortOnError,
    AllowUnsupportedFormats,
    BatchSize,
    CompressionCodec,
    DefaultOrderByLimit,
    DisableCodegen,
    ExplainLevel,
    MaxErrors,
    MaxScanRangeLength,
    MemLimit,
    NumNodes,
    NumScannerThreads,
    ParquetFileSize,
    RequestPool,
    SyncDdl,
    Custom(String),
}

const KNOWN_OPTIONS: &[(&str, QueryOption)] = &[
    ("ABORT_ON_ERROR", QueryOption::AbortOnError),
    ("ALLOW_UNSUPPORTED_FORMATS", QueryOption::AllowUnsupportedFormats),
    ("BATCH_SIZE", QueryOption::BatchSize),
    ("COMPRESSION_CODEC", QueryOption::CompressionCodec),
    ("DEFAULT_ORDER_BY_LIMIT", QueryOption::DefaultOrderByLimit),
    ("DISABLE_CODEGEN", QueryOption::DisableCodegen),
    ("EXPLAIN_LEVEL", QueryOption::ExplainLevel),
    ("MAX_ERRORS", QueryOption::MaxErrors),
    ("MAX_SCAN_RANGE_LENGTH", QueryOption::MaxScanRangeLength),
    ("MEM_LIMIT", QueryOption::MemLimit),
    ("NUM_NODES", QueryOption::NumNodes),
    ("NUM_SCANNER_THREADS", QueryOption::NumScannerThreads),
    ("PARQUET_FILE_SIZE", QueryOption::ParquetFileSize),
    ("REQUEST_POOL", QueryOption::RequestPool),
    ("SYNC_DDL", QueryOption::SyncDdl),
];

impl QueryOption {
    pub fn name(&self) -> &str {
        match self {
            QueryOption::Custom(name) => name,
            known => KNOWN_OPTIONS
                .iter()
                .find(|(_, option)| option == known)
                .map(|(name, _)| *name)
                .unwrap_or_default(),
        }
    }
}

impl FromStr for QueryOption {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Ok(KNOWN_OPTIONS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, option)| option.clone())
            .unwrap_or_else(|| QueryOption::Custom(key.to_string())))
    }
}

impl fmt::Display for QueryOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a `KEY=VALUE` pair as given on the command line.
pub fn parse_option_pair(pair: &str) -> Option<(QueryOption, String)> {
    let (key, value) = pair.split_once('=')?;
    if key.trim().is_empty() {
        return None;
    }
    let option = key.parse().ok()?;
    Some((option, value.trim().to_string()))
}
