use std::fmt;
use std::path::PathBuf;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

/// Which builder produced a malformed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Create,
    Insert,
    Select,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementKind::Create => write!(f, "CREATE"),
            StatementKind::Insert => write!(f, "INSERT"),
            StatementKind::Select => write!(f, "SELECT"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Contradictory or missing backend selection parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The initial connection to a backend could not be made.
    #[error("failed to connect to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("malformed {kind} statement: {reason}")]
    MalformedStatement {
        kind: StatementKind,
        reason: &'static str,
    },

    /// Any error the backend reports for a submitted statement.
    #[error("backend rejected `{statement}`: {source}")]
    BackendExecution {
        statement: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to read query input {}: {source}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write ledger {}: {source}", path.display())]
    LedgerWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("execution platform is already set to {0}")]
    PlatformAlreadySet(crate::db::Platform),

    #[error("execution platform has not been set")]
    PlatformNotSet,

    #[error("backend connection has already been closed")]
    ConnectionClosed,
}

impl Error {
    pub fn backend(statement: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::BackendExecution {
            statement: statement.into(),
            source: source.into(),
        }
    }

    pub fn connection(target: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Connection {
            target: target.into(),
            source: source.into(),
        }
    }

    pub fn malformed(kind: StatementKind, reason: &'static str) -> Self {
        Error::MalformedStatement { kind, reason }
    }

    /// Everything except a ledger write aborts the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::LedgerWrite { .. })
    }
}
