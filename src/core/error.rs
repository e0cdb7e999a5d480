use std::path::PathBuf;

use thiserror::Error;

use crate::core::types::MetricKind;

#[derive(Error, Debug)]
pub enum TallymanError {
    #[error("metric id is empty")]
    EmptyId,

    #[error("{kind} metric is missing its {} field", .kind.value_field())]
    MissingValue { kind: MetricKind },

    #[error("unknown metric type: {0:?}")]
    UnknownKind(String),

    #[error("invalid {kind} value: {raw:?}")]
    InvalidValue { kind: MetricKind, raw: String },

    #[error("counter {id} overflowed")]
    CounterOverflow { id: String },

    #[error("{kind} metric {id:?} not found")]
    NotFound { kind: MetricKind, id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Timeout error: operation took longer than {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("snapshot file {} does not exist", .0.display())]
    SnapshotMissing(PathBuf),

    #[error("snapshot file {} is empty", .0.display())]
    SnapshotEmpty(PathBuf),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("storage unavailable after {attempts} attempts: {source}")]
    Unavailable {
        attempts: u32,
        #[source]
        source: Box<TallymanError>,
    },

    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),

    #[error("storage is closed")]
    Closed,

    #[error("storage is not ready (state: {0})")]
    NotReady(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for tallyman operations
pub type Result<T> = std::result::Result<T, TallymanError>;

impl TallymanError {
    /// Creates a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a not-found error for a storage key
    pub fn not_found<S: Into<String>>(kind: MetricKind, id: S) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns true if this error is a transient infrastructure fault worth retrying.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) | Self::Timeout { .. } => true,
            Self::Database(err) => is_transient_sqlx(err),
            _ => false,
        }
    }

    /// Returns true for input validation failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyId
                | Self::MissingValue { .. }
                | Self::UnknownKind(_)
                | Self::InvalidValue { .. }
                | Self::CounterOverflow { .. }
        )
    }

    /// Returns true if this error reports a lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::EmptyId
            | Self::MissingValue { .. }
            | Self::UnknownKind(_)
            | Self::InvalidValue { .. }
            | Self::CounterOverflow { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Io(_) => "io",
            Self::Database(_) => "database",
            Self::Timeout { .. } => "timeout",
            Self::SnapshotMissing(_) | Self::SnapshotEmpty(_) => "snapshot",
            Self::Serialization(_) => "serialization",
            Self::Storage(_) => "storage",
            Self::Unavailable { .. } => "unavailable",
            Self::Unsupported(_) => "unsupported",
            Self::Closed | Self::NotReady(_) => "lifecycle",
            Self::Config(_) => "config",
        }
    }
}

/// Connectivity-class sqlx failures. Constraint violations and decode errors are permanent.
fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| {
            // Class 08: connection exception. 57P0x: server shutdown. 40001/40P01: serialization and deadlock.
            code.starts_with("08")
                || matches!(&*code, "57P01" | "57P02" | "57P03" | "40001" | "40P01")
        }),
        _ => false,
    }
}
