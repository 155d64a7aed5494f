use thiserror::Error;

/// Boxed error coming out of a page sink; both Postgres and in-memory sinks map into it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every failure the migration can surface. None of them is retried or downgraded to a skip:
/// the driver stops at the first one and reports its stage.
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("legacy store unavailable: {detail}")]
    SourceUnavailable {
        detail: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("cannot normalize film {film}: {reason}")]
    NormalizationError { film: String, reason: String },

    #[error("target store unavailable during {action}: {source}")]
    SinkUnavailable {
        action: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("write to {table} failed on page {page}: {source}")]
    SinkWriteError {
        table: &'static str,
        page: usize,
        #[source]
        source: BoxError,
    },
}

impl EtlError {
    pub fn source_unavailable(detail: impl Into<String>, source: rusqlite::Error) -> Self {
        EtlError::SourceUnavailable {
            detail: detail.into(),
            source: Some(source),
        }
    }

    pub fn normalization(film: impl Into<String>, reason: impl Into<String>) -> Self {
        EtlError::NormalizationError {
            film: film.into(),
            reason: reason.into(),
        }
    }

    /// Pipeline stage the error belongs to, used in the terminal diagnostic.
    pub fn stage(&self) -> &'static str {
        match self {
            EtlError::Config(_) => "config",
            EtlError::SourceUnavailable { .. } => "extract",
            EtlError::NormalizationError { .. } => "normalize",
            EtlError::SinkUnavailable { .. } | EtlError::SinkWriteError { .. } => "load",
        }
    }
}

pub type EtlResult<T> = Result<T, EtlError>;
