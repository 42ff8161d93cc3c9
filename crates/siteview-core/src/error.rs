use thiserror::Error;

/// Errors surfaced by the ingestion gateway and the metrics engine.
///
/// Store implementations report failures as `anyhow::Error`; the core wraps
/// them here so callers can tell caller mistakes from transient store trouble.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("analytics store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),

    /// The session was counted but its page-view event was not stored.
    #[error("session {session_id} updated but event was not recorded: {source}")]
    PartialWrite {
        session_id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl CoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Validation failures are final; store failures may succeed on retry.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Validation { .. })
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
