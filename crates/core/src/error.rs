//! Unified error types for idsweep.

/// Unified error type shared by all idsweep crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Identifier string is malformed.
    #[error("INVALID_ID: {0}")]
    InvalidId(String),

    /// Identifier is outside the configured range or not odd.
    #[error("OUT_OF_RANGE: {0} is outside the configured range or not odd")]
    OutOfRange(String),

    /// Range bounds or step are unacceptable.
    #[error("INVALID_RANGE: {0}")]
    InvalidRange(String),

    /// Invalid request parameters (e.g. empty id list).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Batch exceeds the configured maximum.
    #[error("BATCH_TOO_LARGE: {got} ids exceeds the limit of {max}")]
    BatchTooLarge { got: usize, max: usize },

    /// Interval is not a member of the allowed set.
    #[error("INVALID_INTERVAL: {0} is not an allowed interval")]
    InvalidInterval(f64),

    /// Fetch timed out.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Network-level fetch failure.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Persistence failure (never surfaced past the persistence layer).
    #[error("PERSIST_ERROR: {0}")]
    Persist(String),
}

impl Error {
    /// Whether the error is the caller's fault (maps to HTTP 400).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidId(_)
                | Error::OutOfRange(_)
                | Error::InvalidRange(_)
                | Error::InvalidInput(_)
                | Error::BatchTooLarge { .. }
                | Error::InvalidInterval(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_codes() {
        let err = Error::InvalidId("abc".to_string());
        assert!(err.to_string().starts_with("INVALID_ID"));

        let err = Error::BatchTooLarge { got: 1500, max: 1000 };
        assert!(err.to_string().contains("1500"));
        assert!(err.to_string().contains("1000"));
    }

    #[test]
    fn test_client_error_split() {
        assert!(Error::InvalidId("x".into()).is_client_error());
        assert!(Error::BatchTooLarge { got: 2, max: 1 }.is_client_error());
        assert!(!Error::HttpError("x".into()).is_client_error());
        assert!(!Error::Persist("x".into()).is_client_error());
    }
}
