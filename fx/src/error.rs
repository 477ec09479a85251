//! FX error types.

use thiserror::Error;

/// Errors raised while fetching rates.
///
/// These never reach the conversion path: the cache turns them into a soft
/// error flag and keeps serving the last known snapshot.
#[derive(Debug, Error)]
pub enum FxError {
    /// Provider returned an error.
    #[error("Rate provider error: {0}")]
    ProviderError(String),

    /// Upstream answered with a non-success status.
    #[error("Rate endpoint {url} responded with status {status}")]
    Status { url: String, status: u16 },

    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response parsed but does not describe a usable rate table.
    #[error("Invalid rate response: {0}")]
    InvalidResponse(String),
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message() {
        let err = FxError::Status {
            url: "https://example.invalid".into(),
            status: 503,
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("example.invalid"));
    }
}
