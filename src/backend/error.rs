//! Backend-agnostic error types for queue providers.
//!
//! Every adapter maps its internal failures onto [`ProviderError`], so the
//! registry can decide uniformly which failures are isolated per instance.

use thiserror::Error;

/// Errors that can occur while talking to a queue backend.
///
/// # Examples
///
/// ```rust
/// use queue_lens::backend::ProviderError;
///
/// fn describe(err: &ProviderError) -> &'static str {
///     if err.is_connectivity() {
///         "disconnected"
///     } else {
///         "failed"
///     }
/// }
///
/// assert_eq!(describe(&ProviderError::Timeout("PING".into())), "disconnected");
/// ```
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Backend is unreachable (connection refused, auth failure, I/O error)
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Connect or command deadline exceeded
    #[error("operation timeout: {0}")]
    Timeout(String),

    /// Internal backend error (unexpected reply shape, wrong key type)
    #[error("internal error: {0}")]
    Internal(String),

    /// Invalid connection settings
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Returns true if the failure means the instance could not be reached.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable(_) | ProviderError::Timeout(_)
        )
    }
}

impl From<redis::RedisError> for ProviderError {
    fn from(err: redis::RedisError) -> Self {
        if err.kind() == redis::ErrorKind::TypeError {
            ProviderError::Internal(err.to_string())
        } else {
            ProviderError::Unavailable(err.to_string())
        }
    }
}
