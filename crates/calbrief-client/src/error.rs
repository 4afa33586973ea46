//! Client error types.

use thiserror::Error;

use calbrief_core::TracingError;
use calbrief_providers::ProviderError;

use crate::config::ConfigError;
use crate::messenger::MessengerError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that end a digest run.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Calendar source error.
    #[error("calendar error: {0}")]
    Provider(#[from] ProviderError),

    /// Delivery error.
    #[error("delivery failed: {0}")]
    Messenger(#[from] MessengerError),

    /// Logging could not be set up.
    #[error(transparent)]
    Tracing(#[from] TracingError),
}
