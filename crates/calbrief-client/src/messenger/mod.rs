//! Digest delivery.
//!
//! A [`Messenger`] takes a finished digest and a channel identifier and
//! returns an opaque [`DeliveryReceipt`]. The digest is already rendered for
//! the messenger's kind: Telegram receives MarkdownV2 as-is, Matrix converts
//! the markdown body to HTML before sending.

mod matrix;
mod telegram;

use std::time::Duration;

use thiserror::Error;

use calbrief_core::MessengerKind;
use calbrief_providers::BoxFuture;

use crate::config::MessengerSettings;

pub use matrix::MatrixMessenger;
pub use telegram::TelegramMessenger;

/// Timeout for a single delivery request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors delivering a digest.
#[derive(Debug, Error)]
pub enum MessengerError {
    /// The request could not be sent or its body not read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The messenger API refused the message.
    #[error("{messenger} rejected the message ({status}): {description}")]
    Rejected {
        /// Which API answered.
        messenger: MessengerKind,
        /// HTTP status code.
        status: u16,
        /// The API's error description.
        description: String,
    },

    /// The API answered with something unexpected.
    #[error("invalid {messenger} response: {message}")]
    InvalidResponse {
        /// Which API answered.
        messenger: MessengerKind,
        /// What could not be understood.
        message: String,
    },
}

/// What a messenger returns for a delivered digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// The messenger that delivered the digest.
    pub messenger: MessengerKind,
    /// The message id (Telegram) or event id (Matrix).
    pub id: String,
}

/// A chat service that digests are delivered to.
pub trait Messenger: Send + Sync {
    /// The messenger kind, which decides how digests are rendered for it.
    fn kind(&self) -> MessengerKind;

    /// Sends `digest` to `channel`.
    fn send<'a>(
        &'a self,
        channel: &'a str,
        digest: &'a str,
    ) -> BoxFuture<'a, Result<DeliveryReceipt, MessengerError>>;
}

/// Builds the messenger for the configured settings.
pub fn build_messenger(settings: &MessengerSettings) -> Result<Box<dyn Messenger>, MessengerError> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("calbrief/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let messenger: Box<dyn Messenger> = match settings {
        MessengerSettings::Telegram { bot_token, api_url } => Box::new(TelegramMessenger::new(
            client,
            api_url.clone(),
            bot_token.clone(),
        )),
        MessengerSettings::Matrix {
            home_server_url,
            access_token,
        } => Box::new(MatrixMessenger::new(
            client,
            home_server_url.clone(),
            access_token.clone(),
        )),
    };
    Ok(messenger)
}

/// Joins `segments` below `base`, keeping any path `base` already has.
fn api_url(base: &url::Url, segments: &[&str]) -> String {
    let mut url = base.as_str().trim_end_matches('/').to_string();
    for segment in segments {
        url.push('/');
        url.push_str(segment);
    }
    url
}
