//! Digest configuration.
//!
//! [`DigestConfig::from_cli`] validates the raw [`Cli`] values (flags,
//! environment and `.env` file) into typed settings. Missing values are
//! reported by their environment variable name. Secret references in
//! credential settings are resolved here.

use thiserror::Error;
use url::Url;

use calbrief_core::{MessengerKind, ProviderKind};
use calbrief_providers::caldav::CalDavConfig;

use crate::cli::Cli;
use crate::secret::{self, SecretError};

/// Errors validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is missing.
    #[error("{0} is not set")]
    Missing(&'static str),

    /// A setting has an unusable value.
    #[error("{var} is invalid: {message}")]
    Invalid {
        /// The environment variable name of the setting.
        var: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// A secret reference could not be resolved.
    #[error("failed to resolve {var}: {source}")]
    Secret {
        /// The environment variable name of the setting.
        var: &'static str,
        #[source]
        source: SecretError,
    },
}

/// CalDAV settings.
#[derive(Debug, Clone)]
pub struct CalDavSettings {
    /// Connection to the calendar home.
    pub source: CalDavConfig,
    /// Display names of the calendars to include.
    pub calendars: Vec<String>,
}

/// Messenger connection settings.
#[derive(Clone)]
pub enum MessengerSettings {
    /// Telegram Bot API.
    Telegram {
        /// Bot token, resolved.
        bot_token: String,
        /// Bot API base URL.
        api_url: Url,
    },
    /// Matrix client-server API.
    Matrix {
        /// Homeserver base URL.
        home_server_url: Url,
        /// Access token, resolved.
        access_token: String,
    },
}

impl MessengerSettings {
    /// The messenger these settings are for.
    pub fn kind(&self) -> MessengerKind {
        match self {
            Self::Telegram { .. } => MessengerKind::Telegram,
            Self::Matrix { .. } => MessengerKind::Matrix,
        }
    }
}

impl std::fmt::Debug for MessengerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Telegram { api_url, .. } => f
                .debug_struct("Telegram")
                .field("api_url", &api_url.as_str())
                .finish_non_exhaustive(),
            Self::Matrix {
                home_server_url, ..
            } => f
                .debug_struct("Matrix")
                .field("home_server_url", &home_server_url.as_str())
                .finish_non_exhaustive(),
        }
    }
}

/// Where a digest is delivered.
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    /// Telegram chat id or Matrix room id.
    pub channel_id: String,
    /// Messenger connection.
    pub messenger: MessengerSettings,
}

/// Validated configuration for one digest run.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    /// CalDAV connection.
    pub caldav: CalDavSettings,
    /// Extraction and rendering rules.
    pub provider: ProviderKind,
    /// Days covered by the digest.
    pub duration_days: u32,
    /// The messenger the digest is rendered for.
    pub messenger: MessengerKind,
    /// Delivery target, `None` on dry runs.
    pub delivery: Option<DeliverySettings>,
}

impl DigestConfig {
    /// Validates the command line into a digest configuration.
    ///
    /// On dry runs the channel and messenger credentials are not required.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let base_url = required("CALDAV_BASE_URL", &cli.caldav_base_url)?;
        let mut source = CalDavConfig::new(base_url).map_err(|e| ConfigError::Invalid {
            var: "CALDAV_BASE_URL",
            message: e.to_string(),
        })?;

        match (&cli.caldav_user_name, &cli.caldav_user_password) {
            (Some(username), Some(password)) => {
                let password = resolve_secret("CALDAV_USER_PASSWORD", password)?;
                source = source.with_credentials(username.as_str(), password);
            }
            (None, None) => {}
            _ => {
                return Err(ConfigError::Invalid {
                    var: "CALDAV_USER_PASSWORD",
                    message: "CALDAV_USER_NAME and CALDAV_USER_PASSWORD must be set together"
                        .into(),
                });
            }
        }
        if cli.caldav_insecure_tls {
            source = source.with_insecure_tls();
        }

        let calendars: Vec<String> = cli
            .caldav_calendars
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        if calendars.is_empty() {
            return Err(ConfigError::Missing("CALDAV_CALENDARS"));
        }
        let caldav = CalDavSettings { source, calendars };

        let provider = cli
            .caldav_calendar_provider
            .ok_or(ConfigError::Missing("CALDAV_CALENDAR_PROVIDER"))?;

        let duration_days = cli
            .calendar_duration
            .ok_or(ConfigError::Missing("CALENDAR_DURATION"))?;
        if duration_days == 0 {
            return Err(ConfigError::Invalid {
                var: "CALENDAR_DURATION",
                message: "must be at least one day".into(),
            });
        }

        let messenger = cli.messenger.ok_or(ConfigError::Missing("MESSENGER"))?;

        let delivery = if cli.dry_run {
            None
        } else {
            Some(delivery_settings(cli, messenger)?)
        };

        Ok(Self {
            caldav,
            provider,
            duration_days,
            messenger,
            delivery,
        })
    }
}

fn delivery_settings(cli: &Cli, messenger: MessengerKind) -> Result<DeliverySettings, ConfigError> {
    let channel_id = required("CHANNEL_ID", &cli.channel_id)?.to_string();

    let messenger = match messenger {
        MessengerKind::Telegram => MessengerSettings::Telegram {
            bot_token: resolve_secret(
                "TELEGRAM_BOT_TOKEN",
                required("TELEGRAM_BOT_TOKEN", &cli.telegram_bot_token)?,
            )?,
            api_url: parse_url("TELEGRAM_API_URL", &cli.telegram_api_url)?,
        },
        MessengerKind::Matrix => MessengerSettings::Matrix {
            home_server_url: parse_url(
                "MATRIX_HOME_SERVER_URL",
                required("MATRIX_HOME_SERVER_URL", &cli.matrix_home_server_url)?,
            )?,
            access_token: resolve_secret(
                "MATRIX_ACCESS_TOKEN",
                required("MATRIX_ACCESS_TOKEN", &cli.matrix_access_token)?,
            )?,
        },
    };

    Ok(DeliverySettings {
        channel_id,
        messenger,
    })
}

fn required<'a>(var: &'static str, value: &'a Option<String>) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn parse_url(var: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::Invalid {
        var,
        message: e.to_string(),
    })
}

fn resolve_secret(var: &'static str, value: &str) -> Result<String, ConfigError> {
    secret::resolve(value).map_err(|source| ConfigError::Secret { var, source })
}
