//! Command-line interface definition.
//!
//! Every setting can be given as a flag or through the environment; a `.env`
//! file in the working directory is loaded before parsing.

use clap::Parser;

use calbrief_core::{MessengerKind, ProviderKind, TracingOutputFormat};

/// calbrief - Upcoming birthdays and appointments from CalDAV, as a chat digest
#[derive(Debug, Parser)]
#[command(name = "calbrief")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    // --- CalDAV ---
    /// CalDAV calendar home URL
    #[arg(long, env = "CALDAV_BASE_URL")]
    pub caldav_base_url: Option<String>,

    /// CalDAV username
    #[arg(long, env = "CALDAV_USER_NAME")]
    pub caldav_user_name: Option<String>,

    /// CalDAV password (supports `pass::` and `env::` references)
    #[arg(long, env = "CALDAV_USER_PASSWORD", hide_env_values = true)]
    pub caldav_user_password: Option<String>,

    /// Display names of the calendars to include, separated by `|`
    #[arg(long, env = "CALDAV_CALENDARS", value_delimiter = '|')]
    pub caldav_calendars: Vec<String>,

    /// Which kind of calendar is read: monica (birthdays) or nextcloud (appointments)
    #[arg(long, env = "CALDAV_CALENDAR_PROVIDER")]
    pub caldav_calendar_provider: Option<ProviderKind>,

    /// Accept invalid TLS certificates from the CalDAV server
    #[arg(long, env = "CALDAV_INSECURE_TLS")]
    pub caldav_insecure_tls: bool,

    // --- Digest ---
    /// Number of days the digest covers
    #[arg(long, env = "CALENDAR_DURATION")]
    pub calendar_duration: Option<u32>,

    // --- Messenger ---
    /// Where the digest is sent: telegram or matrix
    #[arg(long, env = "MESSENGER")]
    pub messenger: Option<MessengerKind>,

    /// Telegram chat id or Matrix room id
    #[arg(long, env = "CHANNEL_ID")]
    pub channel_id: Option<String>,

    /// Telegram bot token (supports `pass::` and `env::` references)
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    /// Telegram Bot API base URL
    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api_url: String,

    /// Matrix homeserver URL
    #[arg(long, env = "MATRIX_HOME_SERVER_URL")]
    pub matrix_home_server_url: Option<String>,

    /// Matrix access token (supports `pass::` and `env::` references)
    #[arg(long, env = "MATRIX_ACCESS_TOKEN", hide_env_values = true)]
    pub matrix_access_token: Option<String>,

    // --- Run mode ---
    /// Print the digest to stdout instead of sending it
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log output format: pretty, compact or json
    #[arg(long, env = "CALBRIEF_LOG_FORMAT", default_value = "compact")]
    pub log_format: TracingOutputFormat,
}
