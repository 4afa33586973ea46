//! Event types for the digest pipeline.
//!
//! This module provides the canonical types every calendar backend is
//! reduced to:
//! - [`Event`]: A provider-agnostic event ready for aggregation and rendering
//! - [`ProviderKind`]: Which extraction and rendering rules apply to a run
//! - [`MessengerKind`]: Which chat target the digest is rendered for

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::normalized_annual_date;

/// The calendar backend flavour.
///
/// Selected once per run from configuration. It decides both how a calendar
/// component becomes an [`Event`] and how events are grouped and formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Birthday calendars exported by Monica CRM.
    ///
    /// Events recur yearly and carry a link to the contact as attachment.
    Birthday,
    /// Regular appointment calendars (e.g. Nextcloud).
    ///
    /// Events may recur and carry their location as link.
    Appointment,
}

impl ProviderKind {
    /// Returns the configuration name of this provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Birthday => "monica",
            Self::Appointment => "nextcloud",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monica" | "monika" | "birthday" | "birthdays" => Ok(Self::Birthday),
            "nextcloud" | "appointment" | "appointments" => Ok(Self::Appointment),
            other => Err(UnknownVariant::new("calendar provider", other)),
        }
    }
}

/// The chat target a digest is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessengerKind {
    /// Telegram with `MarkdownV2` parse mode.
    ///
    /// Literal text must be backslash-escaped.
    Telegram,
    /// Matrix with an HTML formatted body.
    ///
    /// The markdown digest is converted to HTML as a whole, no manual escaping.
    Matrix,
}

impl MessengerKind {
    /// Returns the configuration name of this messenger.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Matrix => "matrix",
        }
    }
}

impl fmt::Display for MessengerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessengerKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "matrix" => Ok(Self::Matrix),
            other => Err(UnknownVariant::new("messenger", other)),
        }
    }
}

/// A configuration value that names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    /// What was being parsed (e.g. "messenger").
    pub kind: &'static str,
    /// The rejected value.
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// A canonical calendar event.
///
/// This is what every provider extractor produces. The date is always a
/// concrete instant: recurring events are resolved before an `Event` exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The event summary, with provider-specific prefixes removed.
    pub summary: String,
    /// When the event happens, in the fixed offset of its source.
    pub date: DateTime<FixedOffset>,
    /// A URL or free-form location; empty when there is none.
    pub link: String,
    /// Display name of the calendar the event came from; empty if unknown.
    pub calendar_name: String,
    /// Whether the source start was a plain date without time-of-day.
    #[serde(default)]
    pub all_day: bool,
}

impl Event {
    /// Creates a new event with an empty link and calendar name.
    pub fn new(summary: impl Into<String>, date: DateTime<FixedOffset>) -> Self {
        Self {
            summary: summary.into(),
            date,
            link: String::new(),
            calendar_name: String::new(),
            all_day: false,
        }
    }

    /// Builder method to set the link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    /// Builder method to set the calendar name.
    pub fn with_calendar_name(mut self, name: impl Into<String>) -> Self {
        self.calendar_name = name.into();
        self
    }

    /// Builder method to mark the event as all-day.
    pub fn with_all_day(mut self, all_day: bool) -> Self {
        self.all_day = all_day;
        self
    }

    /// Returns true if the link should be rendered as a hyperlink.
    pub fn has_url(&self) -> bool {
        self.link.starts_with("http")
    }

    /// Returns the calendar date of the event in its own offset.
    pub fn local_date(&self) -> NaiveDate {
        self.date.date_naive()
    }

    /// Returns the event date projected onto `year`.
    ///
    /// See [`normalized_annual_date`].
    pub fn annual_date(&self, year: i32) -> DateTime<FixedOffset> {
        normalized_annual_date(self.date, year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
    }

    mod provider_kind {
        use super::*;

        #[test]
        fn parses_configuration_names() {
            assert_eq!("monica".parse::<ProviderKind>(), Ok(ProviderKind::Birthday));
            assert_eq!("Monika".parse::<ProviderKind>(), Ok(ProviderKind::Birthday));
            assert_eq!(
                "nextcloud".parse::<ProviderKind>(),
                Ok(ProviderKind::Appointment)
            );
            assert_eq!(
                " appointment ".parse::<ProviderKind>(),
                Ok(ProviderKind::Appointment)
            );
        }

        #[test]
        fn rejects_unknown_names() {
            let err = "google".parse::<ProviderKind>().unwrap_err();
            assert_eq!(err.kind, "calendar provider");
            assert_eq!(err.to_string(), "unknown calendar provider: \"google\"");
        }

        #[test]
        fn display_matches_config_name() {
            assert_eq!(ProviderKind::Birthday.to_string(), "monica");
            assert_eq!(ProviderKind::Appointment.to_string(), "nextcloud");
        }
    }

    mod messenger_kind {
        use super::*;

        #[test]
        fn parses_configuration_names() {
            assert_eq!(
                "telegram".parse::<MessengerKind>(),
                Ok(MessengerKind::Telegram)
            );
            assert_eq!("MATRIX".parse::<MessengerKind>(), Ok(MessengerKind::Matrix));
        }

        #[test]
        fn rejects_unknown_names() {
            assert!("signal".parse::<MessengerKind>().is_err());
            assert!("".parse::<MessengerKind>().is_err());
        }
    }

    mod event {
        use super::*;

        #[test]
        fn builder_pattern() {
            let event = Event::new("Alice", at(1990, 5, 10, 0))
                .with_link("https://monica.example/people/1")
                .with_calendar_name("Birthdays")
                .with_all_day(true);

            assert_eq!(event.summary, "Alice");
            assert_eq!(event.calendar_name, "Birthdays");
            assert!(event.all_day);
            assert!(event.has_url());
        }

        #[test]
        fn plain_location_is_not_a_url() {
            let event = Event::new("Dentist", at(2025, 2, 5, 9)).with_link("Main Street 5");
            assert!(!event.has_url());

            let event = Event::new("Dentist", at(2025, 2, 5, 9));
            assert!(!event.has_url());
        }

        #[test]
        fn local_date_uses_own_offset() {
            // 23:30 UTC is already the next day at +02:00
            let date = FixedOffset::east_opt(2 * 3600)
                .unwrap()
                .with_ymd_and_hms(2025, 2, 6, 1, 30, 0)
                .unwrap();
            let event = Event::new("Late", date);
            assert_eq!(
                event.local_date(),
                NaiveDate::from_ymd_opt(2025, 2, 6).unwrap()
            );
        }

        #[test]
        fn annual_date_replaces_year() {
            let event = Event::new("Alice", at(1990, 5, 10, 8));
            assert_eq!(event.annual_date(2025), at(2025, 5, 10, 8));
        }

        #[test]
        fn serde_roundtrip() {
            let event = Event::new("Standup", at(2025, 2, 5, 10)).with_link("Room 1");
            let json = serde_json::to_string(&event).unwrap();
            let parsed: Event = serde_json::from_str(&json).unwrap();
            assert_eq!(event, parsed);
        }
    }
}
