//! Decoded calendar components.
//!
//! This module defines [`CalendarComponent`], the structured form of one
//! VEVENT as it comes out of the decoder, before any provider-specific
//! extraction. Every field is optional: which ones are required is decided
//! by the extractor for the active provider.

use std::collections::BTreeMap;

use calbrief_core::RecurrenceRule;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// The start of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentStart {
    /// The start instant in its source offset.
    ///
    /// DATE values start at local midnight.
    pub at: DateTime<FixedOffset>,
    /// Whether the source value was a DATE without time-of-day.
    pub all_day: bool,
}

impl ComponentStart {
    /// Creates a timed start.
    pub fn timed(at: DateTime<FixedOffset>) -> Self {
        Self { at, all_day: false }
    }

    /// Creates an all-day start.
    pub fn all_day(at: DateTime<FixedOffset>) -> Self {
        Self { at, all_day: true }
    }
}

/// The STATUS of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    /// STATUS:TENTATIVE
    Tentative,
    /// STATUS:CONFIRMED
    Confirmed,
    /// STATUS:CANCELLED
    Cancelled,
}

/// One decoded VEVENT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarComponent {
    /// The UID, if present.
    pub uid: Option<String>,
    /// The SUMMARY, if present.
    pub summary: Option<String>,
    /// The DTSTART, if present and parseable.
    pub start: Option<ComponentStart>,
    /// The LOCATION, if present.
    pub location: Option<String>,
    /// The value of the first ATTACH property, if present.
    pub attachment: Option<String>,
    /// The STATUS, if present.
    pub status: Option<ComponentStatus>,
    /// The RRULE (with EXDATEs), if present.
    pub recurrence: Option<RecurrenceRule>,
    /// Per-occurrence overrides, keyed by the RECURRENCE-ID date.
    pub exceptions: BTreeMap<NaiveDate, CalendarComponent>,
}

impl CalendarComponent {
    /// Creates an empty component.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the UID.
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the start.
    pub fn with_start(mut self, start: ComponentStart) -> Self {
        self.start = Some(start);
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the attachment.
    pub fn with_attachment(mut self, attachment: impl Into<String>) -> Self {
        self.attachment = Some(attachment.into());
        self
    }

    /// Builder method to set the status.
    pub fn with_status(mut self, status: ComponentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Builder method to set the recurrence rule.
    pub fn with_recurrence(mut self, rule: RecurrenceRule) -> Self {
        self.recurrence = Some(rule);
        self
    }

    /// Builder method to add a recurrence exception.
    pub fn with_exception(mut self, date: NaiveDate, exception: CalendarComponent) -> Self {
        self.exceptions.insert(date, exception);
        self
    }

    /// Returns true if the component is marked as cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status == Some(ComponentStatus::Cancelled)
    }

    /// Returns the exception overriding the occurrence on `date`, if any.
    pub fn exception_on(&self, date: NaiveDate) -> Option<&CalendarComponent> {
        self.exceptions.get(&date)
    }
}

/// Decoder output: components in document order, keyed by component id.
pub type DecodedComponents = Vec<(String, CalendarComponent)>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn builder_pattern() {
        let start = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2025, 2, 5, 9, 0, 0)
            .unwrap();
        let component = CalendarComponent::new()
            .with_uid("abc")
            .with_summary("Standup")
            .with_start(ComponentStart::timed(start))
            .with_location("Room 1")
            .with_status(ComponentStatus::Confirmed)
            .with_recurrence(RecurrenceRule::new("FREQ=DAILY"));

        assert_eq!(component.uid.as_deref(), Some("abc"));
        assert_eq!(component.start.map(|s| s.all_day), Some(false));
        assert!(!component.is_cancelled());
        assert!(component.recurrence.is_some());
    }

    #[test]
    fn exception_lookup() {
        let component = CalendarComponent::new().with_exception(
            date(2024, 6, 12),
            CalendarComponent::new().with_status(ComponentStatus::Cancelled),
        );

        assert!(component.exception_on(date(2024, 6, 12)).unwrap().is_cancelled());
        assert!(component.exception_on(date(2024, 6, 19)).is_none());
    }
}
