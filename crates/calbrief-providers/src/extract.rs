//! Provider-specific conversion of components into [`Event`]s.
//!
//! Each [`ProviderKind`] has an [`Extractor`] that decides which fields are
//! required, where the link comes from and whether recurrences are resolved.
//! Extraction never fails: a component that cannot become an event yields
//! [`Extraction::Skipped`] with the reason.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, trace};

use calbrief_core::{Event, ProviderKind, next_occurrence};

use crate::component::CalendarComponent;
use crate::decode::decode_in;
use crate::source::{CalendarContext, CalendarObject};

/// Summary prefixes birthday calendars put in front of the person's name.
pub const BIRTHDAY_PREFIXES: &[&str] = &[
    "Birthday of ",
    "Geburtstag von ",
    "Anniversaire de ",
    "Cumpleaños de ",
];

/// Why a component did not produce an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No parseable DTSTART.
    MissingStart,
    /// No SUMMARY.
    MissingSummary,
    /// No ATTACH on a birthday.
    MissingAttachment,
    /// No LOCATION on an appointment.
    MissingLocation,
    /// The component itself is cancelled.
    Cancelled,
    /// The recurrence has no occurrence left.
    RecurrenceExhausted,
    /// The RRULE could not be expanded.
    InvalidRecurrence,
    /// The next occurrence is cancelled by an exception.
    OccurrenceCancelled,
    /// The next occurrence was moved to an instant that already passed.
    OccurrencePassed,
}

impl SkipReason {
    /// Returns a short machine-friendly name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingStart => "missing_start",
            Self::MissingSummary => "missing_summary",
            Self::MissingAttachment => "missing_attachment",
            Self::MissingLocation => "missing_location",
            Self::Cancelled => "cancelled",
            Self::RecurrenceExhausted => "recurrence_exhausted",
            Self::InvalidRecurrence => "invalid_recurrence",
            Self::OccurrenceCancelled => "occurrence_cancelled",
            Self::OccurrencePassed => "occurrence_passed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of extracting one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The component produced an event.
    Event(Event),
    /// The component was skipped.
    Skipped(SkipReason),
}

impl Extraction {
    /// Returns the event, if one was produced.
    pub fn into_event(self) -> Option<Event> {
        match self {
            Self::Event(event) => Some(event),
            Self::Skipped(_) => None,
        }
    }

    /// Returns the skip reason, if the component was skipped.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Event(_) => None,
            Self::Skipped(reason) => Some(*reason),
        }
    }
}

impl From<SkipReason> for Extraction {
    fn from(reason: SkipReason) -> Self {
        Self::Skipped(reason)
    }
}

/// Converts decoded components into events for one provider flavour.
pub trait Extractor: Send + Sync {
    /// The provider this extractor implements.
    fn kind(&self) -> ProviderKind;

    /// Extracts an event from `component`, resolving recurrences against `now`.
    fn extract(
        &self,
        calendar: &CalendarContext,
        component: &CalendarComponent,
        now: DateTime<Utc>,
    ) -> Extraction;
}

/// Returns the extractor for `kind`.
pub fn extractor_for(kind: ProviderKind) -> Box<dyn Extractor> {
    match kind {
        ProviderKind::Birthday => Box::new(BirthdayExtractor::default()),
        ProviderKind::Appointment => Box::new(AppointmentExtractor),
    }
}

/// Extractor for birthday calendars.
///
/// Requires start, summary and attachment. The stored start is used as is;
/// the digest projects it onto the current year.
#[derive(Debug, Clone)]
pub struct BirthdayExtractor {
    prefixes: Vec<String>,
}

impl Default for BirthdayExtractor {
    fn default() -> Self {
        Self::with_prefixes(BIRTHDAY_PREFIXES.iter().copied())
    }
}

impl BirthdayExtractor {
    /// Creates an extractor stripping the given summary prefixes.
    pub fn with_prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Removes every configured prefix from `summary`.
    pub fn strip_prefixes(&self, summary: &str) -> String {
        let mut name = summary.to_string();
        loop {
            let before = name.len();
            for prefix in &self.prefixes {
                name = name.replace(prefix.as_str(), "");
            }
            if name.len() == before {
                break;
            }
        }
        name.trim().to_string()
    }
}

impl Extractor for BirthdayExtractor {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Birthday
    }

    fn extract(
        &self,
        calendar: &CalendarContext,
        component: &CalendarComponent,
        _now: DateTime<Utc>,
    ) -> Extraction {
        let Some(start) = component.start else {
            return SkipReason::MissingStart.into();
        };
        let Some(summary) = component.summary.as_deref() else {
            return SkipReason::MissingSummary.into();
        };
        let Some(attachment) = component.attachment.as_deref() else {
            return SkipReason::MissingAttachment.into();
        };

        Extraction::Event(
            Event::new(self.strip_prefixes(summary), start.at)
                .with_link(attachment)
                .with_calendar_name(calendar.name())
                .with_all_day(start.all_day),
        )
    }
}

/// Extractor for appointment calendars.
///
/// Requires start, summary and location. Cancelled components are skipped;
/// recurring ones resolve to their next occurrence at or after `now`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentExtractor;

impl Extractor for AppointmentExtractor {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Appointment
    }

    fn extract(
        &self,
        calendar: &CalendarContext,
        component: &CalendarComponent,
        now: DateTime<Utc>,
    ) -> Extraction {
        if component.is_cancelled() {
            return SkipReason::Cancelled.into();
        }
        let Some(start) = component.start else {
            return SkipReason::MissingStart.into();
        };
        let Some(mut summary) = component.summary.as_deref() else {
            return SkipReason::MissingSummary.into();
        };
        let Some(mut location) = component.location.as_deref() else {
            return SkipReason::MissingLocation.into();
        };

        let mut date = start.at;
        let mut all_day = start.all_day;

        if let Some(rule) = &component.recurrence {
            let occurrence = match next_occurrence(rule, start.at, now) {
                Ok(Some(occurrence)) => occurrence,
                Ok(None) => return SkipReason::RecurrenceExhausted.into(),
                Err(e) => {
                    debug!(error = %e, "Skipping component with invalid recurrence");
                    return SkipReason::InvalidRecurrence.into();
                }
            };
            date = occurrence;

            if let Some(exception) = component.exception_on(occurrence.date_naive()) {
                if exception.is_cancelled() {
                    return SkipReason::OccurrenceCancelled.into();
                }
                if let Some(moved) = exception.start {
                    if moved.at < now {
                        return SkipReason::OccurrencePassed.into();
                    }
                    date = moved.at;
                    all_day = moved.all_day;
                }
                summary = exception.summary.as_deref().unwrap_or(summary);
                location = exception.location.as_deref().unwrap_or(location);
            }
        }

        Extraction::Event(
            Event::new(summary, date)
                .with_link(location)
                .with_calendar_name(calendar.name())
                .with_all_day(all_day),
        )
    }
}

/// Decodes and extracts every object of one calendar.
///
/// Floating times are resolved in `tz`. Skipped components are logged at
/// debug level and left out.
pub fn extract_all<Tz: TimeZone>(
    extractor: &dyn Extractor,
    calendar: &CalendarContext,
    objects: &[CalendarObject],
    now: DateTime<Utc>,
    tz: &Tz,
) -> Vec<Event> {
    let mut events = Vec::new();

    for object in objects {
        for (id, component) in decode_in(object.data.as_deref(), tz) {
            match extractor.extract(calendar, &component, now) {
                Extraction::Event(event) => {
                    trace!(calendar = calendar.name(), %id, summary = %event.summary, "Extracted event");
                    events.push(event);
                }
                Extraction::Skipped(reason) => {
                    debug!(calendar = calendar.name(), %id, %reason, "Skipped component");
                }
            }
        }
    }

    debug!(
        calendar = calendar.name(),
        provider = %extractor.kind(),
        objects = objects.len(),
        events = events.len(),
        "Extracted calendar"
    );
    events
}
