//! Recurrence resolution.
//!
//! Given an RRULE and the start of the event defining it, [`next_occurrence`]
//! finds the first occurrence at or after a reference instant.
//!
//! Expansion happens in the floating frame of the original start: the wall
//! clock time of DTSTART is expanded as if it were UTC, and the original
//! fixed offset is attached to the result afterwards. A weekly 09:00 meeting
//! therefore stays at 09:00 on both sides of a daylight-saving change.
//!
//! UNTIL is moved into the same frame before parsing: a DATE covers its whole
//! day, a floating value is taken as is and a UTC value is shifted into the
//! start's offset.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rrule::{RRule, Tz, Unvalidated};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of candidates requested from the expander per lookup.
const LOOKAHEAD: u16 = 2;

const ICAL_DATE: &str = "%Y%m%d";
const ICAL_DATETIME: &str = "%Y%m%dT%H%M%S";

/// A recurrence rule as carried by a calendar component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    /// The RRULE value, e.g. `FREQ=WEEKLY;BYDAY=MO`.
    pub rrule: String,
    /// Excluded occurrences, as wall clock times in the event's own frame.
    #[serde(default)]
    pub exdates: Vec<NaiveDateTime>,
}

impl RecurrenceRule {
    /// Creates a rule without exclusions.
    pub fn new(rrule: impl Into<String>) -> Self {
        Self {
            rrule: rrule.into(),
            exdates: Vec::new(),
        }
    }

    /// Builder method to set excluded occurrences.
    pub fn with_exdates(mut self, exdates: Vec<NaiveDateTime>) -> Self {
        self.exdates = exdates;
        self
    }
}

/// Errors from recurrence resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    /// The RRULE text could not be parsed or validated against its start.
    #[error("invalid recurrence rule {rule:?}: {message}")]
    InvalidRule {
        /// The offending rule text.
        rule: String,
        /// Why it was rejected.
        message: String,
    },
}

impl RecurrenceError {
    fn invalid(rule: &str, message: impl ToString) -> Self {
        Self::InvalidRule {
            rule: rule.to_string(),
            message: message.to_string(),
        }
    }
}

/// Returns the earliest occurrence of `rule` at or after `reference`.
///
/// `start` is the DTSTART of the recurring event; its fixed offset is kept on
/// the returned instant. Returns `Ok(None)` when the rule has no occurrence
/// left (COUNT or UNTIL reached, or every remaining candidate excluded).
pub fn next_occurrence(
    rule: &RecurrenceRule,
    start: DateTime<FixedOffset>,
    reference: DateTime<Utc>,
) -> Result<Option<DateTime<FixedOffset>>, RecurrenceError> {
    let offset = *start.offset();
    let floating_start = floating(start.naive_local());
    let floating_reference = floating(reference.with_timezone(&offset).naive_local());

    let parsed: RRule<Unvalidated> = floating_rule(&rule.rrule, offset)
        .parse()
        .map_err(|e| RecurrenceError::invalid(&rule.rrule, e))?;
    let mut set = parsed
        .build(floating_start)
        .map_err(|e| RecurrenceError::invalid(&rule.rrule, e))?;

    if !rule.exdates.is_empty() {
        set = set.set_exdates(rule.exdates.iter().copied().map(floating).collect());
    }

    let candidates = set
        .after(floating_reference - Duration::seconds(1))
        .all(LOOKAHEAD)
        .dates;

    let next = candidates
        .into_iter()
        .find(|dt| *dt >= floating_reference)
        .and_then(|dt| offset.from_local_datetime(&dt.naive_utc()).single());

    tracing::trace!(
        rule = %rule.rrule,
        %start,
        %reference,
        next = ?next,
        "Resolved recurrence"
    );

    Ok(next)
}

fn floating(naive: NaiveDateTime) -> DateTime<Tz> {
    Tz::UTC.from_utc_datetime(&naive)
}

/// Rewrites the UNTIL part of `rrule` into the floating frame of a start with
/// `offset`. Values that do not parse are left for the rule parser to reject.
fn floating_rule(rrule: &str, offset: FixedOffset) -> String {
    rrule
        .split(';')
        .map(|part| match part.split_once('=') {
            Some((key, value)) if key.trim().eq_ignore_ascii_case("UNTIL") => {
                match floating_until(value.trim(), offset) {
                    Some(until) => format!("UNTIL={}Z", until.format(ICAL_DATETIME)),
                    None => part.to_string(),
                }
            }
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn floating_until(value: &str, offset: FixedOffset) -> Option<NaiveDateTime> {
    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, ICAL_DATETIME).ok()?;
        return Some(Utc.from_utc_datetime(&naive).with_timezone(&offset).naive_local());
    }
    if value.len() == 8 {
        return NaiveDate::parse_from_str(value, ICAL_DATE)
            .ok()?
            .and_hms_opt(23, 59, 59);
    }
    NaiveDateTime::parse_from_str(value, ICAL_DATETIME).ok()
}
