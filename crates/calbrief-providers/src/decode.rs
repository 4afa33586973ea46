//! Decoding raw iCalendar data into [`CalendarComponent`]s.
//!
//! A CalDAV object usually holds one VEVENT, or a recurring master plus its
//! RECURRENCE-ID overrides. The blob is cut into its VEVENT segments and each
//! segment is parsed on its own, so one malformed entry only loses itself.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use icalendar::{
    Calendar, CalendarComponent as IcalComponent, CalendarDateTime, Component, DatePerhapsTime,
    Event as IcalEvent, EventLike, EventStatus,
};
use regex::Regex;
use tracing::{debug, trace, warn};

use calbrief_core::RecurrenceRule;

use crate::component::{CalendarComponent, ComponentStart, ComponentStatus, DecodedComponents};

static VEVENT_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)BEGIN:VEVENT\r?\n.*?END:VEVENT").expect("VEVENT pattern should be valid")
});

static EXDATE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^EXDATE((?:;[^:\r\n]*)*):([^\r\n]+)")
        .expect("EXDATE pattern should be valid")
});

const ICAL_DATE: &str = "%Y%m%d";
const ICAL_DATETIME: &str = "%Y%m%dT%H%M%S";

/// Decodes raw calendar data, resolving floating times in the host's local
/// timezone.
///
/// Absent data decodes to an empty result.
pub fn decode(data: Option<&str>) -> DecodedComponents {
    decode_in(data, &Local)
}

/// Decodes raw calendar data, resolving floating times and DATE values in
/// `tz`.
///
/// Components are returned in document order. Ids are UIDs, or
/// `component-<n>` for the n-th VEVENT when it has none. A VEVENT carrying
/// RECURRENCE-ID is attached to its master as an exception; without a master
/// in the same blob it is kept on its own under `<uid>@<date>`.
pub fn decode_in<Tz: TimeZone>(data: Option<&str>, tz: &Tz) -> DecodedComponents {
    let Some(data) = data else {
        return Vec::new();
    };

    let mut parsed: Vec<Option<ParsedVevent>> = VEVENT_SEGMENT
        .find_iter(data)
        .enumerate()
        .map(|(position, segment)| parse_segment(segment.as_str(), position, tz))
        .collect();

    let masters: HashMap<String, usize> = parsed
        .iter()
        .enumerate()
        .filter_map(|(index, p)| {
            let p = p.as_ref()?;
            match (&p.recurrence_id, &p.component.uid) {
                (None, Some(uid)) => Some((uid.clone(), index)),
                _ => None,
            }
        })
        .collect();

    let attachments: Vec<(usize, usize)> = parsed
        .iter()
        .enumerate()
        .filter_map(|(index, p)| {
            let p = p.as_ref()?;
            p.recurrence_id?;
            let master = *masters.get(p.component.uid.as_ref()?)?;
            Some((index, master))
        })
        .collect();

    for (index, master) in attachments {
        let master_offset = parsed[master]
            .as_ref()
            .and_then(|m| m.component.start)
            .map(|start| *start.at.offset());
        let Some(exception) = parsed[index].take() else {
            continue;
        };
        // Keyed by the overridden date as the master sees it.
        let date = match (exception.recurrence_raw.as_deref(), master_offset) {
            (Some(raw), Some(offset)) => recurrence_date(raw, offset),
            _ => exception.recurrence_id,
        };
        let Some(date) = date else {
            continue;
        };
        if let Some(Some(master)) = parsed.get_mut(master) {
            master.component.exceptions.insert(date, exception.component);
        }
    }

    let components: DecodedComponents = parsed
        .into_iter()
        .flatten()
        .map(|p| (p.id, p.component))
        .collect();

    debug!(count = components.len(), "Decoded calendar components");
    components
}

/// A VEVENT parsed from one segment, before exceptions are attached.
struct ParsedVevent {
    id: String,
    /// The raw RECURRENCE-ID value.
    recurrence_raw: Option<String>,
    /// The overridden date in this VEVENT's own start offset.
    recurrence_id: Option<NaiveDate>,
    component: CalendarComponent,
}

fn parse_segment<Tz: TimeZone>(segment: &str, position: usize, tz: &Tz) -> Option<ParsedVevent> {
    let segment = segment.replace("\r\n", "\n").replace('\n', "\r\n");
    let wrapped = format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n{segment}\r\nEND:VCALENDAR\r\n");
    let calendar = match wrapped.parse::<Calendar>() {
        Ok(calendar) => calendar,
        Err(e) => {
            warn!(position, error = %e, "Skipping unparsable VEVENT");
            return None;
        }
    };

    let event = calendar.iter().find_map(|component| match component {
        IcalComponent::Event(event) => Some(event),
        _ => None,
    })?;

    let component = convert_event(event, &unfold(&segment), tz);
    let recurrence_raw = event
        .property_value("RECURRENCE-ID")
        .map(|value| value.trim().to_string());
    let own_offset = component.start.map_or(Utc.fix(), |start| *start.at.offset());
    let recurrence_id = recurrence_raw
        .as_deref()
        .and_then(|raw| recurrence_date(raw, own_offset));

    let id = match (&component.uid, recurrence_id) {
        (Some(uid), Some(date)) => format!("{uid}@{date}"),
        (Some(uid), None) => uid.clone(),
        (None, _) => format!("component-{position}"),
    };

    trace!(%id, summary = ?component.summary, "Parsed VEVENT");

    Some(ParsedVevent {
        id,
        recurrence_raw,
        recurrence_id,
        component,
    })
}

fn convert_event<Tz: TimeZone>(event: &IcalEvent, unfolded: &str, tz: &Tz) -> CalendarComponent {
    let start = event.get_start().and_then(|dt| convert_start(dt, tz));

    let recurrence = event.property_value("RRULE").map(|rrule| {
        let exdates = start
            .map(|s| exdates(unfolded, *s.at.offset()))
            .unwrap_or_default();
        RecurrenceRule::new(rrule.trim()).with_exdates(exdates)
    });

    CalendarComponent {
        uid: event.get_uid().map(str::to_string),
        summary: event.get_summary().map(str::to_string),
        start,
        location: event.get_location().map(str::to_string),
        attachment: event.property_value("ATTACH").map(str::to_string),
        status: event.get_status().map(|status| match status {
            EventStatus::Tentative => ComponentStatus::Tentative,
            EventStatus::Confirmed => ComponentStatus::Confirmed,
            EventStatus::Cancelled => ComponentStatus::Cancelled,
        }),
        recurrence,
        exceptions: Default::default(),
    }
}

fn convert_start<Tz: TimeZone>(dt: DatePerhapsTime, tz: &Tz) -> Option<ComponentStart> {
    match dt {
        DatePerhapsTime::Date(date) => {
            in_zone(tz, date.and_time(NaiveTime::MIN)).map(ComponentStart::all_day)
        }
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(at)) => {
            Some(ComponentStart::timed(at.fixed_offset()))
        }
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
            in_zone(tz, naive).map(ComponentStart::timed)
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            let resolved = resolve_tzid(&tzid).and_then(|zone| in_zone(&zone, date_time));
            if resolved.is_none() {
                debug!(%tzid, "Unknown TZID, using fallback timezone");
            }
            resolved.or_else(|| in_zone(tz, date_time)).map(ComponentStart::timed)
        }
    }
}

/// Resolves a TZID parameter to an IANA zone.
fn resolve_tzid(tzid: &str) -> Option<chrono_tz::Tz> {
    tzid.trim().trim_matches('"').trim_start_matches('/').parse().ok()
}

fn in_zone<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Collects EXDATE values as wall clock times in the frame of a start whose
/// offset is `offset`.
///
/// UTC values are converted into that offset; TZID and floating values are
/// already wall clock times; DATE values mean midnight.
fn exdates(unfolded: &str, offset: FixedOffset) -> Vec<NaiveDateTime> {
    EXDATE_LINE
        .captures_iter(unfolded)
        .flat_map(|caps| {
            let values = caps.get(2).map_or("", |m| m.as_str());
            values.split(',').map(str::trim).collect::<Vec<_>>()
        })
        .filter_map(|value| parse_exdate(value, offset))
        .collect()
}

fn parse_exdate(value: &str, offset: FixedOffset) -> Option<NaiveDateTime> {
    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, ICAL_DATETIME).ok()?;
        return Some(Utc.from_utc_datetime(&naive).with_timezone(&offset).naive_local());
    }
    if value.len() == 8 {
        return NaiveDate::parse_from_str(value, ICAL_DATE)
            .ok()
            .map(|d| d.and_time(NaiveTime::MIN));
    }
    NaiveDateTime::parse_from_str(value, ICAL_DATETIME).ok()
}

/// The date a RECURRENCE-ID value points at, in the frame of `offset`.
fn recurrence_date(value: &str, offset: FixedOffset) -> Option<NaiveDate> {
    parse_exdate(value, offset).map(|dt| dt.date())
}

/// Undoes RFC 5545 line folding.
fn unfold(segment: &str) -> String {
    segment
        .replace("\r\n ", "")
        .replace("\r\n\t", "")
        .replace("\n ", "")
        .replace("\n\t", "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cet() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, 0).unwrap()
    }

    fn calendar(body: &str) -> String {
        format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//Test//EN\r\n{body}END:VCALENDAR\r\n")
    }

    fn birthday_ics() -> String {
        calendar(
            "BEGIN:VEVENT\r\n\
             UID:birthday-alice@monica\r\n\
             DTSTART;VALUE=DATE:20200510\r\n\
             SUMMARY:Birthday of Alice\r\n\
             ATTACH:http://example/alice\r\n\
             RRULE:FREQ=YEARLY\r\n\
             END:VEVENT\r\n",
        )
    }

    fn recurring_with_override_ics() -> String {
        calendar(
            "BEGIN:VEVENT\r\n\
             UID:jour-fixe@nextcloud\r\n\
             DTSTART;TZID=Europe/Berlin:20240501T180000\r\n\
             SUMMARY:Jour fixe\r\n\
             LOCATION:https://meet.example/jf\r\n\
             RRULE:FREQ=WEEKLY;BYDAY=WE\r\n\
             EXDATE;TZID=Europe/Berlin:20240529T180000,20240605T180000\r\n\
             EXDATE:20240515T160000Z\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:jour-fixe@nextcloud\r\n\
             RECURRENCE-ID;TZID=Europe/Berlin:20240612T180000\r\n\
             DTSTART;TZID=Europe/Berlin:20240612T180000\r\n\
             SUMMARY:Jour fixe\r\n\
             STATUS:CANCELLED\r\n\
             END:VEVENT\r\n",
        )
    }

    #[test]
    fn absent_data_is_empty() {
        assert!(decode_in(None, &cet()).is_empty());
        assert!(decode_in(Some(""), &cet()).is_empty());
    }

    #[test]
    fn decodes_birthday_fields() {
        let components = decode_in(Some(&birthday_ics()), &cet());
        assert_eq!(components.len(), 1);

        let (id, component) = &components[0];
        assert_eq!(id, "birthday-alice@monica");
        assert_eq!(component.summary.as_deref(), Some("Birthday of Alice"));
        assert_eq!(component.attachment.as_deref(), Some("http://example/alice"));

        let start = component.start.unwrap();
        assert!(start.all_day);
        assert_eq!(start.at, cet().with_ymd_and_hms(2020, 5, 10, 0, 0, 0).unwrap());
        assert_eq!(
            component.recurrence.as_ref().map(|r| r.rrule.as_str()),
            Some("FREQ=YEARLY")
        );
    }

    #[test]
    fn tzid_start_keeps_offset_in_effect() {
        let components = decode_in(Some(&recurring_with_override_ics()), &Utc);
        let start = components[0].1.start.unwrap();

        // Berlin is on summer time in May
        assert_eq!(start.at.offset().local_minus_utc(), 2 * 3600);
        assert_eq!(start.at.naive_local(), naive(2024, 5, 1, 18, 0));
        assert!(!start.all_day);
    }

    #[test]
    fn utc_start_has_zero_offset() {
        let ics = calendar(
            "BEGIN:VEVENT\r\nUID:u\r\nDTSTART:20250205T100000Z\r\nSUMMARY:Sync\r\nEND:VEVENT\r\n",
        );
        let components = decode_in(Some(&ics), &cet());
        let start = components[0].1.start.unwrap();
        assert_eq!(start.at.offset().local_minus_utc(), 0);
    }

    #[test]
    fn floating_and_unknown_tzid_use_fallback_zone() {
        let ics = calendar(
            "BEGIN:VEVENT\r\nUID:a\r\nDTSTART:20250205T100000\r\nSUMMARY:A\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:b\r\nDTSTART;TZID=Mars/Olympus:20250205T100000\r\nSUMMARY:B\r\nEND:VEVENT\r\n",
        );
        let components = decode_in(Some(&ics), &cet());

        for (_, component) in &components {
            let start = component.start.unwrap();
            assert_eq!(start.at, cet().with_ymd_and_hms(2025, 2, 5, 10, 0, 0).unwrap());
        }
    }

    #[test]
    fn exdates_are_carried_in_the_event_frame() {
        let components = decode_in(Some(&recurring_with_override_ics()), &Utc);
        let rule = components[0].1.recurrence.as_ref().unwrap();

        assert_eq!(
            rule.exdates,
            vec![
                naive(2024, 5, 29, 18, 0),
                naive(2024, 6, 5, 18, 0),
                naive(2024, 5, 15, 18, 0),
            ]
        );
    }

    #[test]
    fn override_is_attached_to_its_master() {
        let components = decode_in(Some(&recurring_with_override_ics()), &Utc);
        assert_eq!(components.len(), 1);

        let (id, master) = &components[0];
        assert_eq!(id, "jour-fixe@nextcloud");
        let exception = master.exception_on(date(2024, 6, 12)).unwrap();
        assert!(exception.is_cancelled());
    }

    #[test]
    fn utc_recurrence_id_is_keyed_in_master_offset() {
        // 23:00Z on the 11th is 01:00 on the 12th in Berlin
        let ics = calendar(
            "BEGIN:VEVENT\r\n\
             UID:early@nextcloud\r\n\
             DTSTART;TZID=Europe/Berlin:20240501T010000\r\n\
             SUMMARY:Early sync\r\n\
             LOCATION:Room 1\r\n\
             RRULE:FREQ=WEEKLY;BYDAY=WE\r\n\
             END:VEVENT\r\n\
             BEGIN:VEVENT\r\n\
             UID:early@nextcloud\r\n\
             RECURRENCE-ID:20240611T230000Z\r\n\
             DTSTART;TZID=Europe/Berlin:20240612T010000\r\n\
             SUMMARY:Early sync\r\n\
             STATUS:CANCELLED\r\n\
             END:VEVENT\r\n",
        );
        let components = decode_in(Some(&ics), &Utc);
        assert_eq!(components.len(), 1);

        let master = &components[0].1;
        assert!(master.exception_on(date(2024, 6, 12)).unwrap().is_cancelled());
        assert!(master.exception_on(date(2024, 6, 11)).is_none());
    }

    #[test]
    fn orphan_override_is_kept_standalone() {
        let ics = calendar(
            "BEGIN:VEVENT\r\n\
             UID:moved@nextcloud\r\n\
             RECURRENCE-ID:20240612T160000Z\r\n\
             DTSTART:20240613T160000Z\r\n\
             SUMMARY:Moved\r\n\
             END:VEVENT\r\n",
        );
        let components = decode_in(Some(&ics), &Utc);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].0, "moved@nextcloud@2024-06-12");
    }

    #[test]
    fn missing_uid_gets_positional_id_and_order_is_kept() {
        let ics = calendar(
            "BEGIN:VEVENT\r\nUID:first\r\nSUMMARY:First\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nSUMMARY:No uid\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:third\r\nSUMMARY:Third\r\nEND:VEVENT\r\n",
        );
        let components = decode_in(Some(&ics), &Utc);
        let ids: Vec<&str> = components.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["first", "component-1", "third"]);
        assert!(components[1].1.start.is_none());
    }

    #[test]
    fn status_is_decoded() {
        let ics = calendar(
            "BEGIN:VEVENT\r\nUID:x\r\nSUMMARY:Off\r\nSTATUS:CANCELLED\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:y\r\nSUMMARY:Maybe\r\nSTATUS:TENTATIVE\r\nEND:VEVENT\r\n",
        );
        let components = decode_in(Some(&ics), &Utc);
        assert_eq!(components[0].1.status, Some(ComponentStatus::Cancelled));
        assert_eq!(components[1].1.status, Some(ComponentStatus::Tentative));
    }

    #[test]
    fn accepts_bare_line_feeds() {
        let ics = "BEGIN:VCALENDAR\nVERSION:2.0\nBEGIN:VEVENT\nUID:lf\nDTSTART:20250205T100000Z\nSUMMARY:LF only\nEND:VEVENT\nEND:VCALENDAR\n";
        let components = decode_in(Some(ics), &Utc);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].1.summary.as_deref(), Some("LF only"));
    }

    #[test]
    fn data_without_events_is_empty() {
        assert!(decode_in(Some("this is not a calendar"), &Utc).is_empty());
    }

    #[test]
    fn unfolds_continuation_lines() {
        assert_eq!(unfold("EXDATE:20240101T000000Z,\r\n 20240102T000000Z"), "EXDATE:20240101T000000Z,20240102T000000Z");
    }

    #[test]
    fn parses_exdate_variants() {
        assert_eq!(parse_exdate("20240612", cet()), Some(naive(2024, 6, 12, 0, 0)));
        assert_eq!(
            parse_exdate("20240612T090000Z", cet()),
            Some(naive(2024, 6, 12, 10, 0))
        );
        assert_eq!(
            parse_exdate("20240612T090000", cet()),
            Some(naive(2024, 6, 12, 9, 0))
        );
        assert_eq!(parse_exdate("garbage", cet()), None);
    }
}
