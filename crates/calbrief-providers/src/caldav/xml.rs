//! WebDAV XML bodies and multistatus parsing.

use std::io::Cursor;

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use crate::error::{ProviderError, ProviderResult};

/// DAV namespace
pub const DAV_NS: &str = "DAV:";
/// CalDAV namespace
pub const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";

/// One `<response>` of a multistatus body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DavResponse {
    /// The resource href.
    pub href: String,
    /// `getetag`, without quotes.
    pub etag: Option<String>,
    /// `displayname`.
    pub display_name: Option<String>,
    /// Whether `resourcetype` contains `calendar`.
    pub is_calendar: bool,
    /// `calendar-data`.
    pub calendar_data: Option<String>,
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn xml_error<E>(e: E) -> ProviderError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ProviderError::internal("failed to build request body").with_source(e)
}

fn start(writer: &mut XmlWriter, element: BytesStart<'_>) -> ProviderResult<()> {
    writer.write_event(Event::Start(element)).map_err(xml_error)
}

fn end(writer: &mut XmlWriter, name: &str) -> ProviderResult<()> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)
}

fn empty(writer: &mut XmlWriter, element: BytesStart<'_>) -> ProviderResult<()> {
    writer.write_event(Event::Empty(element)).map_err(xml_error)
}

fn finish(writer: XmlWriter) -> ProviderResult<String> {
    String::from_utf8(writer.into_inner().into_inner()).map_err(xml_error)
}

/// PROPFIND body asking for display name and resource type.
pub fn propfind_calendars_body() -> ProviderResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut propfind = BytesStart::new("d:propfind");
    propfind.push_attribute(("xmlns:d", DAV_NS));
    propfind.push_attribute(("xmlns:c", CALDAV_NS));
    start(&mut writer, propfind)?;
    start(&mut writer, BytesStart::new("d:prop"))?;
    empty(&mut writer, BytesStart::new("d:displayname"))?;
    empty(&mut writer, BytesStart::new("d:resourcetype"))?;
    end(&mut writer, "d:prop")?;
    end(&mut writer, "d:propfind")?;

    finish(writer)
}

/// REPORT calendar-query body for VEVENTs overlapping `[start, end)`.
pub fn calendar_query_body(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> ProviderResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut query = BytesStart::new("c:calendar-query");
    query.push_attribute(("xmlns:d", DAV_NS));
    query.push_attribute(("xmlns:c", CALDAV_NS));
    start(&mut writer, query)?;

    start(&mut writer, BytesStart::new("d:prop"))?;
    empty(&mut writer, BytesStart::new("d:getetag"))?;
    empty(&mut writer, BytesStart::new("c:calendar-data"))?;
    end(&mut writer, "d:prop")?;

    start(&mut writer, BytesStart::new("c:filter"))?;
    let mut vcalendar = BytesStart::new("c:comp-filter");
    vcalendar.push_attribute(("name", "VCALENDAR"));
    start(&mut writer, vcalendar)?;
    let mut vevent = BytesStart::new("c:comp-filter");
    vevent.push_attribute(("name", "VEVENT"));
    start(&mut writer, vevent)?;

    let mut range = BytesStart::new("c:time-range");
    range.push_attribute(("start", format_icalendar_datetime(start_at).as_str()));
    range.push_attribute(("end", format_icalendar_datetime(end_at).as_str()));
    empty(&mut writer, range)?;

    end(&mut writer, "c:comp-filter")?;
    end(&mut writer, "c:comp-filter")?;
    end(&mut writer, "c:filter")?;
    end(&mut writer, "c:calendar-query")?;

    finish(writer)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Href,
    Etag,
    DisplayName,
    CalendarData,
}

impl Field {
    fn from_local(local: &str) -> Option<Self> {
        match local {
            "href" => Some(Self::Href),
            "getetag" => Some(Self::Etag),
            "displayname" => Some(Self::DisplayName),
            "calendar-data" => Some(Self::CalendarData),
            _ => None,
        }
    }
}

impl DavResponse {
    fn append(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::Href => {
                self.href.push_str(text);
                return;
            }
            Field::Etag => &mut self.etag,
            Field::DisplayName => &mut self.display_name,
            Field::CalendarData => &mut self.calendar_data,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }
}

/// Parses a 207 multistatus body into its responses.
///
/// Only the first `href` of a response (the resource itself) is kept.
///
/// # Errors
///
/// Returns [`ProviderError`] with `InvalidResponse` if the body is not
/// well-formed XML.
pub fn parse_multistatus(xml: &str) -> ProviderResult<Vec<DavResponse>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut responses = Vec::new();
    let mut current: Option<DavResponse> = None;
    let mut field: Option<Field> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            ProviderError::invalid_response("malformed multistatus body").with_source(e)
        })?;
        match event {
            Event::Start(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match local {
                    b"response" => current = Some(DavResponse::default()),
                    b"calendar" => {
                        if let Some(resp) = current.as_mut() {
                            resp.is_calendar = true;
                        }
                    }
                    _ => {
                        field = std::str::from_utf8(local).ok().and_then(Field::from_local);
                        if field == Some(Field::Href)
                            && current.as_ref().is_some_and(|r| !r.href.is_empty())
                        {
                            field = None;
                        }
                    }
                }
            }
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"calendar" {
                    if let Some(resp) = current.as_mut() {
                        resp.is_calendar = true;
                    }
                }
            }
            Event::End(e) => {
                if local_name(e.name().as_ref()) == b"response" {
                    if let Some(resp) = current.take() {
                        responses.push(resp);
                    }
                }
                field = None;
            }
            Event::Text(e) => {
                if let (Some(f), Some(resp)) = (field, current.as_mut()) {
                    let text = e.unescape().map_err(|e| {
                        ProviderError::invalid_response("invalid text in multistatus body")
                            .with_source(e)
                    })?;
                    resp.append(f, &text);
                }
            }
            Event::CData(e) => {
                if let (Some(f), Some(resp)) = (field, current.as_mut()) {
                    resp.append(f, &String::from_utf8_lossy(&e));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    for resp in &mut responses {
        if let Some(etag) = resp.etag.as_mut() {
            *etag = etag.trim_matches('"').to_string();
        }
    }

    Ok(responses)
}

fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| *b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

fn format_icalendar_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}
