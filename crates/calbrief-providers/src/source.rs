//! CalendarSource trait definition.
//!
//! A [`CalendarSource`] is the transport that delivers raw calendar objects
//! for a time window. It knows nothing about providers or events: decoding
//! and extraction happen afterwards, on whatever the source returned.

use std::future::Future;
use std::pin::Pin;

use calbrief_core::TimeWindow;
use serde::{Deserialize, Serialize};

use crate::error::ProviderResult;

/// A calendar collection as discovered on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarContext {
    /// The collection href (path or absolute URL).
    pub href: String,
    /// The display name, if the server reported one.
    pub display_name: Option<String>,
}

impl CalendarContext {
    /// Creates a context for the collection at `href`.
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            display_name: None,
        }
    }

    /// Builder method to set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// The display name, or an empty string when the server had none.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or_default()
    }
}

/// One raw calendar object returned by a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarObject {
    /// The object href, if known.
    pub href: Option<String>,
    /// The ETag, if known.
    pub etag: Option<String>,
    /// The iCalendar payload. Servers may omit it.
    pub data: Option<String>,
}

impl CalendarObject {
    /// Creates an object carrying `data`.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::default()
        }
    }

    /// Creates an object without payload.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder method to set the href.
    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    /// Builder method to set the ETag.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

/// A boxed future for async trait methods.
///
/// Boxing keeps [`CalendarSource`] usable as a trait object.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The transport delivering calendars and their raw objects.
pub trait CalendarSource: Send + Sync {
    /// Returns the name/type of this source (e.g. "caldav").
    fn name(&self) -> &str;

    /// Lists the calendar collections visible to the configured account.
    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarContext>>>;

    /// Fetches the objects of `calendar` with events overlapping `window`.
    fn fetch_objects<'a>(
        &'a self,
        calendar: &'a CalendarContext,
        window: TimeWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<CalendarObject>>>;
}

/// Keeps the calendars whose display name is listed in `wanted`.
///
/// Discovery order is preserved. Calendars without a display name never match.
pub fn select_calendars(calendars: Vec<CalendarContext>, wanted: &[String]) -> Vec<CalendarContext> {
    calendars
        .into_iter()
        .filter(|c| {
            c.display_name
                .as_ref()
                .is_some_and(|name| wanted.iter().any(|w| w == name))
        })
        .collect()
}
