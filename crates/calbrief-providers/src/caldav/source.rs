//! CalDAV calendar source implementation.

use tracing::{debug, info};

use calbrief_core::TimeWindow;

use crate::error::ProviderResult;
use crate::source::{BoxFuture, CalendarContext, CalendarObject, CalendarSource};

use super::client::CalDavClient;
use super::config::CalDavConfig;
use super::xml::{calendar_query_body, parse_multistatus, propfind_calendars_body};

/// CalDAV calendar source.
///
/// Discovers the calendars below the configured calendar home with a depth-1
/// PROPFIND and fetches their objects with a time-ranged calendar-query.
pub struct CalDavSource {
    client: CalDavClient,
}

impl CalDavSource {
    /// Creates a new CalDAV source with the given configuration.
    pub fn new(config: CalDavConfig) -> ProviderResult<Self> {
        Ok(Self {
            client: CalDavClient::new(config)?,
        })
    }

    async fn discover_calendars(&self) -> ProviderResult<Vec<CalendarContext>> {
        let config = self.client.config();
        let url = config.url.as_str();
        debug!(url = %url, "Discovering calendars via PROPFIND");

        let response = self
            .client
            .propfind(url, &propfind_calendars_body()?, 1)
            .await?;

        let calendars: Vec<CalendarContext> = parse_multistatus(&response)?
            .into_iter()
            .filter(|r| r.is_calendar)
            .map(|r| CalendarContext {
                href: config.resolve(&r.href),
                display_name: r.display_name,
            })
            .collect();

        info!(
            count = calendars.len(),
            calendars = ?calendars.iter().map(CalendarContext::name).collect::<Vec<_>>(),
            "Discovered calendars"
        );
        Ok(calendars)
    }

    async fn fetch_calendar_objects(
        &self,
        calendar: &CalendarContext,
        window: TimeWindow,
    ) -> ProviderResult<Vec<CalendarObject>> {
        debug!(
            calendar = calendar.name(),
            start = %window.start,
            end = %window.end,
            "Fetching calendar objects with REPORT"
        );

        let body = calendar_query_body(window.start, window.end)?;
        let response = self.client.report(&calendar.href, &body).await?;

        let objects: Vec<CalendarObject> = parse_multistatus(&response)?
            .into_iter()
            .map(|r| CalendarObject {
                href: Some(r.href),
                etag: r.etag,
                data: r.calendar_data,
            })
            .collect();

        info!(calendar = calendar.name(), count = objects.len(), "Received calendar objects");
        Ok(objects)
    }
}

impl CalendarSource for CalDavSource {
    fn name(&self) -> &str {
        "caldav"
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarContext>>> {
        Box::pin(self.discover_calendars())
    }

    fn fetch_objects<'a>(
        &'a self,
        calendar: &'a CalendarContext,
        window: TimeWindow,
    ) -> BoxFuture<'a, ProviderResult<Vec<CalendarObject>>> {
        Box::pin(async move {
            self.fetch_calendar_objects(calendar, window)
                .await
                .map_err(|e| e.with_calendar(calendar.name()))
        })
    }
}
