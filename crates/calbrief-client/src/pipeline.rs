//! One digest run: fetch, extract, aggregate, render.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use futures_util::future::join_all;
use tracing::{info, warn};

use calbrief_core::{DigestRenderer, MessengerKind, ProviderKind, TimeWindow, aggregate};
use calbrief_providers::{
    CalendarSource, Extractor, ProviderResult, extract_all, extractor_for, select_calendars,
};

use crate::config::DigestConfig;

/// Builds digests from a calendar source.
///
/// The extractor and renderer are chosen once from the provider and
/// messenger kinds and reused for every calendar.
pub struct DigestPipeline {
    extractor: Box<dyn Extractor>,
    renderer: DigestRenderer,
    calendars: Vec<String>,
    duration_days: u32,
}

impl DigestPipeline {
    /// Creates a pipeline for the calendars named in `calendars`.
    pub fn new(
        provider: ProviderKind,
        messenger: MessengerKind,
        duration_days: u32,
        calendars: Vec<String>,
    ) -> Self {
        Self {
            extractor: extractor_for(provider),
            renderer: DigestRenderer::new(provider, messenger, duration_days),
            calendars,
            duration_days,
        }
    }

    /// Creates the pipeline described by `config`.
    pub fn from_config(config: &DigestConfig) -> Self {
        Self::new(
            config.provider,
            config.messenger,
            config.duration_days,
            config.caldav.calendars.clone(),
        )
    }

    /// Builds the digest as of `now`.
    ///
    /// Calendars are fetched concurrently. A calendar that fails to fetch is
    /// logged and left out; failing to list calendars fails the run.
    pub async fn run<Tz: TimeZone>(
        &self,
        source: &dyn CalendarSource,
        now: &DateTime<Tz>,
    ) -> ProviderResult<String> {
        let available = source.list_calendars().await?;
        let selected = select_calendars(available, &self.calendars);
        if selected.is_empty() {
            warn!(wanted = ?self.calendars, "None of the configured calendars exist on the server");
        }

        let window = TimeWindow::upcoming_days(now.clone(), self.duration_days);
        let now_utc = now.with_timezone(&Utc);
        let tz = now.timezone();

        let fetches = selected
            .iter()
            .map(|calendar| source.fetch_objects(calendar, window));
        let results = join_all(fetches).await;

        let mut batches = Vec::with_capacity(selected.len());
        for (calendar, result) in selected.iter().zip(results) {
            match result {
                Ok(objects) => batches.push(extract_all(
                    self.extractor.as_ref(),
                    calendar,
                    &objects,
                    now_utc,
                    &tz,
                )),
                Err(e) => warn!(calendar = calendar.name(), error = %e, "Skipping calendar"),
            }
        }

        let events = aggregate(batches, now.year());
        info!(
            source = source.name(),
            calendars = selected.len(),
            events = events.len(),
            "Collected events"
        );

        Ok(self.renderer.render_at(&events, now))
    }
}
