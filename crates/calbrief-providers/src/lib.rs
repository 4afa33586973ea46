//! Calendar decoding, provider extraction and calendar sources.
//!
//! This crate turns what a calendar server returns into [`calbrief_core::Event`]s:
//!
//! - [`CalendarSource`] - The transport trait delivering raw calendar objects
//! - [`decode`] - Raw iCalendar data to [`CalendarComponent`]s
//! - [`Extractor`] - Provider-specific conversion of components into events
//! - [`ProviderError`] - Error types for source operations
//!
//! # Architecture
//!
//! ```text
//!          ┌─────────────────┐
//!          │  CalDAV Server  │
//!          └────────┬────────┘
//!                   │
//!                   ▼
//!          ┌─────────────────┐
//!          │  CalDavSource   │  CalendarSource
//!          └────────┬────────┘
//!                   │ CalendarObject
//!                   ▼ decode()
//!          ┌──────────────────────┐
//!          │  CalendarComponent   │
//!          └────────┬─────────────┘
//!                   │
//!                   ▼ Extractor::extract()
//!    ┌──────────────┴──────────────┐
//!    │ BirthdayExtractor           │
//!    │ AppointmentExtractor ──► next_occurrence()
//!    └──────────────┬──────────────┘
//!                   ▼
//!               ┌───────┐
//!               │ Event │
//!               └───────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use calbrief_providers::{CalendarSource, extract_all, extractor_for};
//!
//! async fn birthdays(source: &dyn CalendarSource, window: TimeWindow) -> ProviderResult<Vec<Event>> {
//!     let extractor = extractor_for(ProviderKind::Birthday);
//!     let mut events = Vec::new();
//!     for calendar in source.list_calendars().await? {
//!         let objects = source.fetch_objects(&calendar, window).await?;
//!         events.extend(extract_all(extractor.as_ref(), &calendar, &objects, Utc::now(), &Local));
//!     }
//!     Ok(events)
//! }
//! ```

#[cfg(feature = "caldav")]
pub mod caldav;
pub mod component;
pub mod decode;
pub mod error;
pub mod extract;
pub mod source;

// Re-export main types at crate root
pub use component::{CalendarComponent, ComponentStart, ComponentStatus, DecodedComponents};
pub use decode::{decode, decode_in};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use extract::{
    AppointmentExtractor, BIRTHDAY_PREFIXES, BirthdayExtractor, Extraction, Extractor, SkipReason,
    extract_all, extractor_for,
};
pub use source::{BoxFuture, CalendarContext, CalendarObject, CalendarSource, select_calendars};
