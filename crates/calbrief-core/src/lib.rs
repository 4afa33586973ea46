//! Core types: events, time, recurrence, aggregation, digest rendering

pub mod aggregate;
pub mod event;
pub mod format;
pub mod recurrence;
pub mod time;
pub mod tracing;

pub use aggregate::aggregate;
pub use event::{Event, MessengerKind, ProviderKind, UnknownVariant};
pub use format::{
    DigestRenderer, escape_commonmark, escape_link_target, escape_markdown_v2, fallback_message,
    markdown_to_html,
};
pub use recurrence::{RecurrenceError, RecurrenceRule, next_occurrence};
pub use time::{
    TimeWindow, days_until, normalized_annual_date, normalized_annual_day, whole_years_between,
};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
