//! Merging per-calendar event batches into one ordered digest sequence.

use crate::event::Event;
use crate::time::normalized_annual_day;

/// Concatenates `batches` in order and stably sorts the result by each
/// event's date projected onto `year`.
///
/// Events sharing a key keep their concatenation order, so the batch order
/// decides ties regardless of how the batches were produced. Nothing is
/// deduplicated.
pub fn aggregate(batches: Vec<Vec<Event>>, year: i32) -> Vec<Event> {
    let mut events: Vec<Event> = batches.into_iter().flatten().collect();
    // sort_by_key is stable
    events.sort_by_key(|event| normalized_annual_day(event.local_date(), year));
    tracing::debug!(count = events.len(), year, "Aggregated events");
    events
}
