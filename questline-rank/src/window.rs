//! Windowed score aggregation for the weekly view.
//!
//! The windowed score is recomputed from events on every call. Nothing is
//! decremented when events age out; they simply stop matching the window.

use chrono::{DateTime, TimeDelta, Utc};
use questline_core::{EntityId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A point award at a moment in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub user_id: EntityId,
    pub amount: u64,
    pub awarded_at: Timestamp,
}

impl ScoreEvent {
    pub fn new(user_id: EntityId, amount: u64, awarded_at: Timestamp) -> Self {
        Self {
            user_id,
            amount,
            awarded_at,
        }
    }
}

/// Earliest timestamp inside a trailing `window` ending at `now`.
pub fn window_start(now: Timestamp, window: Duration) -> Timestamp {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// True if `at` falls in `[now - window, now]`.
pub fn in_window(at: Timestamp, now: Timestamp, window: Duration) -> bool {
    at >= window_start(now, window) && at <= now
}

/// Sum of event amounts per user inside the trailing window.
///
/// Users without a matching event are absent from the map. Sums saturate.
pub fn windowed_scores<'a, I>(events: I, now: Timestamp, window: Duration) -> HashMap<EntityId, u64>
where
    I: IntoIterator<Item = &'a ScoreEvent>,
{
    let start = window_start(now, window);
    let mut totals: HashMap<EntityId, u64> = HashMap::new();

    for event in events {
        if event.awarded_at >= start && event.awarded_at <= now {
            let total = totals.entry(event.user_id).or_insert(0);
            *total = total.saturating_add(event.amount);
        }
    }
    totals
}
