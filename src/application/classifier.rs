//! Pure predicates over loop definitions and ledger state. Everything here
//! is a total function of its arguments; callers re-run these whenever the
//! definition set, the ledger, or the clock crosses a day boundary.

use crate::domain::models::{LedgerEntry, LoopDefinition, ResponseState};
use crate::infrastructure::clock::Clock;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::collections::HashMap;

pub fn is_active_day(definition: &LoopDefinition, date: NaiveDate) -> bool {
    definition.active_days.is_on(date.weekday())
}

/// Half-open window membership for a local time-of-day offset. Windows with
/// `end <= start` wrap past midnight.
pub fn in_window(definition: &LoopDefinition, time_of_day_ms: i64) -> bool {
    let start = definition.start_in_day;
    let end = definition.end_in_day;
    if end > start {
        time_of_day_ms >= start && time_of_day_ms < end
    } else {
        time_of_day_ms >= start || time_of_day_ms < end
    }
}

pub fn is_active_now(definition: &LoopDefinition, clock: &Clock, now: DateTime<Utc>) -> bool {
    if !definition.enabled || !is_active_day(definition, clock.local_date(now)) {
        return false;
    }
    definition.is_any_time || in_window(definition, clock.time_of_day_ms(now))
}

/// Whether today's window has already closed at `now`. Any-time loops have
/// no closing boundary.
pub fn is_past(definition: &LoopDefinition, clock: &Clock, now: DateTime<Utc>) -> bool {
    if definition.is_any_time {
        return false;
    }
    let time_of_day = clock.time_of_day_ms(now);
    if definition.wraps_midnight() {
        time_of_day >= definition.end_in_day && time_of_day < definition.start_in_day
    } else {
        time_of_day >= definition.end_in_day
    }
}

pub fn is_not_respond(entry: &LedgerEntry) -> bool {
    entry.state == ResponseState::NoResponse
}

pub fn is_disabled(entry: &LedgerEntry) -> bool {
    entry.state == ResponseState::Disabled
}

pub fn is_due_today(definition: &LoopDefinition, clock: &Clock, now: DateTime<Utc>) -> bool {
    definition.enabled && is_active_day(definition, clock.local_date(now))
}

pub fn count_active(definitions: &[LoopDefinition], clock: &Clock, now: DateTime<Utc>) -> usize {
    definitions
        .iter()
        .filter(|definition| is_active_now(definition, clock, now))
        .count()
}

pub fn count_due_today(definitions: &[LoopDefinition], clock: &Clock, now: DateTime<Utc>) -> usize {
    definitions
        .iter()
        .filter(|definition| is_due_today(definition, clock, now))
        .count()
}

/// Loops still expecting a response today: due, window not closed, and no
/// done/skip recorded yet. A missing ledger row counts as unanswered.
pub fn count_remaining_today(
    definitions: &[LoopDefinition],
    today_entries: &[LedgerEntry],
    clock: &Clock,
    now: DateTime<Utc>,
) -> usize {
    let by_loop: HashMap<i64, &LedgerEntry> = today_entries
        .iter()
        .map(|entry| (entry.loop_id, entry))
        .collect();

    definitions
        .iter()
        .filter(|definition| is_due_today(definition, clock, now))
        .filter(|definition| !is_past(definition, clock, now))
        .filter(|definition| match by_loop.get(&definition.id) {
            Some(entry) => entry.state == ResponseState::NoResponse,
            None => true,
        })
        .count()
}

/// Loops to surface in the "did you do this yesterday?" backlog prompt:
/// yesterday's ledger row is still NO_RESPONSE, the loop's mask covered
/// yesterday, and the loop already existed before today. A loop created
/// today is excluded even when yesterday's weekday bit is set.
pub fn loops_awaiting_yesterday_response<'a>(
    definitions: &'a [LoopDefinition],
    yesterday_entries: &[LedgerEntry],
    clock: &Clock,
    now: DateTime<Utc>,
) -> Vec<&'a LoopDefinition> {
    let today = clock.local_date(now);
    let Some(yesterday) = today.pred_opt() else {
        return Vec::new();
    };
    let by_loop: HashMap<i64, &LedgerEntry> = yesterday_entries
        .iter()
        .map(|entry| (entry.loop_id, entry))
        .collect();

    definitions
        .iter()
        .filter(|definition| {
            let Some(entry) = by_loop.get(&definition.id) else {
                return false;
            };
            !is_disabled(entry)
                && is_not_respond(entry)
                && clock.local_date(definition.created_at) < today
                && is_active_day(definition, yesterday)
        })
        .collect()
}
