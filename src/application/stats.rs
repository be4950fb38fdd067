//! Aggregation over the completion ledger: response counts, done rates,
//! and streaks. Rates are integer percentages and defined as 100 when the
//! denominator is zero, so a fresh loop never renders as NaN.

use crate::domain::models::{LedgerEntry, ResponseState};
use crate::infrastructure::error::EngineError;
use crate::infrastructure::ledger_store::{LedgerQuery, LedgerStore};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResponseCounts {
    pub done: u64,
    pub skip: u64,
    pub no_response: u64,
}

pub fn response_counts<G: LedgerStore + ?Sized>(
    store: &G,
    loop_id: Option<i64>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<ResponseCounts, EngineError> {
    let base = LedgerQuery {
        loop_id,
        states: Vec::new(),
        from,
        to,
    };

    let count_state = |state: ResponseState| {
        store.count_where(&LedgerQuery {
            states: vec![state],
            ..base.clone()
        })
    };

    Ok(ResponseCounts {
        done: count_state(ResponseState::Done)?,
        skip: count_state(ResponseState::Skip)?,
        no_response: count_state(ResponseState::NoResponse)?,
    })
}

/// `done / (done + skip)` as a percentage.
pub fn done_rate_percent(counts: ResponseCounts) -> u32 {
    percentage(counts.done, counts.done + counts.skip)
}

/// `done / all answered-or-pending rows` as a percentage; disabled rows
/// never enter the denominator.
pub fn completion_rate_percent(counts: ResponseCounts) -> u32 {
    percentage(counts.done, counts.done + counts.skip + counts.no_response)
}

fn percentage(numerator: u64, denominator: u64) -> u32 {
    if denominator == 0 {
        return 100;
    }
    (numerator * 100 / denominator) as u32
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreakSummary {
    pub current: u32,
    pub best: u32,
}

/// Runs of consecutive DONE entries over a loop's ledger history, ordered
/// by day ascending. Disabled rows are transparent: they neither extend nor
/// break a run. The current streak counts back from the most recent
/// non-disabled entry.
pub fn streaks(entries: &[LedgerEntry]) -> StreakSummary {
    let mut best: u32 = 0;
    let mut run: u32 = 0;
    for entry in entries {
        match entry.state {
            ResponseState::Done => {
                run += 1;
                best = best.max(run);
            }
            ResponseState::Disabled => {}
            _ => run = 0,
        }
    }

    let mut current: u32 = 0;
    for entry in entries.iter().rev() {
        match entry.state {
            ResponseState::Done => current += 1,
            ResponseState::Disabled => {}
            _ => break,
        }
    }

    StreakSummary { current, best }
}

pub fn loop_streaks<G: LedgerStore + ?Sized>(
    store: &G,
    loop_id: i64,
) -> Result<StreakSummary, EngineError> {
    Ok(streaks(&store.list_for_loop(loop_id)?))
}
