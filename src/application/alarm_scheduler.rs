//! Alarm arming for loop start/end boundaries. The scheduler owns the
//! pending-alarm registry and is constructed once per process; every
//! mutation runs under one async mutex so a cancel-then-arm sequence for a
//! loop can never interleave with another pass touching the same loop.

use crate::domain::models::{AlarmKind, LoopDefinition, PendingAlarm};
use crate::infrastructure::alarm_facility::AlarmFacility;
use crate::infrastructure::clock::Clock;
use crate::infrastructure::error::EngineError;
use crate::infrastructure::event_log::EventLog;
use chrono::{DateTime, Datelike, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

type PendingRegistry = HashMap<(i64, AlarmKind), DateTime<Utc>>;

/// Earliest instant `>= from` at which the loop's boundary of the given
/// kind occurs: the date's weekday bit must be set and the local clock time
/// must equal the boundary offset. With a repeat interval, in-window repeat
/// points (`start + k * interval`, strictly before the normalized window
/// end) qualify for the START kind as well. Scanning starts one day back to
/// catch windows that wrapped past midnight and runs a week forward; a
/// non-empty mask guarantees a hit within that range.
pub fn compute_next_fire_time(
    definition: &LoopDefinition,
    clock: &Clock,
    from: DateTime<Utc>,
    kind: AlarmKind,
) -> Option<DateTime<Utc>> {
    if !definition.enabled || definition.active_days.is_empty() || definition.is_any_time {
        return None;
    }

    let from_date = clock.local_date(from);
    for day_offset in -1..=7 {
        let Some(date) = from_date.checked_add_signed(Duration::days(day_offset)) else {
            continue;
        };
        if !definition.active_days.is_on(date.weekday()) {
            continue;
        }

        match kind {
            AlarmKind::Start => {
                let Some(window_start) = clock.local_instant(date, definition.start_in_day) else {
                    continue;
                };
                if window_start >= from {
                    return Some(window_start);
                }
                if definition.interval > 0 {
                    let Some(window_end) =
                        clock.local_instant(date, definition.end_in_day_normalized())
                    else {
                        continue;
                    };
                    let elapsed = (from - window_start).num_milliseconds();
                    let steps = (elapsed + definition.interval - 1) / definition.interval;
                    let candidate = window_start + Duration::milliseconds(steps * definition.interval);
                    if candidate < window_end {
                        return Some(candidate);
                    }
                }
            }
            AlarmKind::End => {
                let Some(window_end) =
                    clock.local_instant(date, definition.end_in_day_normalized())
                else {
                    continue;
                };
                if window_end >= from {
                    return Some(window_end);
                }
            }
        }
    }
    None
}

/// Outcome of one full re-synchronization pass. `failed` lists loops the
/// facility refused to arm; those stay unarmed until the next pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub armed: usize,
    pub cancelled: usize,
    pub failed: Vec<i64>,
}

pub struct AlarmScheduler<F: AlarmFacility> {
    facility: Arc<F>,
    clock: Clock,
    event_log: Arc<EventLog>,
    pending: Mutex<PendingRegistry>,
}

impl<F: AlarmFacility> AlarmScheduler<F> {
    pub fn new(facility: Arc<F>, clock: Clock, event_log: Arc<EventLog>) -> Self {
        Self {
            facility,
            clock,
            event_log,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub async fn pending_alarms(&self) -> Vec<PendingAlarm> {
        let pending = self.pending.lock().await;
        let mut alarms: Vec<PendingAlarm> = pending
            .iter()
            .map(|(&(loop_id, kind), &fires_at)| PendingAlarm {
                loop_id,
                kind,
                fires_at,
            })
            .collect();
        alarms.sort_by_key(|alarm| (alarm.loop_id, alarm.kind.as_str()));
        alarms
    }

    /// Cancels any pending alarms for the loop and arms fresh ones. A
    /// disabled loop ends up with nothing armed. Facility rejections are
    /// logged, leave that boundary unarmed, and surface as a best-effort
    /// error.
    pub async fn reserve_alarm(&self, definition: &LoopDefinition) -> Result<(), EngineError> {
        let mut pending = self.pending.lock().await;
        self.cancel_locked(&mut pending, definition.id).await;

        if !definition.enabled {
            return Ok(());
        }

        let from = self.clock.now();
        let mut first_error = None;
        for kind in [AlarmKind::Start, AlarmKind::End] {
            let Some(fires_at) = compute_next_fire_time(definition, &self.clock, from, kind) else {
                continue;
            };
            match self.facility.arm_at(definition.id, kind, fires_at).await {
                Ok(()) => {
                    pending.insert((definition.id, kind), fires_at);
                }
                Err(error) => {
                    self.event_log.error(
                        "reserve_alarm",
                        &format!(
                            "loop {} {} arm rejected: {error}",
                            definition.id,
                            kind.as_str()
                        ),
                    );
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        match first_error {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }

    /// Idempotent: cancelling a loop with nothing pending is a no-op.
    pub async fn cancel_alarm(&self, loop_id: i64) {
        let mut pending = self.pending.lock().await;
        self.cancel_locked(&mut pending, loop_id).await;
    }

    async fn cancel_locked(&self, pending: &mut MutexGuard<'_, PendingRegistry>, loop_id: i64) {
        for kind in [AlarmKind::Start, AlarmKind::End] {
            pending.remove(&(loop_id, kind));
            if let Err(error) = self.facility.cancel(loop_id, kind).await {
                self.event_log.error(
                    "cancel_alarm",
                    &format!("loop {loop_id} {} cancel rejected: {error}", kind.as_str()),
                );
            }
        }
    }

    /// Full re-synchronization, run on boot, timezone change, or after a
    /// data edit. Re-arms every enabled loop and cancels every disabled
    /// one; a failure on one loop never stops the pass. Safe to call
    /// redundantly since arming always cancels first.
    pub async fn sync_alarms(&self, definitions: &[LoopDefinition]) -> SyncReport {
        let mut report = SyncReport::default();
        for definition in definitions {
            if definition.enabled {
                match self.reserve_alarm(definition).await {
                    Ok(()) => report.armed += 1,
                    Err(_) => report.failed.push(definition.id),
                }
            } else {
                self.cancel_alarm(definition.id).await;
                report.cancelled += 1;
            }
        }
        self.event_log.info(
            "sync_alarms",
            &format!(
                "pass complete: {} armed, {} cancelled, {} failed",
                report.armed,
                report.cancelled,
                report.failed.len()
            ),
        );
        report
    }
}
