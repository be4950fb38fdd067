//! Application surface over the stores, classifier, layout engine, and
//! scheduler: the operations a front end calls to edit loops, record
//! responses, and read the day's activity views.

use crate::application::alarm_scheduler::{AlarmScheduler, SyncReport};
use crate::application::classifier::{
    count_active, count_due_today, count_remaining_today, is_active_now, is_due_today,
    loops_awaiting_yesterday_response,
};
use crate::application::stats::{done_rate_percent, response_counts};
use crate::application::timeline::{layout_tracks, TimelineSpan};
use crate::domain::models::{LedgerEntry, LoopDefinition, ResponseState};
use crate::infrastructure::alarm_facility::AlarmFacility;
use crate::infrastructure::clock::Clock;
use crate::infrastructure::error::EngineError;
use crate::infrastructure::ledger_store::LedgerStore;
use crate::infrastructure::loop_store::LoopStore;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Emitted after every mutation so reactive callers can recompute their
/// activity views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    LoopUpserted(i64),
    LoopDeleted(i64),
    LedgerUpdated { loop_id: i64, day: NaiveDate },
    DayRolledOver(NaiveDate),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OverviewResponse {
    pub active_now: Vec<i64>,
    pub due_today: Vec<i64>,
    pub awaiting_yesterday: Vec<i64>,
    pub active_count: usize,
    pub due_today_count: usize,
    pub remaining_today_count: usize,
    pub done_rate_percent: u32,
}

pub struct LoopService<L, G, F>
where
    L: LoopStore,
    G: LedgerStore,
    F: AlarmFacility,
{
    loop_store: Arc<L>,
    ledger_store: Arc<G>,
    scheduler: Arc<AlarmScheduler<F>>,
    clock: Clock,
    track_capacity: usize,
    events: broadcast::Sender<ChangeEvent>,
}

impl<L, G, F> LoopService<L, G, F>
where
    L: LoopStore,
    G: LedgerStore,
    F: AlarmFacility,
{
    pub fn new(
        loop_store: Arc<L>,
        ledger_store: Arc<G>,
        scheduler: Arc<AlarmScheduler<F>>,
        clock: Clock,
        track_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            loop_store,
            ledger_store,
            scheduler,
            clock,
            track_capacity,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Shared with the rollover service so both publish on one channel.
    pub fn events(&self) -> broadcast::Sender<ChangeEvent> {
        self.events.clone()
    }

    /// Validates, persists (insert or full replace), and re-arms the
    /// loop's alarms. Validation failures reject synchronously before
    /// anything is written; an alarm facility rejection leaves the loop
    /// unarmed but does not fail the edit.
    pub async fn upsert_loop(
        &self,
        mut definition: LoopDefinition,
    ) -> Result<LoopDefinition, EngineError> {
        definition.validate().map_err(EngineError::Validation)?;

        let id = self.loop_store.upsert(&definition)?;
        definition.id = id;

        // Arm failures are logged by the scheduler; the loop stays unarmed
        // until the next sync pass.
        let _ = self.scheduler.reserve_alarm(&definition).await;

        let _ = self.events.send(ChangeEvent::LoopUpserted(id));
        Ok(definition)
    }

    /// Removes the definition, cascades its ledger rows, and cancels its
    /// pending alarms.
    pub async fn delete_loop(&self, id: i64) -> Result<bool, EngineError> {
        let existed = self.loop_store.delete(id)?;
        self.ledger_store.delete_for_loop(id)?;
        self.scheduler.cancel_alarm(id).await;

        if existed {
            let _ = self.events.send(ChangeEvent::LoopDeleted(id));
        }
        Ok(existed)
    }

    pub fn mark_done(&self, loop_id: i64, day: NaiveDate) -> Result<LedgerEntry, EngineError> {
        self.record_response(loop_id, day, ResponseState::Done)
    }

    pub fn mark_skip(&self, loop_id: i64, day: NaiveDate) -> Result<LedgerEntry, EngineError> {
        self.record_response(loop_id, day, ResponseState::Skip)
    }

    fn record_response(
        &self,
        loop_id: i64,
        day: NaiveDate,
        state: ResponseState,
    ) -> Result<LedgerEntry, EngineError> {
        if self.loop_store.get(loop_id)?.is_none() {
            return Err(EngineError::NotFound(format!("loop {loop_id}")));
        }

        let entry = LedgerEntry {
            loop_id,
            day,
            state,
        };
        entry.validate().map_err(EngineError::Validation)?;
        self.ledger_store.upsert(&entry)?;

        let _ = self.events.send(ChangeEvent::LedgerUpdated { loop_id, day });
        Ok(entry)
    }

    pub fn overview(&self) -> Result<OverviewResponse, EngineError> {
        let now = self.clock.now();
        let today = self.clock.local_date(now);
        let definitions = self.loop_store.get_all()?;

        let today_entries = self.ledger_store.list_for_day(today)?;
        let yesterday_entries = match today.pred_opt() {
            Some(yesterday) => self.ledger_store.list_for_day(yesterday)?,
            None => Vec::new(),
        };

        let active_now: Vec<i64> = definitions
            .iter()
            .filter(|definition| is_active_now(definition, &self.clock, now))
            .map(|definition| definition.id)
            .collect();
        let due_today: Vec<i64> = definitions
            .iter()
            .filter(|definition| is_due_today(definition, &self.clock, now))
            .map(|definition| definition.id)
            .collect();
        let awaiting_yesterday: Vec<i64> =
            loops_awaiting_yesterday_response(&definitions, &yesterday_entries, &self.clock, now)
                .into_iter()
                .map(|definition| definition.id)
                .collect();

        let counts = response_counts(self.ledger_store.as_ref(), None, None, None)?;

        Ok(OverviewResponse {
            active_count: count_active(&definitions, &self.clock, now),
            due_today_count: count_due_today(&definitions, &self.clock, now),
            remaining_today_count: count_remaining_today(
                &definitions,
                &today_entries,
                &self.clock,
                now,
            ),
            done_rate_percent: done_rate_percent(counts),
            active_now,
            due_today,
            awaiting_yesterday,
        })
    }

    pub fn loop_done_rate(&self, loop_id: i64) -> Result<u32, EngineError> {
        let counts = response_counts(self.ledger_store.as_ref(), Some(loop_id), None, None)?;
        Ok(done_rate_percent(counts))
    }

    /// Today's due loops packed into display tracks, in store order.
    pub fn timeline_today(&self) -> Result<Vec<Vec<TimelineSpan>>, EngineError> {
        let now = self.clock.now();
        let spans: Vec<TimelineSpan> = self
            .loop_store
            .get_all()?
            .iter()
            .filter(|definition| is_due_today(definition, &self.clock, now))
            .map(TimelineSpan::for_loop)
            .collect();
        Ok(layout_tracks(&spans, self.track_capacity))
    }

    /// Full alarm re-synchronization over the current definition set.
    pub async fn sync_alarms(&self) -> Result<SyncReport, EngineError> {
        let definitions = self.loop_store.get_all()?;
        Ok(self.scheduler.sync_alarms(&definitions).await)
    }
}
