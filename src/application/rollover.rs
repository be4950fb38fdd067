//! Daily rollover: materializes the ledger row for every loop when the
//! local calendar day changes. Runs once at startup and then from a
//! one-shot timer re-armed for each next local-midnight boundary, never a
//! poll loop.

use crate::application::classifier::is_active_day;
use crate::application::loops::ChangeEvent;
use crate::domain::models::{LedgerEntry, ResponseState};
use crate::infrastructure::clock::Clock;
use crate::infrastructure::error::EngineError;
use crate::infrastructure::event_log::EventLog;
use crate::infrastructure::ledger_store::LedgerStore;
use crate::infrastructure::loop_store::LoopStore;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::sleep;

pub struct RolloverService<L: LoopStore, G: LedgerStore> {
    loop_store: Arc<L>,
    ledger_store: Arc<G>,
    clock: Clock,
    event_log: Arc<EventLog>,
    events: broadcast::Sender<ChangeEvent>,
}

impl<L: LoopStore, G: LedgerStore> RolloverService<L, G> {
    pub fn new(
        loop_store: Arc<L>,
        ledger_store: Arc<G>,
        clock: Clock,
        event_log: Arc<EventLog>,
        events: broadcast::Sender<ChangeEvent>,
    ) -> Self {
        Self {
            loop_store,
            ledger_store,
            clock,
            event_log,
            events,
        }
    }

    /// Creates today's ledger rows for every known loop: NO_RESPONSE when
    /// the loop is enabled and active today, DISABLED otherwise so the loop
    /// stays out of response-rate denominators. Existing rows are never
    /// overwritten, which makes the rollover safe to repeat within a day.
    pub fn roll_over(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        let today = self.clock.local_date(now);
        let mut created = 0;

        for definition in self.loop_store.get_all()? {
            if self.ledger_store.get(definition.id, today)?.is_some() {
                continue;
            }
            let state = if definition.enabled && is_active_day(&definition, today) {
                ResponseState::NoResponse
            } else {
                ResponseState::Disabled
            };
            self.ledger_store.upsert(&LedgerEntry {
                loop_id: definition.id,
                day: today,
                state,
            })?;
            created += 1;
        }

        if created > 0 {
            let _ = self.events.send(ChangeEvent::DayRolledOver(today));
        }
        Ok(created)
    }

    /// Removes stale rows still awaiting a response before the given day.
    pub fn clear_no_response_backlog(&self, before: NaiveDate) -> Result<u64, EngineError> {
        self.ledger_store.clear_no_response(Some(before))
    }

    pub fn next_boundary(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.clock.local_midnight_after(after)
    }

    /// Startup rollover, then one-shot sleeps to each midnight boundary.
    /// Rollover failures are logged and retried at the next boundary.
    pub async fn run(&self) {
        loop {
            let now = self.clock.now();
            if let Err(error) = self.roll_over(now) {
                self.event_log
                    .error("roll_over", &format!("rollover failed: {error}"));
            }

            let Some(boundary) = self.next_boundary(now) else {
                self.event_log
                    .error("roll_over", "no next midnight boundary; rollover timer stopped");
                return;
            };
            let wait = (boundary - self.clock.now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            sleep(wait).await;
        }
    }
}
