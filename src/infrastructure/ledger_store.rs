use crate::domain::models::{LedgerEntry, ResponseState};
use crate::infrastructure::error::EngineError;
use crate::infrastructure::storage::open_connection;
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Aggregation filter for [`LedgerStore::count_where`]. An empty state list
/// matches every state; date bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    pub loop_id: Option<i64>,
    pub states: Vec<ResponseState>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl LedgerQuery {
    pub fn for_loop(loop_id: i64) -> Self {
        Self {
            loop_id: Some(loop_id),
            ..Self::default()
        }
    }

    pub fn with_states(mut self, states: &[ResponseState]) -> Self {
        self.states = states.to_vec();
        self
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if self.loop_id.is_some_and(|loop_id| loop_id != entry.loop_id) {
            return false;
        }
        if self.from.is_some_and(|from| entry.day < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.day > to) {
            return false;
        }
        self.states.is_empty() || self.states.contains(&entry.state)
    }
}

pub trait LedgerStore: Send + Sync {
    fn get(&self, loop_id: i64, day: NaiveDate) -> Result<Option<LedgerEntry>, EngineError>;
    /// Replace-on-conflict by `(loop_id, day)`.
    fn upsert(&self, entry: &LedgerEntry) -> Result<(), EngineError>;
    fn delete(&self, loop_id: i64, day: NaiveDate) -> Result<(), EngineError>;
    fn delete_for_loop(&self, loop_id: i64) -> Result<(), EngineError>;
    fn list_for_loop(&self, loop_id: i64) -> Result<Vec<LedgerEntry>, EngineError>;
    fn list_for_day(&self, day: NaiveDate) -> Result<Vec<LedgerEntry>, EngineError>;
    fn count_where(&self, query: &LedgerQuery) -> Result<u64, EngineError>;
    /// Removes rows still in `NO_RESPONSE`, optionally only before a day.
    fn clear_no_response(&self, before: Option<NaiveDate>) -> Result<u64, EngineError>;
}

#[derive(Debug, Clone)]
pub struct SqliteLedgerStore {
    db_path: PathBuf,
}

impl SqliteLedgerStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, String)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    }

    fn decode(raw: (i64, String, String)) -> Result<LedgerEntry, EngineError> {
        let (loop_id, day_raw, state_raw) = raw;
        let day = NaiveDate::parse_from_str(&day_raw, DAY_FORMAT).map_err(|error| {
            EngineError::InvalidConfig(format!("invalid completion_ledger.day '{day_raw}': {error}"))
        })?;
        let state = ResponseState::parse(&state_raw).map_err(EngineError::InvalidConfig)?;
        Ok(LedgerEntry {
            loop_id,
            day,
            state,
        })
    }

    fn encode_day(day: NaiveDate) -> String {
        day.format(DAY_FORMAT).to_string()
    }
}

impl LedgerStore for SqliteLedgerStore {
    fn get(&self, loop_id: i64, day: NaiveDate) -> Result<Option<LedgerEntry>, EngineError> {
        let connection = open_connection(&self.db_path)?;
        let row = connection
            .query_row(
                "SELECT loop_id, day, state FROM completion_ledger WHERE loop_id = ?1 AND day = ?2",
                params![loop_id, Self::encode_day(day)],
                Self::map_row,
            )
            .optional()?;
        row.map(Self::decode).transpose()
    }

    fn upsert(&self, entry: &LedgerEntry) -> Result<(), EngineError> {
        let connection = open_connection(&self.db_path)?;
        connection.execute(
            "INSERT INTO completion_ledger (loop_id, day, state)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(loop_id, day) DO UPDATE SET state = excluded.state",
            params![entry.loop_id, Self::encode_day(entry.day), entry.state.as_str()],
        )?;
        Ok(())
    }

    fn delete(&self, loop_id: i64, day: NaiveDate) -> Result<(), EngineError> {
        let connection = open_connection(&self.db_path)?;
        connection.execute(
            "DELETE FROM completion_ledger WHERE loop_id = ?1 AND day = ?2",
            params![loop_id, Self::encode_day(day)],
        )?;
        Ok(())
    }

    fn delete_for_loop(&self, loop_id: i64) -> Result<(), EngineError> {
        let connection = open_connection(&self.db_path)?;
        connection.execute(
            "DELETE FROM completion_ledger WHERE loop_id = ?1",
            params![loop_id],
        )?;
        Ok(())
    }

    fn list_for_loop(&self, loop_id: i64) -> Result<Vec<LedgerEntry>, EngineError> {
        let connection = open_connection(&self.db_path)?;
        let mut statement = connection.prepare(
            "SELECT loop_id, day, state FROM completion_ledger WHERE loop_id = ?1 ORDER BY day",
        )?;
        let rows = statement.query_map(params![loop_id], Self::map_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(Self::decode(row?)?);
        }
        Ok(entries)
    }

    fn list_for_day(&self, day: NaiveDate) -> Result<Vec<LedgerEntry>, EngineError> {
        let connection = open_connection(&self.db_path)?;
        let mut statement = connection.prepare(
            "SELECT loop_id, day, state FROM completion_ledger WHERE day = ?1 ORDER BY loop_id",
        )?;
        let rows = statement.query_map(params![Self::encode_day(day)], Self::map_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(Self::decode(row?)?);
        }
        Ok(entries)
    }

    fn count_where(&self, query: &LedgerQuery) -> Result<u64, EngineError> {
        let mut sql = String::from(
            "SELECT COUNT(*) FROM completion_ledger
             WHERE (?1 IS NULL OR loop_id = ?1)
               AND (?2 IS NULL OR day >= ?2)
               AND (?3 IS NULL OR day <= ?3)",
        );
        if !query.states.is_empty() {
            // States come from a closed enum, safe to inline.
            let list = query
                .states
                .iter()
                .map(|state| format!("'{}'", state.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" AND state IN ({list})"));
        }

        let connection = open_connection(&self.db_path)?;
        let count: i64 = connection.query_row(
            &sql,
            params![
                query.loop_id,
                query.from.map(Self::encode_day),
                query.to.map(Self::encode_day),
            ],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn clear_no_response(&self, before: Option<NaiveDate>) -> Result<u64, EngineError> {
        let connection = open_connection(&self.db_path)?;
        let removed = connection.execute(
            "DELETE FROM completion_ledger
             WHERE state = 'no_response' AND (?1 IS NULL OR day < ?1)",
            params![before.map(Self::encode_day)],
        )?;
        Ok(removed as u64)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    entries: Mutex<HashMap<(i64, NaiveDate), LedgerEntry>>,
}

impl InMemoryLedgerStore {
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(i64, NaiveDate), LedgerEntry>>, EngineError>
    {
        self.entries
            .lock()
            .map_err(|error| EngineError::Internal(format!("ledger store lock poisoned: {error}")))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn get(&self, loop_id: i64, day: NaiveDate) -> Result<Option<LedgerEntry>, EngineError> {
        Ok(self.lock()?.get(&(loop_id, day)).cloned())
    }

    fn upsert(&self, entry: &LedgerEntry) -> Result<(), EngineError> {
        self.lock()?
            .insert((entry.loop_id, entry.day), entry.clone());
        Ok(())
    }

    fn delete(&self, loop_id: i64, day: NaiveDate) -> Result<(), EngineError> {
        self.lock()?.remove(&(loop_id, day));
        Ok(())
    }

    fn delete_for_loop(&self, loop_id: i64) -> Result<(), EngineError> {
        self.lock()?.retain(|(entry_loop_id, _), _| *entry_loop_id != loop_id);
        Ok(())
    }

    fn list_for_loop(&self, loop_id: i64) -> Result<Vec<LedgerEntry>, EngineError> {
        let entries = self.lock()?;
        let mut matching: Vec<LedgerEntry> = entries
            .values()
            .filter(|entry| entry.loop_id == loop_id)
            .cloned()
            .collect();
        matching.sort_by_key(|entry| entry.day);
        Ok(matching)
    }

    fn list_for_day(&self, day: NaiveDate) -> Result<Vec<LedgerEntry>, EngineError> {
        let entries = self.lock()?;
        let mut matching: Vec<LedgerEntry> = entries
            .values()
            .filter(|entry| entry.day == day)
            .cloned()
            .collect();
        matching.sort_by_key(|entry| entry.loop_id);
        Ok(matching)
    }

    fn count_where(&self, query: &LedgerQuery) -> Result<u64, EngineError> {
        let entries = self.lock()?;
        Ok(entries.values().filter(|entry| query.matches(entry)).count() as u64)
    }

    fn clear_no_response(&self, before: Option<NaiveDate>) -> Result<u64, EngineError> {
        let mut entries = self.lock()?;
        let before_len = entries.len();
        entries.retain(|_, entry| {
            entry.state != ResponseState::NoResponse
                || before.is_some_and(|boundary| entry.day >= boundary)
        });
        Ok((before_len - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::initialize_database;

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, DAY_FORMAT).expect("valid date")
    }

    fn entry(loop_id: i64, date: &str, state: ResponseState) -> LedgerEntry {
        LedgerEntry {
            loop_id,
            day: day(date),
            state,
        }
    }

    fn seed(store: &dyn LedgerStore) {
        store
            .upsert(&entry(1, "2026-02-14", ResponseState::Done))
            .expect("seed");
        store
            .upsert(&entry(1, "2026-02-15", ResponseState::Skip))
            .expect("seed");
        store
            .upsert(&entry(1, "2026-02-16", ResponseState::NoResponse))
            .expect("seed");
        store
            .upsert(&entry(2, "2026-02-16", ResponseState::Disabled))
            .expect("seed");
    }

    fn assert_store_contract(store: &dyn LedgerStore) {
        seed(store);

        // Upsert replaces on conflict.
        store
            .upsert(&entry(1, "2026-02-16", ResponseState::Done))
            .expect("replace");
        let replaced = store
            .get(1, day("2026-02-16"))
            .expect("get")
            .expect("exists");
        assert_eq!(replaced.state, ResponseState::Done);

        let for_loop = store.list_for_loop(1).expect("list for loop");
        assert_eq!(for_loop.len(), 3);
        assert!(for_loop.windows(2).all(|pair| pair[0].day < pair[1].day));

        let for_day = store.list_for_day(day("2026-02-16")).expect("list for day");
        assert_eq!(for_day.len(), 2);

        let done_or_skip = store
            .count_where(
                &LedgerQuery::for_loop(1).with_states(&[ResponseState::Done, ResponseState::Skip]),
            )
            .expect("count");
        assert_eq!(done_or_skip, 3);

        let ranged = store
            .count_where(&LedgerQuery {
                loop_id: Some(1),
                states: Vec::new(),
                from: Some(day("2026-02-15")),
                to: Some(day("2026-02-16")),
            })
            .expect("count range");
        assert_eq!(ranged, 2);

        store.delete_for_loop(1).expect("cascade");
        assert_eq!(store.list_for_loop(1).expect("list").len(), 0);
        assert!(store.get(2, day("2026-02-16")).expect("get").is_some());
    }

    #[test]
    fn sqlite_store_honors_the_contract() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("habitloop.sqlite");
        initialize_database(&db_path).expect("initialize schema");
        let store = SqliteLedgerStore::new(&db_path);
        assert_store_contract(&store);
    }

    #[test]
    fn in_memory_store_honors_the_contract() {
        let store = InMemoryLedgerStore::default();
        assert_store_contract(&store);
    }

    #[test]
    fn clear_no_response_removes_only_unanswered_rows() {
        let store = InMemoryLedgerStore::default();
        seed(&store);

        let removed = store.clear_no_response(None).expect("sweep");
        assert_eq!(removed, 1);
        assert!(store.get(1, day("2026-02-16")).expect("get").is_none());
        // Answered and disabled rows survive the sweep.
        assert!(store.get(1, day("2026-02-14")).expect("get").is_some());
        assert!(store.get(2, day("2026-02-16")).expect("get").is_some());
    }

    #[test]
    fn clear_no_response_respects_day_boundary() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("habitloop.sqlite");
        initialize_database(&db_path).expect("initialize schema");
        let store = SqliteLedgerStore::new(&db_path);
        store
            .upsert(&entry(1, "2026-02-15", ResponseState::NoResponse))
            .expect("seed");
        store
            .upsert(&entry(1, "2026-02-16", ResponseState::NoResponse))
            .expect("seed");

        let removed = store
            .clear_no_response(Some(day("2026-02-16")))
            .expect("sweep");
        assert_eq!(removed, 1);
        assert!(store.get(1, day("2026-02-15")).expect("get").is_none());
        assert!(store.get(1, day("2026-02-16")).expect("get").is_some());
    }
}
