use crate::domain::day_mask::DayMask;
use crate::domain::models::LoopDefinition;
use crate::infrastructure::error::EngineError;
use crate::infrastructure::storage::open_connection;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

/// Definition store contract. Upsert inserts when the definition has no id
/// yet and fully replaces the stored row otherwise.
pub trait LoopStore: Send + Sync {
    fn get_all(&self) -> Result<Vec<LoopDefinition>, EngineError>;
    fn get(&self, id: i64) -> Result<Option<LoopDefinition>, EngineError>;
    fn upsert(&self, definition: &LoopDefinition) -> Result<i64, EngineError>;
    fn delete(&self, id: i64) -> Result<bool, EngineError>;
}

#[derive(Debug, Clone)]
pub struct SqliteLoopStore {
    db_path: PathBuf,
}

impl SqliteLoopStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, String, i64, i64, i64, i64, bool, String, bool)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
        ))
    }

    fn decode(
        raw: (i64, String, String, i64, i64, i64, i64, bool, String, bool),
    ) -> Result<LoopDefinition, EngineError> {
        let (id, title, color, start_in_day, end_in_day, active_days, interval, enabled, created_at_raw, is_any_time) =
            raw;

        let bits = u8::try_from(active_days).map_err(|_| {
            EngineError::InvalidConfig(format!("invalid loop_definitions.active_days {active_days}"))
        })?;
        let active_days = DayMask::from_bits(bits).map_err(EngineError::InvalidConfig)?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
            .map_err(|error| {
                EngineError::InvalidConfig(format!(
                    "invalid loop_definitions.created_at '{created_at_raw}': {error}"
                ))
            })?
            .with_timezone(&Utc);

        Ok(LoopDefinition {
            id,
            title,
            color,
            start_in_day,
            end_in_day,
            active_days,
            interval,
            enabled,
            created_at,
            is_any_time,
        })
    }
}

impl LoopStore for SqliteLoopStore {
    fn get_all(&self) -> Result<Vec<LoopDefinition>, EngineError> {
        let connection = open_connection(&self.db_path)?;
        let mut statement = connection.prepare(
            "SELECT id, title, color, start_in_day, end_in_day, active_days, interval_ms,
                    enabled, created_at, is_any_time
             FROM loop_definitions ORDER BY id",
        )?;
        let rows = statement.query_map([], Self::map_row)?;

        let mut definitions = Vec::new();
        for row in rows {
            definitions.push(Self::decode(row?)?);
        }
        Ok(definitions)
    }

    fn get(&self, id: i64) -> Result<Option<LoopDefinition>, EngineError> {
        let connection = open_connection(&self.db_path)?;
        let row = connection
            .query_row(
                "SELECT id, title, color, start_in_day, end_in_day, active_days, interval_ms,
                        enabled, created_at, is_any_time
                 FROM loop_definitions WHERE id = ?1",
                params![id],
                Self::map_row,
            )
            .optional()?;

        row.map(Self::decode).transpose()
    }

    fn upsert(&self, definition: &LoopDefinition) -> Result<i64, EngineError> {
        let connection = open_connection(&self.db_path)?;
        if definition.is_persisted() {
            connection.execute(
                "INSERT INTO loop_definitions
                     (id, title, color, start_in_day, end_in_day, active_days, interval_ms,
                      enabled, created_at, is_any_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                     title = excluded.title,
                     color = excluded.color,
                     start_in_day = excluded.start_in_day,
                     end_in_day = excluded.end_in_day,
                     active_days = excluded.active_days,
                     interval_ms = excluded.interval_ms,
                     enabled = excluded.enabled,
                     created_at = excluded.created_at,
                     is_any_time = excluded.is_any_time",
                params![
                    definition.id,
                    definition.title,
                    definition.color,
                    definition.start_in_day,
                    definition.end_in_day,
                    i64::from(definition.active_days.bits()),
                    definition.interval,
                    definition.enabled,
                    definition.created_at.to_rfc3339(),
                    definition.is_any_time,
                ],
            )?;
            Ok(definition.id)
        } else {
            connection.execute(
                "INSERT INTO loop_definitions
                     (title, color, start_in_day, end_in_day, active_days, interval_ms,
                      enabled, created_at, is_any_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    definition.title,
                    definition.color,
                    definition.start_in_day,
                    definition.end_in_day,
                    i64::from(definition.active_days.bits()),
                    definition.interval,
                    definition.enabled,
                    definition.created_at.to_rfc3339(),
                    definition.is_any_time,
                ],
            )?;
            Ok(connection.last_insert_rowid())
        }
    }

    fn delete(&self, id: i64) -> Result<bool, EngineError> {
        let connection = open_connection(&self.db_path)?;
        let deleted = connection.execute("DELETE FROM loop_definitions WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLoopStore {
    definitions: Mutex<HashMap<i64, LoopDefinition>>,
    next_id: AtomicI64,
}

impl InMemoryLoopStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<i64, LoopDefinition>>, EngineError> {
        self.definitions
            .lock()
            .map_err(|error| EngineError::Internal(format!("loop store lock poisoned: {error}")))
    }
}

impl LoopStore for InMemoryLoopStore {
    fn get_all(&self) -> Result<Vec<LoopDefinition>, EngineError> {
        let definitions = self.lock()?;
        let mut all: Vec<LoopDefinition> = definitions.values().cloned().collect();
        all.sort_by_key(|definition| definition.id);
        Ok(all)
    }

    fn get(&self, id: i64) -> Result<Option<LoopDefinition>, EngineError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    fn upsert(&self, definition: &LoopDefinition) -> Result<i64, EngineError> {
        let mut definitions = self.lock()?;
        let id = if definition.is_persisted() {
            self.next_id.fetch_max(definition.id, Ordering::Relaxed);
            definition.id
        } else {
            self.next_id.fetch_add(1, Ordering::Relaxed) + 1
        };
        let mut stored = definition.clone();
        stored.id = id;
        definitions.insert(id, stored);
        Ok(id)
    }

    fn delete(&self, id: i64) -> Result<bool, EngineError> {
        Ok(self.lock()?.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::initialize_database;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_loop() -> LoopDefinition {
        LoopDefinition {
            id: 0,
            title: "Evening reading".to_string(),
            color: "#3366cc".to_string(),
            start_in_day: 21 * 60 * 60 * 1000,
            end_in_day: 22 * 60 * 60 * 1000,
            active_days: DayMask::EVERYDAY,
            interval: 0,
            enabled: true,
            created_at: fixed_time("2026-02-16T08:00:00Z"),
            is_any_time: false,
        }
    }

    #[test]
    fn sqlite_store_round_trips_definitions() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("habitloop.sqlite");
        initialize_database(&db_path).expect("initialize schema");

        let store = SqliteLoopStore::new(&db_path);
        let id = store.upsert(&sample_loop()).expect("insert");
        assert!(id > 0);

        let mut stored = store.get(id).expect("get").expect("exists");
        assert_eq!(stored.title, "Evening reading");

        stored.title = "Evening reading (long)".to_string();
        stored.enabled = false;
        let replaced_id = store.upsert(&stored).expect("replace");
        assert_eq!(replaced_id, id);

        let reread = store.get(id).expect("get").expect("exists");
        assert_eq!(reread, stored);
        assert_eq!(store.get_all().expect("get all").len(), 1);

        assert!(store.delete(id).expect("delete"));
        assert!(!store.delete(id).expect("delete again"));
        assert!(store.get(id).expect("get").is_none());
    }

    #[test]
    fn in_memory_store_assigns_ids_and_orders_by_id() {
        let store = InMemoryLoopStore::default();
        let first = store.upsert(&sample_loop()).expect("insert first");
        let second = store.upsert(&sample_loop()).expect("insert second");
        assert!(second > first);

        let all = store.get_all().expect("get all");
        assert_eq!(all.len(), 2);
        assert!(all[0].id < all[1].id);
    }
}
