use crate::domain::day_mask::DayMask;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// One recurring activity. An `id` of 0 marks a definition that has not been
/// persisted yet; the store assigns the real id on upsert. Edits replace the
/// whole definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoopDefinition {
    pub id: i64,
    pub title: String,
    pub color: String,
    pub start_in_day: i64,
    pub end_in_day: i64,
    pub active_days: DayMask,
    pub interval: i64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub is_any_time: bool,
}

impl LoopDefinition {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.title, "loop.title")?;
        validate_time_of_day(self.start_in_day, "loop.start_in_day")?;
        validate_time_of_day(self.end_in_day, "loop.end_in_day")?;
        if self.interval < 0 {
            return Err("loop.interval must be >= 0".to_string());
        }
        if self.active_days.bits() > DayMask::MAX_BITS {
            return Err("loop.active_days is out of range 0..=127".to_string());
        }
        Ok(())
    }

    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }

    /// End offset shifted past 24h when the window wraps midnight. A window
    /// with `end_in_day <= start_in_day` crosses into the next day.
    pub fn end_in_day_normalized(&self) -> i64 {
        if self.end_in_day > self.start_in_day {
            self.end_in_day
        } else {
            self.end_in_day + DAY_MS
        }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end_in_day <= self.start_in_day
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResponseState {
    NoResponse,
    Done,
    Skip,
    Disabled,
}

impl ResponseState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoResponse => "no_response",
            Self::Done => "done",
            Self::Skip => "skip",
            Self::Disabled => "disabled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "no_response" => Ok(Self::NoResponse),
            "done" => Ok(Self::Done),
            "skip" => Ok(Self::Skip),
            "disabled" => Ok(Self::Disabled),
            other => Err(format!("unknown response state '{other}'")),
        }
    }
}

/// Completion record keyed by `(loop_id, day)`; last write wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub loop_id: i64,
    pub day: NaiveDate,
    pub state: ResponseState,
}

impl LedgerEntry {
    pub fn validate(&self) -> Result<(), String> {
        if self.loop_id <= 0 {
            return Err("ledger.loop_id must reference a persisted loop".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    Start,
    End,
}

impl AlarmKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
        }
    }
}

/// Scheduler-internal record of one armed timer. At most one may exist per
/// `(loop_id, kind)` at any time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingAlarm {
    pub loop_id: i64,
    pub kind: AlarmKind,
    pub fires_at: DateTime<Utc>,
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_time_of_day(value: i64, field_name: &str) -> Result<(), String> {
    if !(0..=DAY_MS).contains(&value) {
        return Err(format!("{field_name} must be within 0..=24h in milliseconds"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_loop() -> LoopDefinition {
        LoopDefinition {
            id: 1,
            title: "Morning stretch".to_string(),
            color: "#ff8800".to_string(),
            start_in_day: 9 * 60 * 60 * 1000,
            end_in_day: 10 * 60 * 60 * 1000,
            active_days: DayMask::WEEKDAYS,
            interval: 0,
            enabled: true,
            created_at: fixed_time("2026-02-16T08:00:00Z"),
            is_any_time: false,
        }
    }

    #[test]
    fn loop_validate_accepts_valid_definition() {
        assert!(sample_loop().validate().is_ok());
    }

    #[test]
    fn loop_validate_rejects_empty_title() {
        let mut loop_def = sample_loop();
        loop_def.title = "   ".to_string();
        assert!(loop_def.validate().is_err());
    }

    #[test]
    fn loop_validate_rejects_time_out_of_range() {
        let mut loop_def = sample_loop();
        loop_def.start_in_day = -1;
        assert!(loop_def.validate().is_err());

        let mut loop_def = sample_loop();
        loop_def.end_in_day = DAY_MS + 1;
        assert!(loop_def.validate().is_err());
    }

    #[test]
    fn loop_validate_rejects_negative_interval() {
        let mut loop_def = sample_loop();
        loop_def.interval = -1;
        assert!(loop_def.validate().is_err());
    }

    #[test]
    fn end_normalization_handles_midnight_wrap() {
        let mut loop_def = sample_loop();
        loop_def.start_in_day = 23 * 60 * 60 * 1000;
        loop_def.end_in_day = 60 * 60 * 1000;
        assert!(loop_def.wraps_midnight());
        assert_eq!(loop_def.end_in_day_normalized(), 25 * 60 * 60 * 1000);

        let plain = sample_loop();
        assert!(!plain.wraps_midnight());
        assert_eq!(plain.end_in_day_normalized(), plain.end_in_day);
    }

    #[test]
    fn response_state_round_trips_through_strings() {
        for state in [
            ResponseState::NoResponse,
            ResponseState::Done,
            ResponseState::Skip,
            ResponseState::Disabled,
        ] {
            assert_eq!(ResponseState::parse(state.as_str()), Ok(state));
        }
        assert!(ResponseState::parse("unknown").is_err());
    }

    #[test]
    fn domain_models_support_serde_roundtrip() {
        let loop_def = sample_loop();
        let entry = LedgerEntry {
            loop_id: 1,
            day: NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date"),
            state: ResponseState::Done,
        };

        let loop_roundtrip: LoopDefinition =
            serde_json::from_str(&serde_json::to_string(&loop_def).expect("serialize loop"))
                .expect("deserialize loop");
        let entry_roundtrip: LedgerEntry =
            serde_json::from_str(&serde_json::to_string(&entry).expect("serialize entry"))
                .expect("deserialize entry");

        assert_eq!(loop_roundtrip, loop_def);
        assert_eq!(entry_roundtrip, entry);
    }
}
