use crate::domain::models::AlarmKind;
use crate::infrastructure::error::EngineError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// External OS-level timer primitive. Calls are best-effort; the scheduler
/// treats a rejection as "loop left unarmed" and keeps going.
#[async_trait]
pub trait AlarmFacility: Send + Sync {
    async fn arm_at(
        &self,
        loop_id: i64,
        kind: AlarmKind,
        fires_at: DateTime<Utc>,
    ) -> Result<(), EngineError>;

    async fn cancel(&self, loop_id: i64, kind: AlarmKind) -> Result<(), EngineError>;
}

/// Facility that accepts everything and does nothing, for headless runs.
#[derive(Debug, Default)]
pub struct NoopAlarmFacility;

#[async_trait]
impl AlarmFacility for NoopAlarmFacility {
    async fn arm_at(
        &self,
        _loop_id: i64,
        _kind: AlarmKind,
        _fires_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    async fn cancel(&self, _loop_id: i64, _kind: AlarmKind) -> Result<(), EngineError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmCommand {
    Arm {
        loop_id: i64,
        kind: AlarmKind,
        fires_at: DateTime<Utc>,
    },
    Cancel {
        loop_id: i64,
        kind: AlarmKind,
    },
}

/// Facility that records every command it receives, in order.
#[derive(Debug, Default)]
pub struct RecordingAlarmFacility {
    commands: Mutex<Vec<AlarmCommand>>,
}

impl RecordingAlarmFacility {
    pub fn commands(&self) -> Vec<AlarmCommand> {
        self.commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }

    fn record(&self, command: AlarmCommand) {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command);
        }
    }
}

#[async_trait]
impl AlarmFacility for RecordingAlarmFacility {
    async fn arm_at(
        &self,
        loop_id: i64,
        kind: AlarmKind,
        fires_at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        self.record(AlarmCommand::Arm {
            loop_id,
            kind,
            fires_at,
        });
        Ok(())
    }

    async fn cancel(&self, loop_id: i64, kind: AlarmKind) -> Result<(), EngineError> {
        self.record(AlarmCommand::Cancel { loop_id, kind });
        Ok(())
    }
}
