//! Activity and scheduling engine for recurring habit loops: weekly
//! recurrence with midnight-wrapping time windows, a per-day completion
//! ledger, timeline track layout, and alarm synchronization against a
//! pluggable facility.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::alarm_scheduler::{compute_next_fire_time, AlarmScheduler, SyncReport};
pub use application::bootstrap::{bootstrap_workspace, BootstrapResult};
pub use application::loops::{ChangeEvent, LoopService, OverviewResponse};
pub use application::rollover::RolloverService;
pub use application::timeline::{layout_tracks, TimelineSpan};
pub use domain::day_mask::DayMask;
pub use domain::models::{AlarmKind, LedgerEntry, LoopDefinition, ResponseState};
pub use infrastructure::clock::Clock;
pub use infrastructure::error::EngineError;
