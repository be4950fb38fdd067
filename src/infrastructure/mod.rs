pub mod alarm_facility;
pub mod clock;
pub mod config;
pub mod error;
pub mod event_log;
pub mod ledger_store;
pub mod loop_store;
pub mod storage;
