pub mod alarm_scheduler;
pub mod bootstrap;
pub mod classifier;
pub mod loops;
pub mod rollover;
pub mod stats;
pub mod timeline;
