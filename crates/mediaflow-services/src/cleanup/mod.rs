//! Retention sweep: deletes terminal media past their retention window, once a day.

pub mod schedule;
pub mod service;

pub use schedule::next_run_after;
pub use service::{CleanupService, CleanupSummary};
