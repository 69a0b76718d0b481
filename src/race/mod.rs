//! Portfolio race
//!
//! Daily equity snapshots across the tracked accounts plus a benchmark
//! index, persisted to an append-only CSV, and the relative-performance
//! report computed from that history.

pub mod report;
pub mod store;

pub use report::{build_report, DailyChange, RacePeriod, RaceReport, RaceStanding, RaceSummary};
pub use store::{AccountSnapshot, HistoryRow, HistoryStore};
