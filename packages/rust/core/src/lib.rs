//! Core update logic for postfeed.
//!
//! This crate owns post identity, the known-ID set, corpus extension, and the
//! update orchestrator that drives the feed, NLP, and storage collaborators,
//! once or on a schedule.

pub mod corpus;
pub mod error;
pub mod identity;
pub mod known_ids;
pub mod repair;
pub mod schedule;
pub mod update;

#[cfg(test)]
mod testing;

pub use error::UpdateError;
pub use identity::identifier_of;
pub use repair::{RepairReport, repair_corpus};
pub use schedule::{WatchOutcome, WatchSchedule, watch};
pub use update::{
    Collaborators, SilentProgress, UpdateConfig, UpdateProgress, UpdateReport, run_update,
};
