//! Test infrastructure for the tracker import pipeline.
//!
//! Provides a shared metadata set, users and payload builders, plus helpers
//! to seed any [`TrackerStore`](dhis_tracker::store::TrackerStore).

pub mod fixtures;

// Re-export commonly used items
pub use fixtures::*;
