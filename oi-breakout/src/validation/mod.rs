//! Validation of incoming option-chain snapshots.

pub mod snapshot;

pub use snapshot::{CheckResult, SnapshotReport, SnapshotValidator};
