//! Signal generation: strike selection, baseline capture, breakout entry.

pub mod baseline;
pub mod entry;
pub mod selector;

pub use baseline::{Baseline, BaselineState, BaselineTracker, BaselineUpdate, LegBaseline};
pub use entry::{breakout, EntryDecision, EntryEvaluator, EntrySignal};
pub use selector::{SelectedStrikes, StrikeSelector};
