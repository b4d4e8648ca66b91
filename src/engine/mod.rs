//! Price reconciliation pipeline: merge, decide, per-range state machine,
//! and the outer orchestration loop.

pub mod decide;
pub mod merge;
pub mod orchestrator;
pub mod range;
