//! Incremental fetch-and-merge of comic history.
//!
//! - [`merge`] - per (author, date) state machine that decides whether to fetch
//! - [`retention`] - age-based pruning of stored records
//! - [`runner`] - one full run for a target date, plus the startup backfill
//! - [`scheduler`] - the supervised polling loop around [`run_for_date`]

mod merge;
mod retention;
mod runner;
mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use merge::{merge_author, merge_date, MergeStatus};
pub use retention::prune;
pub use runner::{backfill, run_for_date, BackfillOutcome, OutputPaths, RunError, RunOutcome};
pub use scheduler::{poll, POLL_INTERVAL};
