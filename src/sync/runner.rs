use super::merge::merge_date;
use super::retention::prune;
use crate::config::Config;
use crate::feed::{render_feed, FeedChannel, FeedError};
use crate::lookup::ComicSource;
use crate::storage::{HistoryStore, StoreError};
use crate::util::{atomic_write, dates_back_from, format_comic_date};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that abort a single run.
///
/// Nothing is written when a run fails before persisting; atomic replace
/// guarantees no half-written files when it fails during persisting.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("Backfill of {days} days reaches before the earliest supported date")]
    BackfillOutOfRange { days: u32 },

    #[error("Failed to write feed file '{path}': {source}")]
    WriteFeed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a run reads and writes its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Persisted history (`feed.json`).
    pub store: PathBuf,
    /// Rendered RSS document (`feed.rss`).
    pub feed: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            store: dir.join("feed.json"),
            feed: dir.join("feed.rss"),
        }
    }
}

/// Result of one run for one target date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No new comics; neither file was touched.
    Unchanged,
    /// New comics were merged and both files rewritten.
    Published {
        changes: usize,
        pruned: usize,
        retained: usize,
    },
}

/// Fetch `date` for every configured author and publish if anything changed.
///
/// Order when there are changes: prune, render the feed from the pruned
/// store, write the feed, write the store. If the store write fails after
/// the feed was replaced, the feed is ahead of the store until the next run:
/// the missing records merge again as changes and both files are rewritten
/// from the same snapshot.
pub async fn run_for_date<S>(
    config: &Config,
    source: &S,
    paths: &OutputPaths,
    date: &str,
    now: DateTime<Local>,
) -> Result<RunOutcome, RunError>
where
    S: ComicSource + ?Sized,
{
    let mut store = HistoryStore::load(&paths.store)?;

    let changes = merge_date(&mut store, source, &config.authors, date).await;
    if changes == 0 {
        tracing::debug!(date = %date, "No new comics, skipping feed generation");
        return Ok(RunOutcome::Unchanged);
    }

    let pruned = prune(&mut store, config.max_age_days, now);

    let channel = FeedChannel::for_domain(&config.host_domain);
    let rss = render_feed(&channel, &store, now)?;

    atomic_write(&paths.feed, rss.as_bytes()).map_err(|source| RunError::WriteFeed {
        path: paths.feed.clone(),
        source,
    })?;
    store.save(&paths.store)?;

    let retained = store.record_count();
    tracing::info!(
        date = %date,
        changes = changes,
        pruned = pruned,
        retained = retained,
        "Published feed"
    );
    Ok(RunOutcome::Published {
        changes,
        pruned,
        retained,
    })
}

/// Result of the startup backfill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackfillOutcome {
    /// History already had records; backfill only runs on a fresh store.
    NotNeeded,
    Completed {
        /// Dates whose run published new comics.
        published: usize,
        /// Dates whose run failed (logged and skipped).
        failed: usize,
    },
}

/// Populate a fresh history with the `days` most recent dates, newest first.
///
/// Each date is a full independent run. A failing date is logged and the
/// next one still runs.
pub async fn backfill<S>(
    config: &Config,
    source: &S,
    paths: &OutputPaths,
    days: u32,
    now: DateTime<Local>,
) -> Result<BackfillOutcome, RunError>
where
    S: ComicSource + ?Sized,
{
    if !HistoryStore::load(&paths.store)?.is_empty() {
        return Ok(BackfillOutcome::NotNeeded);
    }

    let dates = dates_back_from(now.date_naive(), days)
        .ok_or(RunError::BackfillOutOfRange { days })?;

    tracing::info!(days = days, "No past entries found, backfilling");
    let mut published = 0;
    let mut failed = 0;
    for date in dates {
        let date = format_comic_date(date);
        tracing::info!(date = %date, "Backfilling comics");
        match run_for_date(config, source, paths, &date, now).await {
            Ok(RunOutcome::Published { .. }) => published += 1,
            Ok(RunOutcome::Unchanged) => {}
            Err(e) => {
                tracing::error!(date = %date, error = %e, "Backfill run failed");
                failed += 1;
            }
        }
    }

    Ok(BackfillOutcome::Completed { published, failed })
}
