use super::runner::{run_for_date, OutputPaths, RunOutcome};
use crate::config::Config;
use crate::lookup::ComicSource;
use crate::util::format_comic_date;
use chrono::Local;
use std::future::Future;
use std::time::Duration;

/// Delay between polling runs.
pub const POLL_INTERVAL: Duration = Duration::from_secs(600);

/// Run for "today" every `interval` until `shutdown` resolves.
///
/// A failed run is logged and the loop carries on. `shutdown` is only
/// observed between runs, so a run in progress always completes. Returns
/// the number of runs performed.
pub async fn poll<S, F>(
    config: &Config,
    source: &S,
    paths: &OutputPaths,
    interval: Duration,
    shutdown: F,
) -> usize
where
    S: ComicSource + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut runs = 0;

    loop {
        let now = Local::now();
        let date = format_comic_date(now.date_naive());
        match run_for_date(config, source, paths, &date, now).await {
            Ok(RunOutcome::Published { changes, .. }) => {
                tracing::info!(date = %date, changes = changes, "Poll published new comics");
            }
            Ok(RunOutcome::Unchanged) => {
                tracing::debug!(date = %date, "Poll found nothing new");
            }
            Err(e) => {
                tracing::error!(date = %date, error = %e, "Poll run failed");
            }
        }
        runs += 1;

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!(runs = runs, "Shutdown requested, stopping poll loop");
                return runs;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
