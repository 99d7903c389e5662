use crate::storage::HistoryStore;
use crate::util::parse_comic_date;
use chrono::{DateTime, Local, TimeZone};

const SECONDS_PER_DAY: i64 = 24 * 3600;

/// Drop every record dated at or before `now - max_age_days`.
///
/// A record's date counts as local midnight of that day; it survives only
/// when that instant is strictly after the cutoff. Returns the number of
/// records removed. Applying the same window and `now` twice is a no-op.
pub fn prune(store: &mut HistoryStore, max_age_days: u32, now: DateTime<Local>) -> usize {
    let cutoff = now.timestamp() - i64::from(max_age_days) * SECONDS_PER_DAY;

    let removed = store.retain_records(|record| match record_timestamp(&record.date) {
        Some(ts) => ts > cutoff,
        None => {
            debug_assert!(false, "malformed record date {:?}", record.date);
            tracing::warn!(date = %record.date, "Keeping record with malformed date");
            true
        }
    });

    if removed > 0 {
        tracing::info!(removed = removed, max_age_days = max_age_days, "Pruned old comics");
    }
    removed
}

fn record_timestamp(date: &str) -> Option<i64> {
    let midnight = parse_comic_date(date)?.and_hms_opt(0, 0, 0)?;
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp())
}
