//! Polls GoComics for daily strips and publishes them as an RSS feed.
//!
//! One run loads the persisted history, fetches any missing strip for each
//! configured author on the target date, and, only if something new arrived,
//! prunes old records and rewrites both the RSS feed and the history.

pub mod config;
pub mod feed;
pub mod lookup;
pub mod storage;
pub mod sync;
pub mod util;
