//! RSS generation for the comic history.
//!
//! - [`rss`] - RSS 2.0 rendering via `quick-xml`'s event writer

mod rss;

pub use rss::{render_feed, FeedChannel, FeedError};
