mod history;
mod types;

pub use types::{ComicRecord, HistoryStore, StoreError};
