//! Small helpers shared across modules.
//!
//! - **Atomic writes**: replace a file without ever exposing a partial write
//! - **Comic dates**: the `YYYY/MM/DD` format used for records and page URLs

mod atomic;
mod date;

pub use atomic::atomic_write;
pub use date::{dates_back_from, format_comic_date, parse_comic_date, DATE_FORMAT};
