//! Remote lookups for comic identities and image metadata.
//!
//! The sync engine only talks to a [`ComicSource`]; [`GoComicsClient`] is the
//! production implementation. Tests plug in their own
//! sources.

mod gocomics;

pub use gocomics::{FetchError, GoComicsClient};

use async_trait::async_trait;

/// MIME type reported when the image lookup fails or omits `Content-Type`.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";
/// Byte length reported when the image lookup fails or omits `Content-Length`.
pub const DEFAULT_LENGTH: &str = "0";

/// Image identifier and title scraped for one (author, date).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicIdentity {
    pub image_id: String,
    pub title: String,
}

/// Resolved image location plus whatever the remote told us about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    pub url: String,
    pub mime_type: String,
    pub length: String,
    /// True when the metadata request failed and defaults were substituted.
    pub degraded: bool,
}

impl ImageMetadata {
    /// Metadata with the default MIME type and length for `url`.
    pub fn defaulted(url: String) -> Self {
        Self {
            url,
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            length: DEFAULT_LENGTH.to_string(),
            degraded: true,
        }
    }
}

/// A publisher that can be asked for comics.
///
/// Neither method fails: transport and parse problems are logged by the
/// implementation and collapse into `None` / defaulted metadata.
#[async_trait]
pub trait ComicSource: Send + Sync {
    /// Image id and title for `author` on `date` (`YYYY/MM/DD`).
    async fn fetch_comic_identity(&self, date: &str, author: &str) -> Option<ComicIdentity>;

    /// Image URL, MIME type, and byte length for `image_id`.
    async fn fetch_image_metadata(&self, image_id: &str) -> ImageMetadata;
}
