//! In-memory [`ComicSource`] for unit tests.

use crate::lookup::{ComicIdentity, ComicSource, ImageMetadata};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Answers lookups from a fixed script and records every call.
///
/// Comics not in the script are unavailable; images not in the script get
/// degraded metadata at `https://assets.test/{id}`.
#[derive(Default)]
pub struct ScriptedSource {
    comics: HashMap<(String, String), ComicIdentity>,
    metadata: HashMap<String, ImageMetadata>,
    identity_requests: Mutex<Vec<(String, String)>>,
    metadata_requests: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comic(mut self, author: &str, date: &str, image_id: &str, title: &str) -> Self {
        self.comics.insert(
            (author.to_string(), date.to_string()),
            ComicIdentity {
                image_id: image_id.to_string(),
                title: title.to_string(),
            },
        );
        self
    }

    pub fn with_metadata(mut self, image_id: &str, url: &str, mime_type: &str, length: &str) -> Self {
        self.metadata.insert(
            image_id.to_string(),
            ImageMetadata {
                url: url.to_string(),
                mime_type: mime_type.to_string(),
                length: length.to_string(),
                degraded: false,
            },
        );
        self
    }

    /// `(author, date)` pairs passed to `fetch_comic_identity`, in call order.
    pub fn identity_requests(&self) -> Vec<(String, String)> {
        self.identity_requests.lock().unwrap().clone()
    }

    pub fn identity_calls(&self) -> usize {
        self.identity_requests.lock().unwrap().len()
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ComicSource for ScriptedSource {
    async fn fetch_comic_identity(&self, date: &str, author: &str) -> Option<ComicIdentity> {
        self.identity_requests
            .lock()
            .unwrap()
            .push((author.to_string(), date.to_string()));
        self.comics
            .get(&(author.to_string(), date.to_string()))
            .cloned()
    }

    async fn fetch_image_metadata(&self, image_id: &str) -> ImageMetadata {
        self.metadata_requests
            .lock()
            .unwrap()
            .push(image_id.to_string());
        self.metadata
            .get(image_id)
            .cloned()
            .unwrap_or_else(|| ImageMetadata::defaulted(format!("https://assets.test/{image_id}")))
    }
}
