use super::types::{HistoryStore, StoreError};
use crate::util::atomic_write;
use std::path::Path;

impl HistoryStore {
    /// Load the persisted history from `path`.
    ///
    /// - Missing file → empty store
    /// - Empty or whitespace-only file → empty store
    /// - Corrupt JSON or non-UTF-8 bytes → empty store (logged as a warning)
    /// - Any other I/O failure → `Err(StoreError::Io)`
    ///
    /// Author keys are trimmed on load; entries that collide after trimming
    /// are merged.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = match std::fs::read(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No history file found, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        if content.trim_ascii().is_empty() {
            tracing::debug!(path = %path.display(), "History file is empty, starting empty");
            return Ok(Self::new());
        }

        match serde_json::from_slice::<HistoryStore>(&content) {
            Ok(mut store) => {
                store.normalize_author_keys();
                tracing::debug!(
                    path = %path.display(),
                    records = store.record_count(),
                    "Loaded history"
                );
                Ok(store)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "History file is not valid JSON, starting empty"
                );
                Ok(Self::new())
            }
        }
    }

    /// Persist the full history to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(self)?;
        atomic_write(path, &json)?;
        tracing::debug!(
            path = %path.display(),
            records = self.record_count(),
            "Saved history"
        );
        Ok(())
    }
}
