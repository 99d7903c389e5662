use crate::lookup::ComicSource;
use crate::storage::{ComicRecord, HistoryStore};

/// What happened to one (author, date) pair during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    /// A record for the date was already stored; nothing was fetched.
    Exists,
    /// A new record was fetched and appended.
    Added,
    /// The publisher had nothing usable; retried on the next run.
    Unavailable,
}

/// Bring one author up to date for `date`.
///
/// Only calls the source when the author has no record for `date`. A failed
/// image metadata lookup still produces a record with defaulted metadata.
pub async fn merge_author<S>(
    store: &mut HistoryStore,
    source: &S,
    author: &str,
    date: &str,
) -> MergeStatus
where
    S: ComicSource + ?Sized,
{
    let author = author.trim();

    if store.contains(author, date) {
        tracing::info!(author = %author, date = %date, "Comic already stored, skipping");
        return MergeStatus::Exists;
    }

    let identity = match source.fetch_comic_identity(date, author).await {
        Some(identity) if !identity.image_id.trim().is_empty() && !identity.title.trim().is_empty() => identity,
        _ => {
            tracing::info!(author = %author, date = %date, "No comic data available, skipping");
            return MergeStatus::Unavailable;
        }
    };

    let metadata = source.fetch_image_metadata(&identity.image_id).await;
    if metadata.degraded {
        tracing::warn!(
            author = %author,
            date = %date,
            image_id = %identity.image_id,
            "Storing comic with default image metadata"
        );
    }

    let added = store.insert(
        author,
        ComicRecord {
            title: identity.title,
            image_url: metadata.url,
            image_mime_type: metadata.mime_type,
            image_length: metadata.length,
            date: date.to_string(),
        },
    );

    if added {
        tracing::info!(author = %author, date = %date, "Stored new comic");
        MergeStatus::Added
    } else {
        MergeStatus::Exists
    }
}

/// Merge `date` for every author in order and return how many records were added.
///
/// Authors are independent: an unavailable comic for one never stops the rest.
pub async fn merge_date<S>(
    store: &mut HistoryStore,
    source: &S,
    authors: &[String],
    date: &str,
) -> usize
where
    S: ComicSource + ?Sized,
{
    let mut changes = 0;
    for author in authors {
        if author.trim().is_empty() {
            continue;
        }
        if merge_author(store, source, author, date).await == MergeStatus::Added {
            changes += 1;
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::ScriptedSource;
    use pretty_assertions::assert_eq;

    fn authors(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_missing_comic_is_fetched_and_appended() {
        let source = ScriptedSource::new()
            .with_comic("foo", "2025/01/01", "abc123", "Foo Strip")
            .with_metadata("abc123", "https://cdn/assets/abc123", "image/png", "2048");
        let mut store = HistoryStore::new();

        let status = merge_author(&mut store, &source, "foo", "2025/01/01").await;
        assert_eq!(status, MergeStatus::Added);
        assert_eq!(
            store.records("foo").unwrap(),
            &[ComicRecord {
                title: "Foo Strip".to_string(),
                image_url: "https://cdn/assets/abc123".to_string(),
                image_mime_type: "image/png".to_string(),
                image_length: "2048".to_string(),
                date: "2025/01/01".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_existing_record_skips_lookup() {
        let source = ScriptedSource::new().with_comic("foo", "2025/01/01", "abc123", "Foo Strip");
        let mut store = HistoryStore::new();

        merge_author(&mut store, &source, "foo", "2025/01/01").await;
        let status = merge_author(&mut store, &source, "foo", "2025/01/01").await;

        assert_eq!(status, MergeStatus::Exists);
        assert_eq!(source.identity_calls(), 1);
        assert_eq!(store.record_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_comic_creates_nothing() {
        let source = ScriptedSource::new();
        let mut store = HistoryStore::new();

        let status = merge_author(&mut store, &source, "foo", "2025/01/01").await;
        assert_eq!(status, MergeStatus::Unavailable);
        assert!(store.records("foo").is_none());
        assert_eq!(source.metadata_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_title_treated_as_unavailable() {
        let source = ScriptedSource::new().with_comic("foo", "2025/01/01", "abc123", "");
        let mut store = HistoryStore::new();

        let status = merge_author(&mut store, &source, "foo", "2025/01/01").await;
        assert_eq!(status, MergeStatus::Unavailable);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_failure_still_stores_record() {
        // No scripted metadata: the source reports defaults
        let source = ScriptedSource::new().with_comic("foo", "2025/01/01", "abc123", "Foo Strip");
        let mut store = HistoryStore::new();

        let status = merge_author(&mut store, &source, "foo", "2025/01/01").await;
        assert_eq!(status, MergeStatus::Added);
        let record = &store.records("foo").unwrap()[0];
        assert_eq!(record.image_url, "https://assets.test/abc123");
        assert_eq!(record.image_mime_type, "image/jpeg");
        assert_eq!(record.image_length, "0");
    }

    #[tokio::test]
    async fn test_merge_date_isolates_author_failures() {
        let source = ScriptedSource::new().with_comic("bar", "2025/01/01", "bar1", "Bar Strip");
        let mut store = HistoryStore::new();

        let changes = merge_date(&mut store, &source, &authors(&["foo", "bar"]), "2025/01/01").await;
        assert_eq!(changes, 1);
        assert!(store.records("foo").is_none());
        assert!(store.contains("bar", "2025/01/01"));
    }

    #[tokio::test]
    async fn test_merge_date_follows_configured_order() {
        let source = ScriptedSource::new()
            .with_comic("zed", "2025/01/01", "z1", "Z")
            .with_comic("amy", "2025/01/01", "a1", "A");
        let mut store = HistoryStore::new();

        merge_date(&mut store, &source, &authors(&["zed", "amy"]), "2025/01/01").await;
        let order: Vec<_> = store.iter().map(|(author, _)| author).collect();
        assert_eq!(order, vec!["zed", "amy"]);
        assert_eq!(
            source.identity_requests(),
            vec![
                ("zed".to_string(), "2025/01/01".to_string()),
                ("amy".to_string(), "2025/01/01".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_merge_date_trims_author_names() {
        let source = ScriptedSource::new().with_comic("foo", "2025/01/01", "f1", "Foo");
        let mut store = HistoryStore::new();

        let changes = merge_date(&mut store, &source, &authors(&["  foo ", " "]), "2025/01/01").await;
        assert_eq!(changes, 1);
        assert!(store.contains("foo", "2025/01/01"));
    }

    #[tokio::test]
    async fn test_unconfigured_authors_preserved() {
        let source = ScriptedSource::new().with_comic("foo", "2025/01/02", "f2", "Foo 2");
        let mut store = HistoryStore::new();
        store.insert(
            "retired",
            ComicRecord {
                title: "Old".to_string(),
                image_url: "https://cdn/old".to_string(),
                image_mime_type: "image/jpeg".to_string(),
                image_length: "0".to_string(),
                date: "2025/01/01".to_string(),
            },
        );

        merge_date(&mut store, &source, &authors(&["foo"]), "2025/01/02").await;
        assert!(store.contains("retired", "2025/01/01"));
        assert!(store.contains("foo", "2025/01/02"));
    }
}
