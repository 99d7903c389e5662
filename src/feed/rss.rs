use crate::storage::{ComicRecord, HistoryStore};
use crate::util::parse_comic_date;
use chrono::{DateTime, Local, TimeZone};
use quick_xml::escape::escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use thiserror::Error;

const RSS_DOCS_URL: &str = "http://www.rssboard.org/rss-specification";
const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";
const GENERATOR: &str = concat!("comicfeed ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to write feed XML: {0}")]
    Xml(String),

    #[error("Generated feed contains invalid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn xml_err<E: std::fmt::Display>(e: E) -> FeedError {
    FeedError::Xml(e.to_string())
}

/// Channel-level metadata for the generated feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedChannel {
    pub title: String,
    /// Self link; also emitted as `atom:link rel="self"`.
    pub link: String,
    pub description: String,
    pub language: String,
}

impl FeedChannel {
    /// The GoComics channel published at `https://{host_domain}/feed.xml`.
    pub fn for_domain(host_domain: &str) -> Self {
        Self {
            title: "GoComics Daily".to_string(),
            link: format!("https://{host_domain}/feed.xml"),
            description: "Fresh comics from GoComics".to_string(),
            language: "en".to_string(),
        }
    }
}

/// Render `store` as an RSS 2.0 document.
///
/// Every record of every author becomes one item. Items are emitted most
/// recently stored first: authors in reverse store order, and each author's
/// records newest-fetched first.
pub fn render_feed(
    channel: &FeedChannel,
    store: &HistoryStore,
    build_date: DateTime<Local>,
) -> Result<String, FeedError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:atom", ATOM_NAMESPACE));
    writer.write_event(Event::Start(rss)).map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .map_err(xml_err)?;

    write_text_element(&mut writer, "title", &channel.title)?;
    write_text_element(&mut writer, "link", &channel.link)?;
    write_text_element(&mut writer, "description", &channel.description)?;

    let mut self_link = BytesStart::new("atom:link");
    self_link.push_attribute(("href", channel.link.as_str()));
    self_link.push_attribute(("rel", "self"));
    self_link.push_attribute(("type", "application/rss+xml"));
    writer.write_event(Event::Empty(self_link)).map_err(xml_err)?;

    write_text_element(&mut writer, "docs", RSS_DOCS_URL)?;
    write_text_element(&mut writer, "generator", GENERATOR)?;
    write_text_element(&mut writer, "language", &channel.language)?;
    write_text_element(&mut writer, "lastBuildDate", &build_date.to_rfc2822())?;

    let authors: Vec<_> = store.iter().collect();
    for (author, records) in authors.into_iter().rev() {
        for record in records.iter().rev() {
            write_item(&mut writer, author, record)?;
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .map_err(xml_err)?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8(bytes)?)
}

fn write_item(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    author: &str,
    record: &ComicRecord,
) -> Result<(), FeedError> {
    writer
        .write_event(Event::Start(BytesStart::new("item")))
        .map_err(xml_err)?;

    write_text_element(writer, "title", &record.title)?;
    write_text_element(writer, "description", &item_description(record))?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "false"));
    writer.write_event(Event::Start(guid)).map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(&item_guid(author, &record.date))))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("guid")))
        .map_err(xml_err)?;

    // RSS requires a plain integer length on enclosures
    let length = if !record.image_length.is_empty()
        && record.image_length.bytes().all(|b| b.is_ascii_digit())
    {
        record.image_length.as_str()
    } else {
        "0"
    };
    let mut enclosure = BytesStart::new("enclosure");
    enclosure.push_attribute(("url", record.image_url.as_str()));
    enclosure.push_attribute(("length", length));
    enclosure.push_attribute(("type", record.image_mime_type.as_str()));
    writer.write_event(Event::Empty(enclosure)).map_err(xml_err)?;

    if let Some(published) = published_at(&record.date) {
        write_text_element(writer, "pubDate", &published.to_rfc2822())?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("item")))
        .map_err(xml_err)?;
    Ok(())
}

fn write_text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    text: &str,
) -> Result<(), FeedError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)?;
    Ok(())
}

/// HTML body for an item: the title as a paragraph followed by the strip.
///
/// The title is HTML-escaped here; the XML writer escapes the whole
/// fragment again as element text.
fn item_description(record: &ComicRecord) -> String {
    let title = escape(record.title.as_str());
    let url = escape(record.image_url.as_str());
    format!(r#"<p>{title}</p><img src="{url}" alt="{title}" />"#)
}

/// Stable GUID for an author's strip on a date.
fn item_guid(author: &str, date: &str) -> String {
    let hash = Sha256::digest(format!("{author}|{date}").as_bytes());
    format!("{:x}", hash)
}

/// Local midnight of a record date.
fn published_at(date: &str) -> Option<DateTime<Local>> {
    let midnight = parse_comic_date(date)?.and_hms_opt(0, 0, 0)?;
    Local.from_local_datetime(&midnight).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn build_date() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 5, 12, 0, 0).unwrap()
    }

    fn record(title: &str, date: &str) -> ComicRecord {
        ComicRecord {
            title: title.to_string(),
            image_url: format!("https://cdn/assets/{}", date.replace('/', "")),
            image_mime_type: "image/png".to_string(),
            image_length: "2048".to_string(),
            date: date.to_string(),
        }
    }

    #[test]
    fn test_channel_for_domain() {
        let channel = FeedChannel::for_domain("comics.example.com");
        assert_eq!(channel.link, "https://comics.example.com/feed.xml");
        assert_eq!(channel.title, "GoComics Daily");
        assert_eq!(channel.language, "en");
    }

    #[test]
    fn test_empty_store_renders_channel_only() {
        let xml = render_feed(
            &FeedChannel::for_domain("localhost"),
            &HistoryStore::new(),
            build_date(),
        )
        .unwrap();

        let feed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
        assert_eq!(feed.title.unwrap().content, "GoComics Daily");
        assert!(feed.entries.is_empty());
        assert!(xml.contains(r#"<atom:link href="https://localhost/feed.xml" rel="self""#));
    }

    #[test]
    fn test_single_item_scenario() {
        let mut store = HistoryStore::new();
        store.insert(
            "foo",
            ComicRecord {
                title: "Foo Strip".to_string(),
                image_url: "https://cdn/assets/abc123".to_string(),
                image_mime_type: "image/png".to_string(),
                image_length: "2048".to_string(),
                date: "2025/01/01".to_string(),
            },
        );

        let xml = render_feed(&FeedChannel::for_domain("localhost"), &store, build_date())
            .unwrap();
        let feed = feed_rs::parser::parse(xml.as_bytes()).unwrap();

        assert_eq!(feed.entries.len(), 1);
        let entry = &feed.entries[0];
        assert_eq!(entry.title.as_ref().unwrap().content, "Foo Strip");
        let summary = &entry.summary.as_ref().unwrap().content;
        assert!(summary.contains(r#"<img src="https://cdn/assets/abc123""#));
        assert!(xml.contains(r#"<enclosure url="https://cdn/assets/abc123" length="2048" type="image/png"/>"#));
    }

    #[test]
    fn test_markup_in_title_is_escaped() {
        let mut store = HistoryStore::new();
        store.insert("foo", record("<b>Tom & \"Jerry\"</b>", "2025/01/01"));

        let xml = render_feed(&FeedChannel::for_domain("localhost"), &store, build_date())
            .unwrap();
        assert!(!xml.contains("<b>"));

        let feed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
        let entry = &feed.entries[0];
        assert_eq!(
            entry.title.as_ref().unwrap().content,
            "<b>Tom & \"Jerry\"</b>"
        );
        // Description stays valid HTML: the title is escaped inside it
        let summary = &entry.summary.as_ref().unwrap().content;
        assert!(summary.starts_with("<p>&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;</p>"));
    }

    #[test]
    fn test_items_flatten_all_authors_newest_first() {
        let mut store = HistoryStore::new();
        store.insert("foo", record("Foo 1", "2025/01/01"));
        store.insert("foo", record("Foo 2", "2025/01/02"));
        store.insert("bar", record("Bar 1", "2025/01/01"));

        let xml = render_feed(&FeedChannel::for_domain("localhost"), &store, build_date())
            .unwrap();
        let feed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
        let titles: Vec<_> = feed
            .entries
            .iter()
            .map(|e| e.title.as_ref().unwrap().content.clone())
            .collect();
        assert_eq!(titles, vec!["Bar 1", "Foo 2", "Foo 1"]);
    }

    #[test]
    fn test_guid_is_stable_and_author_scoped() {
        assert_eq!(item_guid("foo", "2025/01/01"), item_guid("foo", "2025/01/01"));
        assert_ne!(item_guid("foo", "2025/01/01"), item_guid("bar", "2025/01/01"));
        assert_eq!(item_guid("foo", "2025/01/01").len(), 64);
    }

    #[test]
    fn test_non_numeric_length_becomes_zero() {
        let mut store = HistoryStore::new();
        let mut rec = record("Foo", "2025/01/01");
        rec.image_length = "unknown".to_string();
        store.insert("foo", rec);

        let xml = render_feed(&FeedChannel::for_domain("localhost"), &store, build_date())
            .unwrap();
        assert!(xml.contains(r#"length="0""#));
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut store = HistoryStore::new();
        store.insert("foo", record("Foo", "2025/01/01"));
        let channel = FeedChannel::for_domain("localhost");

        let first = render_feed(&channel, &store, build_date()).unwrap();
        let second = render_feed(&channel, &store, build_date()).unwrap();
        assert_eq!(first, second);
    }
}
