use super::{ComicIdentity, ComicSource, ImageMetadata, DEFAULT_LENGTH, DEFAULT_MIME_TYPE};
use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_LENGTH, CONTENT_TYPE,
    USER_AGENT,
};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const PAGE_BASE_URL: &str = "https://www.gocomics.com";
const ASSET_BASE_URL: &str = "https://featureassets.gocomics.com/assets";

/// Query string that makes the site answer with its RSC payload instead of HTML.
const RSC_QUERY: &str = "_rsc=14q28";

const MAX_RETRIES: u32 = 3;
const MAX_PAGE_SIZE: usize = 10 * 1024 * 1024; // 10MB
const PAGE_TIMEOUT: Duration = Duration::from_secs(30);
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from fetching or scraping a comic page.
///
/// These never leave the adapter: [`GoComicsClient`] logs them and reports
/// "no comic" to the caller.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out")]
    Timeout,
    /// Page did not contain the `og:image` marker, id, or title
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    #[error("Response too large")]
    ResponseTooLarge,
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// [`ComicSource`] backed by gocomics.com.
#[derive(Debug, Clone)]
pub struct GoComicsClient {
    client: reqwest::Client,
    page_base: String,
    asset_base: String,
    backoff_unit: Duration,
    metadata_timeout: Duration,
}

impl GoComicsClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_urls(client, PAGE_BASE_URL, ASSET_BASE_URL)
    }

    /// Point the client at different hosts (used by tests with a mock server).
    pub fn with_base_urls(client: reqwest::Client, page_base: &str, asset_base: &str) -> Self {
        Self {
            client,
            page_base: page_base.trim_end_matches('/').to_string(),
            asset_base: asset_base.trim_end_matches('/').to_string(),
            backoff_unit: Duration::from_secs(1),
            metadata_timeout: METADATA_TIMEOUT,
        }
    }

    /// Base delay for retry backoff; attempt `n` waits `unit * 2^n`.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// Deterministic asset URL for an image id.
    pub fn image_url(&self, image_id: &str) -> String {
        format!("{}/{}", self.asset_base, image_id)
    }

    fn page_url(&self, author: &str, date: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!("{}/{}/{}", self.page_base, author, date))?;
        url.set_query(Some(RSC_QUERY));
        Ok(url)
    }

    async fn fetch_page(&self, author: &str, date: &str) -> Result<String, FetchError> {
        let url = self.page_url(author, date)?;
        tracing::info!(url = %url, "Fetching comic page");

        let mut retry_count = 0;
        let bytes = loop {
            let response = tokio::time::timeout(
                PAGE_TIMEOUT,
                self.client.get(url.clone()).headers(page_headers()).send(),
            )
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(if status.is_server_error() {
                        FetchError::HttpStatus(status.as_u16())
                    } else {
                        FetchError::RateLimited(MAX_RETRIES)
                    });
                }

                let delay = self.backoff_unit * 2u32.pow(retry_count); // 1, 2, 4 units
                tracing::warn!(
                    url = %url,
                    status = %status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying comic page after delay"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            // 4xx fails immediately
            if !status.is_success() {
                return Err(FetchError::HttpStatus(status.as_u16()));
            }

            break read_limited_bytes(response, MAX_PAGE_SIZE).await?;
        };

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn head_image(&self, url: &str) -> Result<(Option<String>, Option<String>), FetchError> {
        let response = tokio::time::timeout(self.metadata_timeout, self.client.head(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Ok((header(CONTENT_TYPE), header(CONTENT_LENGTH)))
    }
}

#[async_trait]
impl ComicSource for GoComicsClient {
    async fn fetch_comic_identity(&self, date: &str, author: &str) -> Option<ComicIdentity> {
        let result = self
            .fetch_page(author, date)
            .await
            .and_then(|body| parse_comic_page(&body));

        match result {
            Ok(identity) => Some(identity),
            Err(e) => {
                tracing::error!(author = %author, date = %date, error = %e, "Failed to fetch comic page");
                None
            }
        }
    }

    async fn fetch_image_metadata(&self, image_id: &str) -> ImageMetadata {
        let url = self.image_url(image_id);
        tracing::info!(url = %url, "Fetching image metadata");

        match self.head_image(&url).await {
            Ok((mime_type, length)) => {
                let mime_type = mime_type.unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
                let length = length.unwrap_or_else(|| DEFAULT_LENGTH.to_string());
                tracing::info!(mime_type = %mime_type, length = %length, "Fetched image metadata");
                ImageMetadata {
                    url,
                    mime_type,
                    length,
                    degraded: false,
                }
            }
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Failed to fetch image metadata, using defaults");
                ImageMetadata::defaulted(url)
            }
        }
    }
}

/// Headers the site expects before it will hand out the RSC payload.
fn page_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0",
        ),
    );
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert("RSC", HeaderValue::from_static("1"));
    headers.insert("Priority", HeaderValue::from_static("u=4"));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("empty"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("cors"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("same-origin"));
    headers
}

fn asset_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"gocomics\.com/assets/([a-zA-Z0-9_]*)").expect("valid regex"))
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"children":"((?:[^"\\]|\\.)*)""#).expect("valid regex"))
}

/// Pull the image id and title out of a comic page payload.
///
/// Only the first line mentioning `og:image` is inspected. The title is a
/// JSON string literal in the payload, so escapes are decoded when possible.
fn parse_comic_page(body: &str) -> Result<ComicIdentity, FetchError> {
    let line = body
        .lines()
        .find(|line| line.contains("og:image"))
        .ok_or_else(|| FetchError::Parse("no og:image marker in page".to_string()))?;

    let image_id = asset_id_regex()
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| FetchError::Parse("no asset id on og:image line".to_string()))?;

    let raw_title = title_regex()
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| FetchError::Parse("no title on og:image line".to_string()))?;

    let title = serde_json::from_str::<String>(&format!("\"{raw_title}\""))
        .unwrap_or_else(|_| raw_title.to_string());
    if title.trim().is_empty() {
        return Err(FetchError::Parse("empty title on og:image line".to_string()));
    }

    Ok(ComicIdentity {
        image_id: image_id.to_string(),
        title,
    })
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
