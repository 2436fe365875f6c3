//! Notion service wrapper built on the gateway.
//!
//! [`NotionClient`] talks to a Notion proxy (mounted at `/api/notion` by the
//! web app) and relies on the gateway for caching, deduplication and retry.
//! Page, content and database reads are cached; searches are deduplicated
//! and retried but always fetched fresh. Updating a page drops every cached
//! read under that page.
//!
//! The proxy answers 429 when Notion rate-limits it; [`retry_policy`] retries
//! those along with every 5xx, which the gateway's default policy does not.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::cache::Invalidation;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::{Gateway, RequestOptions};
use crate::http::StatusCode;
use crate::retry::RetryPolicy;
use crate::transport::{ReqwestTransport, Transport};

mod content;
mod error;

pub use content::{PageIcon, extract_plain_text, page_icon, page_title};
pub use error::{CLIENT_CLOSED, NO_RESPONSE, NotionError};

const PAGE_TTL: Duration = Duration::from_secs(30);
const PAGE_CONTENT_TTL: Duration = Duration::from_secs(30);
const DATABASE_TTL: Duration = Duration::from_secs(60);

// Only its path is ever used.
const PATH_BASE: &str = "http://notion.invalid/";

/// Retry policy suited to the Notion proxy: three attempts with a one second
/// doubling backoff, retrying 429 and every 5xx status.
pub fn retry_policy() -> RetryPolicy {
    let statuses = (500u16..600).map(StatusCode::from);
    RetryPolicy::default()
        .with_max_attempts(3)
        .with_retryable_statuses(std::iter::once(StatusCode::TOO_MANY_REQUESTS).chain(statuses))
}

/// One page of a paginated Notion listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Listing {
    pub results: Vec<Value>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// Arguments for [`NotionClient::create_page`].
///
/// `parent` and `properties` are required; the rest are sent only when set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewPage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<Value>,
}

/// Client for the Notion proxy.
///
/// # Examples
///
/// ```rust,no_run
/// use rgate::notion::{NotionClient, page_title};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let notion = NotionClient::connect("https://study.example.com/api/notion")?;
///
/// let found = notion.search_pages("thermodynamics", Default::default()).await?;
/// for page in &found.results {
///     println!("{}", page_title(&page["properties"]));
/// }
/// # Ok(())
/// # }
/// ```
pub struct NotionClient<T = ReqwestTransport> {
    gateway: Gateway<T>,
}

impl<T> Clone for NotionClient<T> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
        }
    }
}

impl NotionClient<ReqwestTransport> {
    /// Builds a client for the proxy at `base_url` using [`retry_policy`].
    pub fn connect(base_url: impl Into<String>) -> Result<Self, GatewayError> {
        let config = GatewayConfig::default()
            .with_base_url(base_url)
            .with_retry(retry_policy());
        Ok(Self::new(Gateway::new(config)?))
    }
}

impl<T: Transport + 'static> NotionClient<T> {
    /// Wraps `gateway`, whose base URL must point at the Notion proxy.
    pub fn new(gateway: Gateway<T>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway<T> {
        &self.gateway
    }

    /// Searches pages and databases.
    ///
    /// `filters` are merged into the request body beside `query` (e.g.
    /// `filter`, `sort`, `start_cursor`, `page_size`). Identical concurrent
    /// searches share one call.
    pub async fn search_pages(
        &self,
        query: &str,
        filters: Map<String, Value>,
    ) -> Result<Listing, NotionError> {
        let mut body = filters;
        body.insert("query".to_owned(), Value::String(query.to_owned()));

        let options = RequestOptions::new().dedupe().idempotent();
        let response = self.gateway.post("/search", &body, options).await?;
        Ok(response.json()?)
    }

    /// Fetches page metadata. Cached for 30 s.
    pub async fn get_page(&self, page_id: &str) -> Result<Value, NotionError> {
        let page_id = require(page_id, "Page ID")?;
        let options = RequestOptions::new().ttl(PAGE_TTL);
        let path = resource_path(&["pages", page_id])?;
        Ok(self.gateway.get_json(&path, options).await?)
    }

    /// Fetches the blocks of a page. Cached for 30 s per cursor and page size.
    pub async fn get_page_content(
        &self,
        page_id: &str,
        start_cursor: Option<&str>,
        page_size: Option<u32>,
    ) -> Result<Listing, NotionError> {
        let page_id = require(page_id, "Page ID")?;

        let mut options = RequestOptions::new().ttl(PAGE_CONTENT_TTL);
        if let Some(cursor) = start_cursor {
            options = options.param("start_cursor", cursor);
        }
        if let Some(size) = page_size {
            options = options.param("page_size", size);
        }

        let path = resource_path(&["pages", page_id, "content"])?;
        Ok(self.gateway.get_json(&path, options).await?)
    }

    /// Fetches a database schema. Cached for 60 s.
    pub async fn get_database(&self, database_id: &str) -> Result<Value, NotionError> {
        let database_id = require(database_id, "Database ID")?;
        let options = RequestOptions::new().ttl(DATABASE_TTL);
        let path = resource_path(&["databases", database_id])?;
        Ok(self.gateway.get_json(&path, options).await?)
    }

    /// Queries a database. Results are never cached since queries are
    /// usually filtered or sorted.
    pub async fn query_database(
        &self,
        database_id: &str,
        query: &Value,
    ) -> Result<Listing, NotionError> {
        let database_id = require(database_id, "Database ID")?;
        let path = resource_path(&["databases", database_id, "query"])?;
        let response = self
            .gateway
            .post(&path, query, RequestOptions::new())
            .await?;
        Ok(response.json()?)
    }

    /// Creates a page under `page.parent`.
    pub async fn create_page(&self, page: &NewPage) -> Result<Value, NotionError> {
        if page.parent.is_none() {
            return Err(NotionError::missing("Parent"));
        }
        if page.properties.is_none() {
            return Err(NotionError::new("Properties are required", 400));
        }
        let response = self
            .gateway
            .post("/pages", page, RequestOptions::new())
            .await?;
        Ok(response.json()?)
    }

    /// Applies `updates` to a page, then drops cached reads of the page and
    /// its content.
    pub async fn update_page(&self, page_id: &str, updates: &Value) -> Result<Value, NotionError> {
        let page_id = require(page_id, "Page ID")?;
        let path = resource_path(&["pages", page_id])?;
        let options = RequestOptions::new().invalidate(Invalidation::path(path.as_str()));
        let response = self.gateway.patch(&path, updates, options).await?;
        Ok(response.json()?)
    }
}

fn require<'a>(id: &'a str, what: &str) -> Result<&'a str, NotionError> {
    let id = id.trim();
    if id.is_empty() {
        Err(NotionError::missing(what))
    } else {
        Ok(id)
    }
}

/// Joins `segments` into an absolute path, percent-encoding each one as a
/// single path segment.
fn resource_path(segments: &[&str]) -> Result<String, NotionError> {
    let mut url = Url::parse(PATH_BASE).map_err(|e| NotionError::new(e.to_string(), 400))?;
    url.path_segments_mut()
        .map_err(|()| NotionError::new("cannot build resource path", 400))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.path().to_owned())
}
