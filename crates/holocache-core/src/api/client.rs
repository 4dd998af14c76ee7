//! API client for the Star Wars API (swapi.tech).
//!
//! Listing responses come in two shapes: lightweight `{uid, name, url}`
//! references for most types, and (for films) items that already carry every
//! detail field under `properties`. The client hides that difference and
//! hands back `Record`s either way.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::ApiConfig;
use crate::models::{EntityType, Record};

use super::{ApiError, ListPage, RemoteSource};

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    results: Option<Vec<Value>>,
    #[serde(default)]
    result: Option<Vec<Value>>,
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    total_records: Option<usize>,
}

/// Lightweight listing entry.
#[derive(Debug, Deserialize)]
struct ListItem {
    uid: String,
    #[serde(default)]
    name: String,
    url: Option<String>,
}

/// Listing entry with detail nested under `properties`.
#[derive(Debug, Deserialize)]
struct InlineItem {
    uid: String,
    #[serde(default)]
    properties: Map<String, Value>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    result: DetailResult,
}

#[derive(Debug, Deserialize)]
struct DetailResult {
    #[serde(default)]
    properties: Map<String, Value>,
    description: Option<String>,
}

/// API client for swapi.tech.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct SwapiClient {
    client: Client,
    base_url: String,
    page_size: u32,
}

impl SwapiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, u32)]) -> Result<T, ApiError> {
        let response = self.client.get(url).query(query).send().await?;
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    fn parse_list(entity: EntityType, body: ListResponse) -> Result<ListPage, ApiError> {
        let raw = body.results.or(body.result).unwrap_or_default();

        let items = raw
            .into_iter()
            .map(|value| {
                if entity.has_inline_detail() {
                    serde_json::from_value::<InlineItem>(value).map(Self::flatten_inline)
                } else {
                    serde_json::from_value::<ListItem>(value).map(|item| {
                        let mut record = Record::new(item.uid, item.name);
                        if let Some(url) = item.url {
                            record = record.with("url", url);
                        }
                        record
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ApiError::InvalidResponse(format!("Malformed {} listing item: {}", entity, e)))?;

        Ok(ListPage {
            items,
            has_next: body.next.is_some_and(|next| !next.is_empty()),
            total_count: body.total_records,
        })
    }

    /// Flatten an inline-detail listing entry; the title doubles as the name.
    fn flatten_inline(item: InlineItem) -> Record {
        let title = item
            .properties
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut record = Record::merged(item.uid, &title, item.properties);
        if let Some(description) = item.description {
            record = record.with("description", description);
        }
        record
    }

    fn parse_detail(uid: &str, body: DetailResponse) -> Record {
        let DetailResult {
            properties,
            description,
        } = body.result;
        let fallback = properties
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut record = Record::merged(uid, &fallback, properties);
        if let Some(description) = description {
            record.properties.entry("description").or_insert(Value::String(description));
        }
        record
    }
}

#[async_trait]
impl RemoteSource for SwapiClient {
    async fn fetch_list(&self, entity: EntityType, page: u32) -> Result<ListPage, ApiError> {
        let url = format!("{}/{}", self.base_url, entity);
        let body: ListResponse = self
            .get(&url, &[("page", page), ("limit", self.page_size)])
            .await?;
        let listing = Self::parse_list(entity, body)?;
        debug!(
            entity = %entity,
            page,
            items = listing.items.len(),
            has_next = listing.has_next,
            "Listing page fetched"
        );
        Ok(listing)
    }

    async fn fetch_detail(&self, entity: EntityType, uid: &str) -> Result<Record, ApiError> {
        let url = format!("{}/{}/{}", self.base_url, entity, uid);
        let body: DetailResponse = self.get(&url, &[]).await?;
        Ok(Self::parse_detail(uid, body))
    }
}
