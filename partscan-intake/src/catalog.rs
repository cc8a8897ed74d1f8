//! Remote parts catalog
//!
//! [`PartCatalog`] is the seam the resolver calls on a cache miss.
//! [`MouserClient`] implements it against the Mouser search API:
//!
//! - Endpoint: `POST {base}/api/v1/search/partnumber?apiKey=<key>`
//! - Body: `{"SearchByPartRequest": {"mouserPartNumber": "...", "partSearchOptions": "Exact"}}`
//! - Response: `{"Errors": [...], "SearchResults": {"NumberOfResult": n, "Parts": [...]}}`
//!
//! A non-empty error list or zero results is a resolvable miss, not a
//! transport failure; callers decide how to degrade on `Err`.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Production Mouser API host
pub const MOUSER_BASE_URL: &str = "https://api.mouser.com";

/// Mouser's published quota for the search API
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 30;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Catalog client errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid API key")]
    InvalidApiKey,
}

/// Error entry reported inside a successful HTTP response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogErrorEntry {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One catalog match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogPart {
    #[serde(default)]
    pub manufacturer_part_number: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub mouser_part_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub data_sheet_url: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub product_detail_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchResults {
    #[serde(default)]
    pub number_of_result: u32,
    #[serde(default)]
    pub parts: Vec<CatalogPart>,
}

/// Search response as returned by the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CatalogResponse {
    #[serde(default)]
    pub errors: Vec<CatalogErrorEntry>,
    #[serde(default)]
    pub search_results: Option<SearchResults>,
}

impl CatalogResponse {
    /// Best match, if the response is a hit
    ///
    /// Any reported error turns the whole response into a miss.
    pub fn first_match(&self) -> Option<&CatalogPart> {
        if !self.errors.is_empty() {
            return None;
        }
        self.search_results.as_ref()?.parts.first()
    }

    /// Response carrying the given matches
    pub fn with_parts(parts: Vec<CatalogPart>) -> Self {
        Self {
            errors: Vec::new(),
            search_results: Some(SearchResults {
                number_of_result: parts.len() as u32,
                parts,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchByPart<'a> {
    mouser_part_number: &'a str,
    part_search_options: &'a str,
}

#[derive(Debug, Serialize)]
struct SearchByPartRequest<'a> {
    #[serde(rename = "SearchByPartRequest")]
    request: SearchByPart<'a>,
}

/// Remote part lookup
#[async_trait]
pub trait PartCatalog: Send + Sync {
    /// Catalog name for logs
    fn name(&self) -> &'static str;

    /// Look up one part number
    async fn search(&self, part_number: &str) -> Result<CatalogResponse, CatalogError>;
}

/// Mouser search API client
pub struct MouserClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    rate_limiter: DefaultDirectRateLimiter,
}

impl MouserClient {
    pub fn new(api_key: String) -> Result<Self, CatalogError> {
        Self::with_base_url(api_key, MOUSER_BASE_URL.to_string(), DEFAULT_REQUESTS_PER_MINUTE)
    }

    /// Client against a custom host with a custom request quota
    pub fn with_base_url(
        api_key: String,
        base_url: String,
        requests_per_minute: u32,
    ) -> Result<Self, CatalogError> {
        let http_client = Client::builder()
            .user_agent(partscan_common::config::get_user_agent())
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            rate_limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }

    fn search_url(&self) -> String {
        format!("{}/api/v1/search/partnumber", self.base_url)
    }
}

#[async_trait]
impl PartCatalog for MouserClient {
    fn name(&self) -> &'static str {
        "Mouser"
    }

    async fn search(&self, part_number: &str) -> Result<CatalogResponse, CatalogError> {
        // Wait for a permit from the quota
        self.rate_limiter.until_ready().await;

        debug!(part_number = %part_number, "Querying Mouser search API");

        let body = SearchByPartRequest {
            request: SearchByPart {
                mouser_part_number: part_number,
                part_search_options: "Exact",
            },
        };

        let response = self
            .http_client
            .post(self.search_url())
            .query(&[("apiKey", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(CatalogError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api(status.as_u16(), error_text));
        }

        response
            .json::<CatalogResponse>()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }
}
