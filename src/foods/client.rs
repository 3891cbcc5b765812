use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use super::dto::{OffProduct, OffProductResponse, OffSearchResponse, Product, ProductSource};
use crate::config::FoodDbConfig;
use crate::upstream::{build_http_client, preview, InitError};

const BARCODE_TIMEOUT: Duration = Duration::from_secs(10);
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);
const PRODUCT_FIELDS: &str = "product_name,nutriments,brands,code,image_url";

#[derive(Debug, Error)]
pub enum FoodError {
    #[error("food database unreachable: {0}")]
    Network(String),
    #[error("food database timed out")]
    Timeout,
    #[error("food database answered HTTP {0}")]
    UnexpectedStatus(u16),
    #[error("food database sent an unreadable payload: {0}")]
    Decode(String),
}

impl FoodError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e.to_string())
        }
    }

    /// Transport failures are reported as unavailability, payload problems as internal errors.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Network(_) | Self::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            Self::UnexpectedStatus(_) | Self::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[async_trait]
pub trait FoodLookup: Send + Sync {
    /// `Ok(None)` when the product database does not know the barcode.
    async fn lookup_by_barcode(&self, barcode: &str) -> Result<Option<Product>, FoodError>;

    /// Empty when nothing matches. Never returns more than `limit` products.
    async fn search_by_name(
        &self,
        query: &str,
        limit: u32,
        lang: &str,
    ) -> Result<Vec<Product>, FoodError>;
}

/// Open Food Facts client.
#[derive(Clone)]
pub struct OpenFoodFactsClient {
    http: Client,
    base_url: String,
    lang: String,
    barcode_timeout: Duration,
    search_timeout: Duration,
}

impl OpenFoodFactsClient {
    pub fn from_config(cfg: &FoodDbConfig) -> Result<Self, InitError> {
        Ok(Self {
            http: build_http_client(&cfg.user_agent, SEARCH_TIMEOUT)?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            lang: cfg.search_lang.clone(),
            barcode_timeout: BARCODE_TIMEOUT,
            search_timeout: SEARCH_TIMEOUT,
        })
    }

    fn fields(lang: &str) -> String {
        format!("product_name_{lang},{PRODUCT_FIELDS}")
    }
}

fn api_status(v: Option<&Value>) -> Option<i64> {
    match v? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl FoodLookup for OpenFoodFactsClient {
    #[instrument(skip(self))]
    async fn lookup_by_barcode(&self, barcode: &str) -> Result<Option<Product>, FoodError> {
        let url = format!("{}/api/v2/product/{}", self.base_url, barcode);
        let fields = format!("{},status,status_verbose", Self::fields(&self.lang));
        debug!(%url, "looking up barcode");

        let res = self
            .http
            .get(&url)
            .query(&[("fields", fields.as_str())])
            .timeout(self.barcode_timeout)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "barcode lookup request failed");
                FoodError::from_reqwest(e)
            })?;

        let status = res.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            info!("product not found (HTTP 404)");
            return Ok(None);
        }
        if !status.is_success() {
            error!(%status, "barcode lookup unexpected status");
            return Err(FoodError::UnexpectedStatus(status.as_u16()));
        }

        let body = res.text().await.map_err(FoodError::from_reqwest)?;
        let data: OffProductResponse = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, body = %preview(&body, 200), "barcode lookup returned invalid json");
            FoodError::Decode(e.to_string())
        })?;

        let product = data.product.and_then(OffProduct::from_value);
        match (api_status(data.status.as_ref()), product) {
            (Some(1), Some(product)) => {
                match product.into_product(&self.lang, ProductSource::BarcodeLookup) {
                    Some(p) => {
                        info!(name = %p.name, "product found");
                        Ok(Some(p))
                    }
                    None => {
                        warn!("product found but has no usable name");
                        Ok(None)
                    }
                }
            }
            (Some(0), _) => {
                info!(status_verbose = ?data.status_verbose, "product not found");
                Ok(None)
            }
            (status, _) => {
                warn!(?status, status_verbose = ?data.status_verbose, "unexpected product payload");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    async fn search_by_name(
        &self,
        query: &str,
        limit: u32,
        lang: &str,
    ) -> Result<Vec<Product>, FoodError> {
        let url = format!("{}/cgi/search.pl", self.base_url);
        let page_size = limit.to_string();
        let fields = Self::fields(lang);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("search_terms", query),
                ("search_simple", "1"),
                ("action", "process"),
                ("json", "1"),
                ("page_size", page_size.as_str()),
                ("lc", lang),
                ("fields", fields.as_str()),
            ])
            .timeout(self.search_timeout)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "search request failed");
                FoodError::from_reqwest(e)
            })?;

        let status = res.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            info!("search returned HTTP 404, treating as no results");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            error!(%status, "search unexpected status");
            return Err(FoodError::UnexpectedStatus(status.as_u16()));
        }

        let body = res.text().await.map_err(FoodError::from_reqwest)?;
        let data: OffSearchResponse = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, body = %preview(&body, 200), "search returned invalid json");
            FoodError::Decode(e.to_string())
        })?;

        let products: Vec<Product> = data
            .products
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| {
                let product = OffProduct::from_value(entry);
                if product.is_none() {
                    warn!("skipping malformed search entry");
                }
                product
            })
            .filter_map(|p| p.into_product(lang, ProductSource::NameSearch))
            .take(limit as usize)
            .collect();

        info!(count = products.len(), "search finished");
        Ok(products)
    }
}
