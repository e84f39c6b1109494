//! HTTP client for Elasticsearch-compatible index stores
//!
//! Speaks the two endpoints the sync needs: `GET /{index}/_mapping` and
//! `POST /_bulk`. OpenSearch exposes the same shapes.

use super::types::{render_bulk_body, BulkResponse, BulkUpdate, MappingResponse};
use super::{Destination, DestinationError};
use crate::config::DestinationConfig;
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Method, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Longest error body kept in a [`DestinationError::Status`]
const MAX_ERROR_BODY_CHARS: usize = 512;

pub struct ElasticsearchClient {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticsearchClient {
    pub fn new(config: &DestinationConfig) -> Result<Self, DestinationError> {
        if config.accept_invalid_certs {
            warn!(url = %config.url, "TLS certificate validation is disabled for the destination");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_ref()),
            None => builder,
        }
    }
}

#[async_trait]
impl Destination for ElasticsearchClient {
    async fn get_mapping(&self, index: &str) -> Result<MappingResponse, DestinationError> {
        let url = format!("{}/{}/_mapping", self.base_url, index);
        debug!(url = %url, "Fetching index mapping");

        let response = self.request(Method::GET, &url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(DestinationError::IndexNotFound(index.to_string()));
        }

        let body = success_body(&url, response).await?;
        serde_json::from_str(&body).map_err(|e| DestinationError::Decode(e.to_string()))
    }

    async fn bulk(&self, updates: &[BulkUpdate]) -> Result<BulkResponse, DestinationError> {
        let url = format!("{}/_bulk", self.base_url);
        let body = render_bulk_body(updates).map_err(|e| DestinationError::Decode(e.to_string()))?;
        debug!(url = %url, operations = updates.len(), bytes = body.len(), "Sending bulk request");

        let response = self
            .request(Method::POST, &url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        let body = success_body(&url, response).await?;
        serde_json::from_str(&body).map_err(|e| DestinationError::Decode(e.to_string()))
    }
}

async fn success_body(url: &str, response: Response) -> Result<String, DestinationError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(DestinationError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    Ok(body)
}
