//! HTTP client for the Folio web API and the CORS relay

use crate::error::{ClientError, Result};
use crate::types::*;
use bytes::Bytes;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// HTTP client for workspace and literature endpoints
///
/// # Example
///
/// ```rust,no_run
/// use folio_client::{ApiClient, ClientConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::new(ClientConfig::default())?;
///
/// let details = client.paper_details(Some("10.1038/nature12373")).await?;
/// let pdf = client.fetch_via_relay("https://arxiv.org/pdf/2101.00001").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
    client: Client,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = build_http_client(&config, header::HeaderMap::new())?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ==================== Workspace API ====================

    /// List the signed-in user's projects
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let url = format!("{}/api/projects", self.config.base_url);
        let response = self.client.get(&url).send().await?;
        handle_response(response).await
    }

    /// List the signed-in user's documents across all projects
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let url = format!("{}/api/documents", self.config.base_url);
        let response = self.client.get(&url).send().await?;
        handle_response(response).await
    }

    // ==================== Literature API ====================

    /// Keyword and year-range search
    pub async fn search_literature(&self, request: &LitSearchRequest) -> Result<LiteratureResponse> {
        let url = format!("{}/api/litsearch", self.config.base_url);
        debug!(query = %request.search_query, years = %request.year_range, "Literature search");

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        handle_response(response).await
    }

    /// Full details for one paper, looked up by DOI
    pub async fn paper_details(&self, doi: Option<&str>) -> Result<LiteratureReference> {
        let url = format!("{}/api/paper-details", self.config.base_url);
        let body = PaperDetailsRequest {
            doi: doi.map(str::to_string),
        };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let details: PaperDetailsResponse = handle_response(response).await?;
        Ok(details.paper_details)
    }

    // ==================== Relay ====================

    /// URL of `target_url` routed through the relay
    pub fn relay_url(&self, target_url: &str) -> String {
        format!("{}{}", self.config.relay_url, target_url)
    }

    /// Fetch binary content through the CORS relay
    pub async fn fetch_via_relay(&self, target_url: &str) -> Result<Bytes> {
        let url = self.relay_url(target_url);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(target_url.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Server {
                status,
                message: body,
            });
        }

        let data = response.bytes().await?;
        debug!(target = target_url, size = data.len(), "Fetched content via relay");
        Ok(data)
    }
}

// ==================== Helper Methods ====================

pub(crate) fn build_http_client(config: &ClientConfig, mut headers: header::HeaderMap) -> Result<Client> {
    if let Some(ref api_key) = config.api_key {
        let value = header::HeaderValue::from_str(api_key)
            .map_err(|e| ClientError::Config(format!("invalid API key: {}", e)))?;
        headers.insert("apikey", value);
    }

    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))
}

pub(crate) async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    if response.status() == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(response.url().path().to_string()));
    }

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Server {
            status,
            message: body,
        });
    }

    let body = response.json().await?;
    Ok(body)
}
