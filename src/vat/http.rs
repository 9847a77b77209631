//! HTTP client for the VAT declaration REST API.
//!
//! # Error Classification
//!
//! - Transport failures (DNS, connect, timeout) → [`ApiError::Request`]
//! - Non-2xx status → [`ApiError::Status`], except `404` on single-record
//!   lookups and deletes, which mean "no such record"
//! - Body that does not decode → [`ApiError::Decode`]
//!
//! No automatic retry: create, delete and lock calls are not idempotent
//! from the caller's point of view.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{
    ApiError, ApiResult, HealthStatus, ReportingPeriod, VatApi, VatDecision, VatDecisionList,
    VatDraft, VatDraftList, VatDraftRequest, VatSubmission, VatSubmissionList, VatValidation,
};

/// Default base URL of the tax agency API.
pub const DEFAULT_BASE_URL: &str = "https://api.skatteverket.se";

/// Connection settings for [`HttpVatApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpApiConfig {
    /// Base URL, e.g. `https://api.skatteverket.se`.
    pub base_url: String,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// TCP + TLS handshake timeout.
    pub connect_timeout: Duration,
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// [`VatApi`] backed by the REST API.
///
/// The client is cheap to clone; reqwest pools connections internally.
#[derive(Debug, Clone)]
pub struct HttpVatApi {
    client: Client,
    base: Url,
}

impl HttpVatApi {
    /// Builds a client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Client` if the base URL cannot be parsed or the
    /// HTTP client cannot be built.
    pub fn new(config: &HttpApiConfig) -> ApiResult<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| ApiError::Client {
            message: format!("invalid base URL '{}': {e}", config.base_url),
        })?;

        if base.cannot_be_a_base() {
            return Err(ApiError::Client {
                message: format!("base URL '{}' cannot carry a path", config.base_url),
            });
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Client {
                message: e.to_string(),
            })?;

        Ok(Self { client, base })
    }

    /// Returns the configured base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// Appends percent-encoded path segments to the base URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Client` if the base URL cannot carry a path.
    pub fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Client {
                message: format!("base URL '{}' cannot carry a path", self.base),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn record_url(&self, collection: &str, key: &ReportingPeriod) -> ApiResult<Url> {
        self.url(&["api", collection, &key.redovisare, &key.period])
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> ApiResult<Response> {
        let response = request.send().await.map_err(|source| {
            warn!(operation, error = %source, "VAT API request failed");
            ApiError::Request {
                operation: operation.to_string(),
                source,
            }
        })?;

        debug!(operation, status = %response.status(), "VAT API responded");
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(operation: &str, response: Response) -> ApiResult<T> {
        let response = Self::require_success(operation, response)?;

        let body = response.bytes().await.map_err(|source| ApiError::Request {
            operation: operation.to_string(),
            source,
        })?;

        serde_json::from_slice(&body).map_err(|e| ApiError::Decode {
            operation: operation.to_string(),
            message: e.to_string(),
        })
    }

    fn require_success(operation: &str, response: Response) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(ApiError::Status {
                operation: operation.to_string(),
                status: status.as_u16(),
            })
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> ApiResult<T> {
        let response = self.send(operation, request).await?;
        Self::decode(operation, response).await
    }

    async fn fetch_optional<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> ApiResult<Option<T>> {
        let response = self.send(operation, request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::decode(operation, response).await.map(Some)
    }
}

#[async_trait]
impl VatApi for HttpVatApi {
    async fn ping(&self) -> ApiResult<HealthStatus> {
        let url = self.url(&["api", "ping"])?;
        self.fetch("connect to VAT API", self.client.get(url)).await
    }

    async fn list_drafts(&self) -> ApiResult<VatDraftList> {
        let url = self.url(&["api", "utkast"])?;
        self.fetch("retrieve VAT drafts", self.client.post(url)).await
    }

    async fn get_draft(&self, key: &ReportingPeriod) -> ApiResult<Option<VatDraft>> {
        let url = self.record_url("utkast", key)?;
        let operation = format!("retrieve VAT draft for {key}");
        self.fetch_optional(&operation, self.client.get(url)).await
    }

    async fn upsert_draft(
        &self,
        key: &ReportingPeriod,
        request: &VatDraftRequest,
    ) -> ApiResult<VatDraft> {
        let url = self.record_url("utkast", key)?;
        let operation = format!("create/update VAT draft for {key}");
        self.fetch(&operation, self.client.post(url).json(request))
            .await
    }

    async fn delete_draft(&self, key: &ReportingPeriod) -> ApiResult<bool> {
        let url = self.record_url("utkast", key)?;
        let operation = format!("delete VAT draft for {key}");
        let response = self.send(&operation, self.client.delete(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::require_success(&operation, response)?;
        Ok(true)
    }

    async fn validate_draft(&self, key: &ReportingPeriod) -> ApiResult<VatValidation> {
        let url = self.record_url("kontrollera", key)?;
        let operation = format!("validate VAT draft for {key}");
        self.fetch(&operation, self.client.post(url)).await
    }

    async fn lock_draft(&self, key: &ReportingPeriod) -> ApiResult<()> {
        let url = self.record_url("las", key)?;
        let operation = format!("lock VAT draft for {key}");
        let response = self.send(&operation, self.client.put(url)).await?;
        Self::require_success(&operation, response).map(drop)
    }

    async fn unlock_draft(&self, key: &ReportingPeriod) -> ApiResult<()> {
        let url = self.record_url("las", key)?;
        let operation = format!("unlock VAT draft for {key}");
        let response = self.send(&operation, self.client.delete(url)).await?;
        Self::require_success(&operation, response).map(drop)
    }

    async fn list_submissions(&self) -> ApiResult<VatSubmissionList> {
        let url = self.url(&["api", "inlamnat"])?;
        self.fetch("retrieve VAT submissions", self.client.post(url))
            .await
    }

    async fn get_submission(&self, key: &ReportingPeriod) -> ApiResult<Option<VatSubmission>> {
        let url = self.record_url("inlamnat", key)?;
        let operation = format!("retrieve VAT submission for {key}");
        self.fetch_optional(&operation, self.client.get(url)).await
    }

    async fn list_decisions(&self) -> ApiResult<VatDecisionList> {
        let url = self.url(&["api", "beslutat"])?;
        self.fetch("retrieve VAT decisions", self.client.post(url))
            .await
    }

    async fn get_decision(&self, key: &ReportingPeriod) -> ApiResult<Option<VatDecision>> {
        let url = self.record_url("beslutat", key)?;
        let operation = format!("retrieve VAT decision for {key}");
        self.fetch_optional(&operation, self.client.get(url)).await
    }
}
