//! VAT declaration data source.
//!
//! The MCP collaborators never talk HTTP themselves. They go through the
//! [`VatApi`] trait, which has two implementations:
//!
//! - [`HttpVatApi`] — the tax agency REST API
//! - [`MemoryVatApi`] — an in-process store for offline use and tests
//!
//! # Operations
//!
//! | Operation | HTTP |
//! |-----------|------|
//! | ping | `GET /api/ping` |
//! | list drafts | `POST /api/utkast` |
//! | get / create / delete draft | `GET` / `POST` / `DELETE /api/utkast/{r}/{p}` |
//! | validate draft | `POST /api/kontrollera/{r}/{p}` |
//! | lock / unlock draft | `PUT` / `DELETE /api/las/{r}/{p}` |
//! | submissions | `POST /api/inlamnat`, `GET /api/inlamnat/{r}/{p}` |
//! | decisions | `POST /api/beslutat`, `GET /api/beslutat/{r}/{p}` |

pub mod error;
pub mod http;
pub mod memory;
pub mod models;

pub use error::{ApiError, ApiResult};
pub use http::{HttpApiConfig, HttpVatApi};
pub use memory::MemoryVatApi;
pub use models::{
    HealthStatus, ReportingPeriod, ValidationError, ValidationWarning, VatDecision,
    VatDecisionList, VatDraft, VatDraftList, VatDraftRequest, VatSubmission, VatSubmissionList,
    VatValidation,
};

use async_trait::async_trait;

/// Access to VAT drafts, submissions and decisions.
///
/// Lookups of a single record return `Ok(None)` when it does not exist.
#[async_trait]
pub trait VatApi: Send + Sync {
    /// Checks that the API is reachable.
    async fn ping(&self) -> ApiResult<HealthStatus>;

    /// Lists every draft.
    async fn list_drafts(&self) -> ApiResult<VatDraftList>;

    /// Fetches one draft.
    async fn get_draft(&self, key: &ReportingPeriod) -> ApiResult<Option<VatDraft>>;

    /// Creates a draft or updates an existing one.
    async fn upsert_draft(
        &self,
        key: &ReportingPeriod,
        request: &VatDraftRequest,
    ) -> ApiResult<VatDraft>;

    /// Deletes a draft. Returns `false` if there was nothing to delete.
    async fn delete_draft(&self, key: &ReportingPeriod) -> ApiResult<bool>;

    /// Validates a draft.
    async fn validate_draft(&self, key: &ReportingPeriod) -> ApiResult<VatValidation>;

    /// Locks a draft for signing.
    async fn lock_draft(&self, key: &ReportingPeriod) -> ApiResult<()>;

    /// Unlocks a draft so it can be modified again.
    async fn unlock_draft(&self, key: &ReportingPeriod) -> ApiResult<()>;

    /// Lists every submitted declaration.
    async fn list_submissions(&self) -> ApiResult<VatSubmissionList>;

    /// Fetches one submitted declaration.
    async fn get_submission(&self, key: &ReportingPeriod) -> ApiResult<Option<VatSubmission>>;

    /// Lists every decision.
    async fn list_decisions(&self) -> ApiResult<VatDecisionList>;

    /// Fetches one decision.
    async fn get_decision(&self, key: &ReportingPeriod) -> ApiResult<Option<VatDecision>>;
}
