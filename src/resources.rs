//! `vat://` resources.
//!
//! | URI | Content |
//! |-----|---------|
//! | `vat://status` | API health report |
//! | `vat://drafts/{redovisare}/{period}` | one draft |
//! | `vat://submissions/{redovisare}/{period}` | one submission |
//! | `vat://decisions/{redovisare}/{period}` | one decision |
//!
//! Only the status resource and existing drafts are listed; submissions and
//! decisions are readable by URI.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::mcp::registry::{ProviderError, ResourceContent, ResourceDefinition, ResourceProvider};
use crate::tools::to_pretty_json;
use crate::vat::{ReportingPeriod, VatApi};

const SCHEME: &str = "vat://";
const JSON_MIME_TYPE: &str = "application/json";

/// A parsed `vat://` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    /// `vat://status`
    Status,
    /// `vat://drafts/{r}/{p}`
    Draft(ReportingPeriod),
    /// `vat://submissions/{r}/{p}`
    Submission(ReportingPeriod),
    /// `vat://decisions/{r}/{p}`
    Decision(ReportingPeriod),
}

impl ResourceUri {
    /// Parses a resource URI.
    ///
    /// # Errors
    ///
    /// `NotFound` for URIs outside the `vat://` namespace or with an unknown
    /// category, `InvalidArguments` when a record URI does not have exactly
    /// two non-empty path segments.
    pub fn parse(uri: &str) -> Result<Self, ProviderError> {
        let unknown = || ProviderError::NotFound(format!("Unknown resource URI: {uri}"));

        let path = uri.strip_prefix(SCHEME).ok_or_else(unknown)?;
        if path == "status" {
            return Ok(Self::Status);
        }

        let (category, rest) = path.split_once('/').ok_or_else(unknown)?;
        let make: fn(ReportingPeriod) -> Self = match category {
            "drafts" => Self::Draft,
            "submissions" => Self::Submission,
            "decisions" => Self::Decision,
            _ => return Err(unknown()),
        };
        let kind = category.trim_end_matches('s');

        let mut segments = rest.split('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(redovisare), Some(period), None)
                if !redovisare.is_empty() && !period.is_empty() =>
            {
                Ok(make(ReportingPeriod::new(redovisare, period)))
            }
            _ => Err(ProviderError::InvalidArguments(format!(
                "Invalid {kind} URI format: {uri}"
            ))),
        }
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status => write!(f, "{SCHEME}status"),
            Self::Draft(key) => write!(f, "{SCHEME}drafts/{key}"),
            Self::Submission(key) => write!(f, "{SCHEME}submissions/{key}"),
            Self::Decision(key) => write!(f, "{SCHEME}decisions/{key}"),
        }
    }
}

/// Resource collaborator backed by a [`VatApi`].
pub struct VatResources {
    api: Arc<dyn VatApi>,
}

impl VatResources {
    /// Creates the provider.
    #[must_use]
    pub fn new(api: Arc<dyn VatApi>) -> Self {
        Self { api }
    }

    fn status_definition() -> ResourceDefinition {
        ResourceDefinition {
            uri: ResourceUri::Status.to_string(),
            name: "API Health Status".to_string(),
            description: Some(
                "Current health and status of the Skatteverket API connection".to_string(),
            ),
            mime_type: Some(JSON_MIME_TYPE.to_string()),
        }
    }

    fn draft_definition(key: ReportingPeriod) -> ResourceDefinition {
        ResourceDefinition {
            name: format!("VAT Draft - {key}"),
            description: Some(format!("VAT declaration draft for period {}", key.period)),
            mime_type: Some(JSON_MIME_TYPE.to_string()),
            uri: ResourceUri::Draft(key).to_string(),
        }
    }
}

fn json_content<T: Serialize>(uri: &str, value: &T) -> Result<ResourceContent, ProviderError> {
    Ok(ResourceContent {
        uri: uri.to_string(),
        mime_type: Some(JSON_MIME_TYPE.to_string()),
        text: to_pretty_json(value)?,
    })
}

fn missing(kind: &str, key: &ReportingPeriod) -> ProviderError {
    ProviderError::NotFound(format!("{kind} not found: {key}"))
}

#[async_trait]
impl ResourceProvider for VatResources {
    async fn list(&self) -> Result<Vec<ResourceDefinition>, ProviderError> {
        let mut resources = vec![Self::status_definition()];

        match self.api.list_drafts().await {
            Ok(list) => resources.extend(
                list.drafts
                    .iter()
                    .map(|draft| Self::draft_definition(draft.key())),
            ),
            Err(e) => tracing::warn!(error = %e, "Failed to load draft resources"),
        }

        Ok(resources)
    }

    async fn read(&self, uri: &str) -> Result<ResourceContent, ProviderError> {
        let resource = ResourceUri::parse(uri)?;
        tracing::debug!(uri, "Reading resource");

        match resource {
            ResourceUri::Status => json_content(uri, &self.api.ping().await?),
            ResourceUri::Draft(key) => {
                let draft = self.api.get_draft(&key).await?;
                json_content(uri, &draft.ok_or_else(|| missing("Draft", &key))?)
            }
            ResourceUri::Submission(key) => {
                let submission = self.api.get_submission(&key).await?;
                json_content(uri, &submission.ok_or_else(|| missing("Submission", &key))?)
            }
            ResourceUri::Decision(key) => {
                let decision = self.api.get_decision(&key).await?;
                json_content(uri, &decision.ok_or_else(|| missing("Decision", &key))?)
            }
        }
    }
}
