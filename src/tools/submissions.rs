//! Submission, decision and health tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{no_arguments_schema, reporting_period_schema, to_pretty_json};
use crate::mcp::registry::{
    decode_arguments, ProviderError, ToolCallResult, ToolDefinition, ToolProvider,
};
use crate::vat::{ReportingPeriod, VatApi};

/// Read-only tools for submitted declarations and tax decisions.
pub struct SubmissionTools {
    api: Arc<dyn VatApi>,
}

impl SubmissionTools {
    /// Creates the provider.
    #[must_use]
    pub fn new(api: Arc<dyn VatApi>) -> Self {
        Self { api }
    }

    async fn get_submissions(&self) -> Result<ToolCallResult, ProviderError> {
        let submissions = self.api.list_submissions().await?;
        Ok(ToolCallResult::text(format!(
            "Retrieved {} VAT submissions:\n{}",
            submissions.total,
            to_pretty_json(&submissions)?
        )))
    }

    async fn get_submission(&self, key: ReportingPeriod) -> Result<ToolCallResult, ProviderError> {
        let text = match self.api.get_submission(&key).await? {
            Some(submission) => format!(
                "VAT submission for {key}:\n{}",
                to_pretty_json(&submission)?
            ),
            None => format!("No submission found for {key}"),
        };
        Ok(ToolCallResult::text(text))
    }

    async fn get_decisions(&self) -> Result<ToolCallResult, ProviderError> {
        let decisions = self.api.list_decisions().await?;
        Ok(ToolCallResult::text(format!(
            "Retrieved {} VAT decisions:\n{}",
            decisions.total,
            to_pretty_json(&decisions)?
        )))
    }

    async fn get_decision(&self, key: ReportingPeriod) -> Result<ToolCallResult, ProviderError> {
        let text = match self.api.get_decision(&key).await? {
            Some(decision) => format!("VAT decision for {key}:\n{}", to_pretty_json(&decision)?),
            None => format!("No decision found for {key}"),
        };
        Ok(ToolCallResult::text(text))
    }

    async fn health_check(&self) -> Result<ToolCallResult, ProviderError> {
        let health = self.api.ping().await?;
        Ok(ToolCallResult::text(format!(
            "Health check result:\n{}",
            to_pretty_json(&health)?
        )))
    }
}

#[async_trait]
impl ToolProvider for SubmissionTools {
    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "get_vat_submissions".to_string(),
                description: "Retrieve all submitted VAT declarations for the authenticated user"
                    .to_string(),
                input_schema: no_arguments_schema(),
            },
            ToolDefinition {
                name: "get_vat_submission".to_string(),
                description: "Get a specific submitted VAT declaration by redovisare and period"
                    .to_string(),
                input_schema: reporting_period_schema(),
            },
            ToolDefinition {
                name: "get_vat_decisions".to_string(),
                description: "Retrieve all tax decisions for the authenticated user".to_string(),
                input_schema: no_arguments_schema(),
            },
            ToolDefinition {
                name: "get_vat_decision".to_string(),
                description: "Get a specific tax decision by redovisare and period".to_string(),
                input_schema: reporting_period_schema(),
            },
            ToolDefinition {
                name: "health_check".to_string(),
                description: "Check connectivity and health status of the Skatteverket API"
                    .to_string(),
                input_schema: no_arguments_schema(),
            },
        ]
    }

    async fn call(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolCallResult, ProviderError> {
        match name {
            "get_vat_submissions" => self.get_submissions().await,
            "get_vat_submission" => self.get_submission(decode_arguments(arguments)?).await,
            "get_vat_decisions" => self.get_decisions().await,
            "get_vat_decision" => self.get_decision(decode_arguments(arguments)?).await,
            "health_check" => self.health_check().await,
            _ => Err(ProviderError::NotFound(format!("Unknown tool: {name}"))),
        }
    }
}
