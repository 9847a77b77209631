//! Draft tools: `get_vat_drafts`, `get_vat_draft`, `create_vat_draft`,
//! `delete_vat_draft`, `validate_vat_draft`, `lock_vat_draft`,
//! `unlock_vat_draft`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{no_arguments_schema, reporting_period_schema, to_pretty_json};
use crate::mcp::registry::{
    decode_arguments, ProviderError, ToolCallResult, ToolDefinition, ToolProvider,
};
use crate::vat::{ReportingPeriod, VatApi, VatDraftRequest};

/// Arguments of `create_vat_draft`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDraftArgs {
    redovisare: String,
    period: String,
    #[serde(default)]
    momsinkomst: Option<f64>,
    #[serde(default)]
    utgaende_moms: Option<f64>,
    #[serde(default)]
    ingaende_moms: Option<f64>,
}

/// Tools that operate on VAT declaration drafts.
pub struct DraftTools {
    api: Arc<dyn VatApi>,
}

impl DraftTools {
    /// Creates the provider.
    #[must_use]
    pub fn new(api: Arc<dyn VatApi>) -> Self {
        Self { api }
    }

    async fn get_drafts(&self) -> Result<ToolCallResult, ProviderError> {
        let drafts = self.api.list_drafts().await?;
        let json = to_pretty_json(&drafts)?;
        Ok(ToolCallResult::text(format!(
            "Retrieved {} VAT drafts:\n{json}",
            drafts.total
        )))
    }

    async fn get_draft(&self, key: ReportingPeriod) -> Result<ToolCallResult, ProviderError> {
        match self.api.get_draft(&key).await? {
            Some(draft) => Ok(ToolCallResult::text(format!(
                "VAT draft for {key}:\n{}",
                to_pretty_json(&draft)?
            ))),
            None => Ok(ToolCallResult::text(format!("No draft found for {key}"))),
        }
    }

    async fn create_draft(&self, args: CreateDraftArgs) -> Result<ToolCallResult, ProviderError> {
        let key = ReportingPeriod::new(args.redovisare, args.period);
        let request = VatDraftRequest {
            momsinkomst: args.momsinkomst,
            utgaende_moms: args.utgaende_moms,
            ingaende_moms: args.ingaende_moms,
            metadata: None,
        };

        let draft = self.api.upsert_draft(&key, &request).await?;
        tracing::info!(%key, "VAT draft saved");
        Ok(ToolCallResult::text(format!(
            "Successfully created/updated VAT draft:\n{}",
            to_pretty_json(&draft)?
        )))
    }

    async fn delete_draft(&self, key: ReportingPeriod) -> Result<ToolCallResult, ProviderError> {
        let text = if self.api.delete_draft(&key).await? {
            tracing::info!(%key, "VAT draft deleted");
            format!("Successfully deleted VAT draft for {key}")
        } else {
            format!("No draft found for {key}")
        };
        Ok(ToolCallResult::text(text))
    }

    async fn validate_draft(&self, key: ReportingPeriod) -> Result<ToolCallResult, ProviderError> {
        let validation = self.api.validate_draft(&key).await?;
        Ok(ToolCallResult::text(format!(
            "Validation result for {key}:\n{}",
            to_pretty_json(&validation)?
        )))
    }

    async fn lock_draft(&self, key: ReportingPeriod) -> Result<ToolCallResult, ProviderError> {
        self.api.lock_draft(&key).await?;
        Ok(ToolCallResult::text(format!(
            "Successfully locked VAT draft for {key}"
        )))
    }

    async fn unlock_draft(&self, key: ReportingPeriod) -> Result<ToolCallResult, ProviderError> {
        self.api.unlock_draft(&key).await?;
        Ok(ToolCallResult::text(format!(
            "Successfully unlocked VAT draft for {key}"
        )))
    }
}

#[async_trait]
impl ToolProvider for DraftTools {
    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "get_vat_drafts".to_string(),
                description: "Retrieve all VAT declaration drafts for the authenticated user"
                    .to_string(),
                input_schema: no_arguments_schema(),
            },
            ToolDefinition {
                name: "get_vat_draft".to_string(),
                description:
                    "Get a specific VAT declaration draft by redovisare (reporter ID) and period"
                        .to_string(),
                input_schema: reporting_period_schema(),
            },
            ToolDefinition {
                name: "create_vat_draft".to_string(),
                description: "Create or update a VAT declaration draft with financial data. \
                              Amounts that are omitted keep their current value."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "redovisare": {
                            "type": "string",
                            "description": "The tax reporter ID (personnummer/organisationsnummer)"
                        },
                        "period": {
                            "type": "string",
                            "description": "The reporting period (e.g., '2024-01' for January 2024)"
                        },
                        "momsinkomst": {
                            "type": "number",
                            "description": "Optional: VAT income amount"
                        },
                        "utgaendeMoms": {
                            "type": "number",
                            "description": "Optional: outgoing VAT amount"
                        },
                        "ingaendeMoms": {
                            "type": "number",
                            "description": "Optional: incoming VAT amount"
                        }
                    },
                    "required": ["redovisare", "period"]
                }),
            },
            ToolDefinition {
                name: "delete_vat_draft".to_string(),
                description: "Delete a VAT declaration draft".to_string(),
                input_schema: reporting_period_schema(),
            },
            ToolDefinition {
                name: "validate_vat_draft".to_string(),
                description: "Validate a VAT declaration draft and check for errors".to_string(),
                input_schema: reporting_period_schema(),
            },
            ToolDefinition {
                name: "lock_vat_draft".to_string(),
                description: "Lock a VAT draft for signing (prevents further modifications)"
                    .to_string(),
                input_schema: reporting_period_schema(),
            },
            ToolDefinition {
                name: "unlock_vat_draft".to_string(),
                description: "Unlock a VAT draft to allow modifications".to_string(),
                input_schema: reporting_period_schema(),
            },
        ]
    }

    async fn call(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolCallResult, ProviderError> {
        match name {
            "get_vat_drafts" => self.get_drafts().await,
            "get_vat_draft" => self.get_draft(decode_arguments(arguments)?).await,
            "create_vat_draft" => self.create_draft(decode_arguments(arguments)?).await,
            "delete_vat_draft" => self.delete_draft(decode_arguments(arguments)?).await,
            "validate_vat_draft" => self.validate_draft(decode_arguments(arguments)?).await,
            "lock_vat_draft" => self.lock_draft(decode_arguments(arguments)?).await,
            "unlock_vat_draft" => self.unlock_draft(decode_arguments(arguments)?).await,
            _ => Err(ProviderError::NotFound(format!("Unknown tool: {name}"))),
        }
    }

    fn changes_resources(&self, name: &str) -> bool {
        matches!(name, "create_vat_draft" | "delete_vat_draft")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vat::{ApiError, MemoryVatApi};

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn tools() -> DraftTools {
        DraftTools::new(Arc::new(MemoryVatApi::new()))
    }

    #[test]
    fn declares_seven_tools() {
        let names: Vec<String> = tools().tools().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            [
                "get_vat_drafts",
                "get_vat_draft",
                "create_vat_draft",
                "delete_vat_draft",
                "validate_vat_draft",
                "lock_vat_draft",
                "unlock_vat_draft",
            ]
        );
    }

    #[test]
    fn only_create_and_delete_change_resources() {
        let tools = tools();
        assert!(tools.changes_resources("create_vat_draft"));
        assert!(tools.changes_resources("delete_vat_draft"));
        assert!(!tools.changes_resources("lock_vat_draft"));
        assert!(!tools.changes_resources("get_vat_drafts"));
    }

    #[tokio::test]
    async fn create_then_get_draft() {
        let tools = tools();
        let created = tools
            .call(
                "create_vat_draft",
                args(json!({
                    "redovisare": "5566778899",
                    "period": "2024-01",
                    "momsinkomst": 100000,
                    "utgaendeMoms": 25000.5,
                    "ingaendeMoms": 5000
                })),
            )
            .await
            .unwrap();
        assert!(!created.is_error);
        assert!(created.content[0]
            .as_text()
            .starts_with("Successfully created/updated VAT draft:\n"));
        assert!(created.content[0].as_text().contains("\"attBetala\": 20000.5"));

        let fetched = tools
            .call(
                "get_vat_draft",
                args(json!({"redovisare": "5566778899", "period": "2024-01"})),
            )
            .await
            .unwrap();
        assert!(fetched.content[0]
            .as_text()
            .starts_with("VAT draft for 5566778899/2024-01:\n"));
    }

    #[tokio::test]
    async fn missing_draft_is_not_an_error() {
        let result = tools()
            .call(
                "get_vat_draft",
                args(json!({"redovisare": "999", "period": "9999-99"})),
            )
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content[0].as_text(), "No draft found for 999/9999-99");
    }

    #[tokio::test]
    async fn delete_reports_both_outcomes() {
        let tools = tools();
        let key = json!({"redovisare": "1", "period": "2024-02"});

        let missing = tools.call("delete_vat_draft", args(key.clone())).await.unwrap();
        assert_eq!(missing.content[0].as_text(), "No draft found for 1/2024-02");

        tools.call("create_vat_draft", args(key.clone())).await.unwrap();
        let deleted = tools.call("delete_vat_draft", args(key)).await.unwrap();
        assert_eq!(
            deleted.content[0].as_text(),
            "Successfully deleted VAT draft for 1/2024-02"
        );
    }

    #[tokio::test]
    async fn lock_and_unlock_messages() {
        let tools = tools();
        let key = json!({"redovisare": "1", "period": "2024-03"});
        tools.call("create_vat_draft", args(key.clone())).await.unwrap();

        let locked = tools.call("lock_vat_draft", args(key.clone())).await.unwrap();
        assert_eq!(
            locked.content[0].as_text(),
            "Successfully locked VAT draft for 1/2024-03"
        );
        let unlocked = tools.call("unlock_vat_draft", args(key)).await.unwrap();
        assert_eq!(
            unlocked.content[0].as_text(),
            "Successfully unlocked VAT draft for 1/2024-03"
        );
    }

    #[tokio::test]
    async fn missing_argument_is_invalid() {
        let err = tools()
            .call("get_vat_draft", args(json!({"redovisare": "1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidArguments(_)));
        assert!(err.to_string().contains("period"));
    }

    #[tokio::test]
    async fn wrongly_typed_amount_is_invalid() {
        let err = tools()
            .call(
                "create_vat_draft",
                args(json!({"redovisare": "1", "period": "2024-01", "momsinkomst": "lots"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn downstream_failure_propagates() {
        let api = Arc::new(MemoryVatApi::new());
        api.set_available(false);
        let err = DraftTools::new(api)
            .call("get_vat_drafts", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api(ApiError::Unavailable)));
    }
}
