//! Prompt templates for common VAT workflows.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::mcp::registry::{
    decode_arguments, PromptArgument, PromptDefinition, PromptMessage, PromptProvider,
    ProviderError,
};
use crate::vat::ReportingPeriod;

/// Arguments of `check_status`.
#[derive(Debug, Deserialize)]
struct CheckStatusArgs {
    #[serde(default)]
    redovisare: Option<String>,
}

/// Prompt collaborator with the built-in VAT workflows.
#[derive(Debug, Default, Clone, Copy)]
pub struct VatPrompts;

impl VatPrompts {
    /// Creates the provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn argument(name: &str, description: &str, required: bool) -> PromptArgument {
    PromptArgument {
        name: name.to_string(),
        description: Some(description.to_string()),
        required,
    }
}

fn prompt(name: &str, description: &str, arguments: Vec<PromptArgument>) -> PromptDefinition {
    PromptDefinition {
        name: name.to_string(),
        description: Some(description.to_string()),
        arguments,
    }
}

fn create_monthly_vat(key: &ReportingPeriod) -> String {
    format!(
        "I need to create a monthly VAT declaration for:
- Redovisare: {}
- Period: {}

Please guide me through the following steps:
1. Check if a draft already exists
2. Gather the required information:
   - Total sales subject to VAT (momsinkomst)
   - Outgoing VAT (utgående moms)
   - Incoming VAT (ingående moms)
3. Create or update the draft
4. Validate the draft
5. Show me a summary

Can you help me with this process?",
        key.redovisare, key.period
    )
}

fn review_draft(key: &ReportingPeriod) -> String {
    format!(
        "Please review my VAT draft for {key}:

1. Retrieve the current draft
2. Validate it for errors
3. Check the calculations:
   - Are the VAT amounts correct?
   - Is the net amount to pay/receive calculated correctly?
4. Provide a summary of any issues or confirm it's ready for submission

Please conduct this review and let me know if anything needs attention."
    )
}

fn check_status(redovisare: &str) -> String {
    format!(
        "Please check the status of my VAT declarations for {redovisare}:

1. Show me all current drafts
2. Show me recent submissions
3. Show me any pending decisions
4. Highlight any deadlines or actions needed

Provide a clear overview of my VAT declaration status."
    )
}

fn submission_checklist(key: &ReportingPeriod) -> String {
    format!(
        "I'm preparing to submit my VAT declaration for {key}.

Please help me with this pre-submission checklist:

✓ Draft exists and is complete
✓ All required fields are filled
✓ Validation passes without errors
✓ Calculations are correct:
  - Outgoing VAT matches sales
  - Incoming VAT is properly documented
  - Net amount is calculated correctly
✓ Supporting documentation is ready
✓ Draft is locked and ready for signing

Please verify each item and let me know if I'm ready to submit or if anything needs attention."
    )
}

impl PromptProvider for VatPrompts {
    fn prompts(&self) -> Vec<PromptDefinition> {
        vec![
            prompt(
                "create_monthly_vat",
                "Guided workflow to create a monthly VAT declaration",
                vec![
                    argument(
                        "redovisare",
                        "Tax reporter ID (personnummer/organisationsnummer)",
                        true,
                    ),
                    argument("period", "Reporting period (e.g., '2024-01')", true),
                ],
            ),
            prompt(
                "review_draft",
                "Review and validate a VAT draft before submission",
                vec![
                    argument("redovisare", "Tax reporter ID", true),
                    argument("period", "Reporting period", true),
                ],
            ),
            prompt(
                "check_status",
                "Check the status of VAT declarations and submissions",
                vec![argument(
                    "redovisare",
                    "Tax reporter ID (optional - shows all if not provided)",
                    false,
                )],
            ),
            prompt(
                "submission_checklist",
                "Pre-submission checklist for VAT declaration",
                vec![
                    argument("redovisare", "Tax reporter ID", true),
                    argument("period", "Reporting period", true),
                ],
            ),
        ]
    }

    fn get(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Vec<PromptMessage>, ProviderError> {
        let text = match name {
            "create_monthly_vat" => create_monthly_vat(&decode_arguments(arguments)?),
            "review_draft" => review_draft(&decode_arguments(arguments)?),
            "check_status" => {
                let args: CheckStatusArgs = decode_arguments(arguments)?;
                check_status(args.redovisare.as_deref().unwrap_or("all reporters"))
            }
            "submission_checklist" => submission_checklist(&decode_arguments(arguments)?),
            _ => return Err(ProviderError::NotFound(format!("Unknown prompt: {name}"))),
        };
        Ok(vec![PromptMessage::user(text)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::registry::Role;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn declares_four_prompts() {
        let prompts = VatPrompts::new().prompts();
        let names: Vec<&str> = prompts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "create_monthly_vat",
                "review_draft",
                "check_status",
                "submission_checklist"
            ]
        );
        assert!(!prompts[2].arguments[0].required);
    }

    #[test]
    fn renders_single_user_message() {
        let messages = VatPrompts::new()
            .get(
                "create_monthly_vat",
                args(json!({"redovisare": "5566778899", "period": "2024-01"})),
            )
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        let text = messages[0].content.as_text();
        assert!(text.contains("- Redovisare: 5566778899"));
        assert!(text.contains("- Period: 2024-01"));
    }

    #[test]
    fn review_and_checklist_name_the_period() {
        let prompts = VatPrompts::new();
        let key = json!({"redovisare": "1", "period": "2024-05"});
        let review = prompts.get("review_draft", args(key.clone())).unwrap();
        assert!(review[0]
            .content
            .as_text()
            .starts_with("Please review my VAT draft for 1/2024-05:"));
        let checklist = prompts.get("submission_checklist", args(key)).unwrap();
        assert!(checklist[0].content.as_text().contains("for 1/2024-05."));
    }

    #[test]
    fn check_status_defaults_to_all_reporters() {
        let prompts = VatPrompts::new();
        let all = prompts.get("check_status", Map::new()).unwrap();
        assert!(all[0].content.as_text().contains("for all reporters:"));

        let one = prompts
            .get("check_status", args(json!({"redovisare": "42"})))
            .unwrap();
        assert!(one[0].content.as_text().contains("for 42:"));
    }

    #[test]
    fn missing_required_argument_is_invalid() {
        let err = VatPrompts::new()
            .get("review_draft", args(json!({"redovisare": "1"})))
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidArguments(_)));
    }

    #[test]
    fn unknown_prompt_is_not_found() {
        let err = VatPrompts::new().get("file_taxes", Map::new()).unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert_eq!(err.to_string(), "Unknown prompt: file_taxes");
    }
}
