//! MCP tools over the VAT API.
//!
//! Two providers share one [`VatApi`](crate::vat::VatApi) handle:
//!
//! - [`DraftTools`] — list, read, create, delete, validate, lock and unlock drafts
//! - [`SubmissionTools`] — submitted declarations, tax decisions and API health

pub mod drafts;
pub mod submissions;

pub use drafts::DraftTools;
pub use submissions::SubmissionTools;

use serde::Serialize;
use serde_json::{json, Value};

use crate::mcp::registry::ProviderError;

/// Renders a record as indented JSON for a tool's text content.
pub(crate) fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, ProviderError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ProviderError::Internal(format!("failed to serialise result: {e}")))
}

/// Input schema of a tool that takes no arguments.
pub(crate) fn no_arguments_schema() -> Value {
    json!({
        "type": "object",
        "properties": {}
    })
}

/// Input schema of a tool addressed by reporter and period.
pub(crate) fn reporting_period_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "redovisare": {
                "type": "string",
                "description": "The tax reporter ID (personnummer/organisationsnummer)"
            },
            "period": {
                "type": "string",
                "description": "The reporting period (e.g., '2024-01' for January 2024)"
            }
        },
        "required": ["redovisare", "period"]
    })
}
