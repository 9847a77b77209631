//! vat-mcp: MCP server for Swedish VAT declarations
//!
//! This library exposes the Skatteverket VAT declaration API (drafts,
//! submissions and decisions) to AI assistants over the Model Context
//! Protocol.
//!
//! # Architecture
//!
//! - **Protocol engine** ([`mcp`]): newline-delimited JSON-RPC 2.0 over
//!   stdio, session gating, routing and result shaping
//! - **Collaborators**: [`tools`], [`resources`] and [`prompts`] built on a
//!   shared [`vat::VatApi`] handle
//! - **Data source** ([`vat`]): the REST API, or an in-memory store
//!
//! # Modules
//!
//! - [`config`] — Configuration loading and validation
//! - [`error`] — Configuration error types
//! - [`mcp`] — MCP protocol implementation
//! - [`prompts`] — Prompt templates
//! - [`resources`] — `vat://` resources
//! - [`tools`] — Draft and submission tools
//! - [`vat`] — VAT API client and models

pub mod config;
pub mod error;
pub mod mcp;
pub mod prompts;
pub mod resources;
pub mod tools;
pub mod vat;

use std::sync::Arc;

use crate::mcp::registry::{Collaborators, RegistryError, ToolProvider, ToolRouter};
use crate::prompts::VatPrompts;
use crate::resources::VatResources;
use crate::tools::{DraftTools, SubmissionTools};
use crate::vat::VatApi;

/// Wires every collaborator to one VAT data source.
///
/// # Errors
///
/// Returns `RegistryError::DuplicateTool` if two tool providers declare the
/// same tool name.
pub fn build_collaborators(api: Arc<dyn VatApi>) -> Result<Collaborators, RegistryError> {
    let providers: [Arc<dyn ToolProvider>; 2] = [
        Arc::new(DraftTools::new(Arc::clone(&api))),
        Arc::new(SubmissionTools::new(Arc::clone(&api))),
    ];

    Ok(Collaborators {
        tools: Arc::new(ToolRouter::from_providers(providers)?),
        resources: Arc::new(VatResources::new(api)),
        prompts: Arc::new(VatPrompts::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vat::MemoryVatApi;

    #[test]
    fn wires_twelve_tools() {
        let collaborators = build_collaborators(Arc::new(MemoryVatApi::new())).unwrap();
        assert_eq!(collaborators.tools.len(), 12);
        assert!(collaborators.tools.resolve("get_vat_drafts").is_some());
        assert!(collaborators.tools.resolve("health_check").is_some());
        assert_eq!(collaborators.prompts.prompts().len(), 4);
    }
}
