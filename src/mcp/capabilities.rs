//! Capability negotiation for the `initialize` handshake.
//!
//! The server always answers with the same protocol version and capability
//! set. Client capabilities are accepted and logged but do not change
//! server behaviour.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mcp::protocol::{MCP_PROTOCOL_VERSION, SERVER_NAME};

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
    /// Resource-related capabilities.
    pub resources: ResourceCapabilities,
    /// Prompt-related capabilities.
    pub prompts: PromptCapabilities,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: ToolCapabilities {
                list_changed: false,
            },
            resources: ResourceCapabilities {
                subscribe: false,
                list_changed: true,
            },
            prompts: PromptCapabilities {
                list_changed: false,
            },
        }
    }
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    pub list_changed: bool,
}

/// Resource-specific capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCapabilities {
    /// Whether clients may subscribe to resource updates.
    pub subscribe: bool,
    /// Whether the server emits `notifications/resources/list_changed`.
    pub list_changed: bool,
}

/// Prompt-specific capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptCapabilities {
    /// Whether the prompt list can change during the session.
    pub list_changed: bool,
}

/// Server information for initialisation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

impl InitializeParams {
    /// Reads initialize params leniently: anything unreadable is ignored.
    #[must_use]
    pub fn from_params(params: Option<&Value>) -> Self {
        params
            .and_then(|p| serde_json::from_value(p.clone()).ok())
            .unwrap_or_default()
    }
}

/// The `initialize` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version the server speaks.
    pub protocol_version: &'static str,
    /// Advertised capabilities.
    pub capabilities: ServerCapabilities,
    /// Server identity.
    pub server_info: ServerInfo,
}

/// Builds the `initialize` result.
///
/// The result does not depend on what the client asked for.
#[must_use]
pub fn negotiate(params: &InitializeParams) -> InitializeResult {
    if let Some(requested) = params.protocol_version.as_deref() {
        if requested != MCP_PROTOCOL_VERSION {
            tracing::debug!(
                requested,
                offered = MCP_PROTOCOL_VERSION,
                "Client requested a different protocol version"
            );
        }
    }

    InitializeResult {
        protocol_version: MCP_PROTOCOL_VERSION,
        capabilities: ServerCapabilities::default(),
        server_info: ServerInfo::default(),
    }
}
