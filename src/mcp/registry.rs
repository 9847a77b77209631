//! Method registry and collaborator interfaces.
//!
//! The set of protocol methods is closed ([`Method`]). Tools, resources and
//! prompts are provided by collaborators behind the [`ToolProvider`],
//! [`ResourceProvider`] and [`PromptProvider`] traits. Every tool name is
//! bound to exactly one provider in a flat [`ToolRouter`] built at startup.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::vat::ApiError;

/// The protocol methods this server recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Handshake request.
    Initialize,
    /// Client's "handshake complete" notification.
    Initialized,
    /// List tool definitions.
    ToolsList,
    /// Execute a tool.
    ToolsCall,
    /// List resources.
    ResourcesList,
    /// Read one resource.
    ResourcesRead,
    /// List prompts.
    PromptsList,
    /// Render one prompt.
    PromptsGet,
    /// Liveness check.
    Ping,
}

impl Method {
    /// Every method, in the order they are documented.
    pub const ALL: [Self; 9] = [
        Self::Initialize,
        Self::Initialized,
        Self::ToolsList,
        Self::ToolsCall,
        Self::ResourcesList,
        Self::ResourcesRead,
        Self::PromptsList,
        Self::PromptsGet,
        Self::Ping,
    ];

    /// Looks up a method by wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "initialize" => Some(Self::Initialize),
            "initialized" | "notifications/initialized" => Some(Self::Initialized),
            "tools/list" => Some(Self::ToolsList),
            "tools/call" => Some(Self::ToolsCall),
            "resources/list" => Some(Self::ResourcesList),
            "resources/read" => Some(Self::ResourcesRead),
            "prompts/list" => Some(Self::PromptsList),
            "prompts/get" => Some(Self::PromptsGet),
            "ping" => Some(Self::Ping),
            _ => None,
        }
    }

    /// Returns the canonical wire name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Initialized => "initialized",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
            Self::ResourcesList => "resources/list",
            Self::ResourcesRead => "resources/read",
            Self::PromptsList => "prompts/list",
            Self::PromptsGet => "prompts/get",
            Self::Ping => "ping",
        }
    }

    /// Whether the method may only run after a successful `initialize`.
    ///
    /// The `initialized` notification is informational and never gated;
    /// sent as a request it is gated like any other method.
    #[must_use]
    pub const fn requires_session(self) -> bool {
        !matches!(self, Self::Initialize | Self::Ping)
    }
}

/// A content item in a tool result or prompt message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

impl Content {
    /// Creates a text item.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Returns the text of this item.
    #[must_use]
    pub fn as_text(&self) -> &str {
        match self {
            Self::Text { text } => text,
        }
    }
}

/// A tool definition for tools/list response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Result of a tool call.
///
/// Business failures are reported here with `is_error` set, never as
/// JSON-RPC errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<Content>,
    /// Whether the tool call resulted in an error.
    pub is_error: bool,
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(message)],
            is_error: true,
        }
    }
}

/// An entry in the resources/list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    /// Resource URI.
    pub uri: String,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type of the resource body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// The body of a read resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    /// URI the content was read from.
    pub uri: String,
    /// MIME type of `text`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// The content.
    pub text: String,
}

/// An entry in the prompts/list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptDefinition {
    /// Prompt name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared arguments.
    pub arguments: Vec<PromptArgument>,
}

/// A declared prompt argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the argument must be supplied.
    pub required: bool,
}

/// Who a prompt message is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side of the conversation.
    User,
    /// The model side of the conversation.
    Assistant,
}

/// One message of a rendered prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    /// Message author.
    pub role: Role,
    /// Message body.
    pub content: Content,
}

impl PromptMessage {
    /// Creates a user text message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::text(text),
        }
    }
}

/// Failures reported by collaborators.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The named tool, resource, prompt or record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Arguments or identifiers were missing or malformed.
    #[error("{0}")]
    InvalidArguments(String),

    /// The downstream data source failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Any other failure.
    #[error("{0}")]
    Internal(String),
}

impl ProviderError {
    /// Wraps an argument decode failure.
    #[must_use]
    pub fn invalid_arguments(err: &serde_json::Error) -> Self {
        Self::InvalidArguments(format!("Invalid arguments: {err}"))
    }
}

/// Decodes a tool or prompt argument bag into a typed struct.
///
/// # Errors
///
/// Returns `ProviderError::InvalidArguments` on any missing field or type
/// mismatch.
pub fn decode_arguments<T: serde::de::DeserializeOwned>(
    arguments: Map<String, Value>,
) -> Result<T, ProviderError> {
    serde_json::from_value(Value::Object(arguments))
        .map_err(|e| ProviderError::invalid_arguments(&e))
}

/// A group of tools served by one collaborator.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Definitions of every tool this provider serves.
    fn tools(&self) -> Vec<ToolDefinition>;

    /// Executes one of this provider's tools.
    ///
    /// An `Err` is reported to the client as a tool result with `isError`.
    async fn call(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolCallResult, ProviderError>;

    /// Whether a successful call to `name` changes the resource list.
    fn changes_resources(&self, _name: &str) -> bool {
        false
    }
}

/// Serves `resources/list` and `resources/read`.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Lists the currently readable resources.
    async fn list(&self) -> Result<Vec<ResourceDefinition>, ProviderError>;

    /// Reads one resource by URI.
    async fn read(&self, uri: &str) -> Result<ResourceContent, ProviderError>;
}

/// Serves `prompts/list` and `prompts/get`.
pub trait PromptProvider: Send + Sync {
    /// Definitions of every prompt.
    fn prompts(&self) -> Vec<PromptDefinition>;

    /// Renders a prompt.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown prompts, `InvalidArguments` for missing or
    /// malformed arguments.
    fn get(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Vec<PromptMessage>, ProviderError>;
}

/// Errors raised while building the tool table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two providers declared the same tool name.
    #[error("tool '{name}' is declared by more than one provider")]
    DuplicateTool {
        /// The clashing tool name.
        name: String,
    },
}

struct ToolRoute {
    definition: ToolDefinition,
    provider: Arc<dyn ToolProvider>,
}

/// Flat mapping from tool name to the provider that owns it.
///
/// Declaration order is preserved for `tools/list`.
#[derive(Default)]
pub struct ToolRouter {
    routes: IndexMap<String, ToolRoute>,
}

impl ToolRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a router from the union of every provider's tools.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateTool` if a name is declared twice.
    pub fn from_providers(
        providers: impl IntoIterator<Item = Arc<dyn ToolProvider>>,
    ) -> Result<Self, RegistryError> {
        let mut router = Self::new();
        for provider in providers {
            router.register(provider)?;
        }
        Ok(router)
    }

    /// Adds every tool of `provider`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateTool` if a name is already bound.
    /// The router is left unchanged in that case.
    pub fn register(&mut self, provider: Arc<dyn ToolProvider>) -> Result<(), RegistryError> {
        let definitions = provider.tools();

        for (i, def) in definitions.iter().enumerate() {
            let repeated_in_batch = definitions[..i].iter().any(|d| d.name == def.name);
            if repeated_in_batch || self.routes.contains_key(&def.name) {
                return Err(RegistryError::DuplicateTool {
                    name: def.name.clone(),
                });
            }
        }

        for definition in definitions {
            self.routes.insert(
                definition.name.clone(),
                ToolRoute {
                    definition,
                    provider: Arc::clone(&provider),
                },
            );
        }
        Ok(())
    }

    /// Returns the provider owning `name`.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn ToolProvider>> {
        self.routes.get(name).map(|r| &r.provider)
    }

    /// Returns every tool definition in declaration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.routes.values().map(|r| r.definition.clone()).collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl std::fmt::Debug for ToolRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRouter")
            .field("tools", &self.routes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Every collaborator the dispatcher routes to.
#[derive(Clone)]
pub struct Collaborators {
    /// Tool table.
    pub tools: Arc<ToolRouter>,
    /// Resource collaborator.
    pub resources: Arc<dyn ResourceProvider>,
    /// Prompt collaborator.
    pub prompts: Arc<dyn PromptProvider>,
}
