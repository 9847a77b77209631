//! JSON-RPC 2.0 message types for MCP protocol.
//!
//! This module defines the core message types used in the Model Context Protocol.
//! All messages follow the JSON-RPC 2.0 specification with MCP-specific extensions.
//!
//! # Message Types
//!
//! - **Request**: A message expecting a response (has `id`)
//! - **Notification**: A one-way message (no `id`, never answered)
//! - **Response**: A reply to a request (success or error)
//!
//! # Decoding Rules
//!
//! - Request IDs are integers or strings; any other kind means "no id"
//! - `method` must be a non-empty string
//! - `params`, when present, must be an object
//! - Unknown methods decode fine; routing is the dispatcher's concern

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The MCP protocol version this implementation supports.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name for capability negotiation.
pub const SERVER_NAME: &str = "vat-mcp";

/// The only JSON-RPC version accepted and emitted.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC 2.0 request ID.
///
/// IDs are opaque: they are never interpreted, only echoed back with the
/// same JSON kind they arrived with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID.
    Number(i64),
    /// String request ID.
    String(String),
}

impl RequestId {
    /// Extracts an ID from a raw `id` member.
    ///
    /// Returns `None` for numbers outside `i64`, `null` and every other
    /// JSON kind. [`parse_message`] rejects such numbers before asking.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Number),
            Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// A JSON-RPC 2.0 request message.
///
/// Requests expect exactly one response carrying the same ID.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    /// Request identifier, echoed in the response.
    pub id: RequestId,

    /// The method to invoke.
    pub method: String,

    /// Parameters object, if any.
    pub params: Option<Value>,
}

/// A JSON-RPC 2.0 notification message (incoming).
///
/// Notifications do not have an ID and never receive a response.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcNotification {
    /// The notification method.
    pub method: String,

    /// Parameters object, if any.
    pub params: Option<Value>,
}

/// A response sent by the client.
///
/// This server never issues requests of its own, so these are only logged.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingResponse {
    /// ID of the request being answered, if readable.
    pub id: Option<RequestId>,

    /// Whether the response carried an `error` member.
    pub is_error: bool,
}

/// An outgoing JSON-RPC 2.0 notification (server to client).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingNotification {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The notification method.
    pub method: String,

    /// Optional parameters for the notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl OutgoingNotification {
    /// Creates a new outgoing notification.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params: params.filter(|p| !p.is_null()),
        }
    }

    /// Tells the client that the set of readable resources has changed.
    #[must_use]
    pub fn resources_list_changed() -> Self {
        Self::new("notifications/resources/list_changed", None)
    }
}

/// A successful JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The request ID this response corresponds to.
    pub id: RequestId,

    /// The result of the method call.
    pub result: Value,
}

impl JsonRpcResponse {
    /// Creates a new success response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Value is not const-compatible
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// The closed set of error codes this server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Invalid JSON was received by the server.
    ParseError,
    /// The JSON sent is not a valid Request object.
    InvalidRequest,
    /// The method does not exist or is not available.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
    /// MCP lifecycle error (e.g. server not initialized).
    McpError,
    /// A tool failed to execute.
    ToolExecutionError,
    /// The requested resource does not exist.
    ResourceNotFound,
    /// The requested prompt does not exist.
    PromptNotFound,
}

impl ErrorCode {
    /// Every code, in wire-code order.
    pub const ALL: [Self; 9] = [
        Self::ParseError,
        Self::InvalidRequest,
        Self::MethodNotFound,
        Self::InvalidParams,
        Self::InternalError,
        Self::McpError,
        Self::ToolExecutionError,
        Self::ResourceNotFound,
        Self::PromptNotFound,
    ];

    /// Returns the numeric code for this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::McpError => -32000,
            Self::ToolExecutionError => -32001,
            Self::ResourceNotFound => -32002,
            Self::PromptNotFound => -32003,
        }
    }

    /// Looks up the variant for a numeric code.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Returns the default message for this error code.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::McpError => "Server error",
            Self::ToolExecutionError => "Tool execution error",
            Self::ResourceNotFound => "Resource not found",
            Self::PromptNotFound => "Prompt not found",
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcErrorData {
    /// The error code.
    pub code: i32,

    /// A short description of the error.
    pub message: String,

    /// Additional information about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorData {
    /// Creates a new error from an error code.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self::with_message(code, code.default_message())
    }

    /// Creates a new error with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Adds additional data to the error. `null` is treated as absent.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data).filter(|d| !d.is_null());
        self
    }
}

/// A JSON-RPC 2.0 error response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcError {
    /// Always "2.0".
    pub jsonrpc: &'static str,

    /// The request ID this error corresponds to (if known).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// The error details.
    pub error: JsonRpcErrorData,
}

impl JsonRpcError {
    /// Creates a new error response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // JsonRpcErrorData contains String
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorData) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            error,
        }
    }

    /// Creates an error response with a code and message.
    #[must_use]
    pub fn with_code(id: Option<RequestId>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(id, JsonRpcErrorData::with_message(code, message))
    }

    /// Creates a parse error response (ID cannot be determined).
    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(None, JsonRpcErrorData::from_code(ErrorCode::ParseError))
    }

    /// Creates an invalid request error response.
    #[must_use]
    pub fn invalid_request(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::with_code(id, ErrorCode::InvalidRequest, message)
    }

    /// Creates a method not found error response.
    #[must_use]
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::with_code(
            Some(id),
            ErrorCode::MethodNotFound,
            format!("Unknown method: {method}"),
        )
    }

    /// Creates an invalid params error response.
    #[must_use]
    pub fn invalid_params(id: RequestId, message: impl Into<String>) -> Self {
        Self::with_code(Some(id), ErrorCode::InvalidParams, message)
    }

    /// Creates an internal error response.
    #[must_use]
    pub fn internal_error(id: RequestId, message: impl Into<String>) -> Self {
        Self::with_code(Some(id), ErrorCode::InternalError, message)
    }

    /// Creates the error returned for any gated method before `initialize`.
    #[must_use]
    pub fn not_initialized(id: RequestId) -> Self {
        Self::with_code(Some(id), ErrorCode::McpError, "Server not initialized")
    }

    /// Returns the numeric error code.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.error.code
    }
}

/// Any message the server writes to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutgoingMessage {
    /// A successful response.
    Response(JsonRpcResponse),
    /// An error response.
    Error(JsonRpcError),
    /// A server-initiated notification.
    Notification(OutgoingNotification),
}

impl OutgoingMessage {
    /// Returns the ID this message answers, if any.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Response(r) => Some(&r.id),
            Self::Error(e) => e.id.as_ref(),
            Self::Notification(_) => None,
        }
    }
}

impl From<JsonRpcResponse> for OutgoingMessage {
    fn from(r: JsonRpcResponse) -> Self {
        Self::Response(r)
    }
}

impl From<JsonRpcError> for OutgoingMessage {
    fn from(e: JsonRpcError) -> Self {
        Self::Error(e)
    }
}

impl From<OutgoingNotification> for OutgoingMessage {
    fn from(n: OutgoingNotification) -> Self {
        Self::Notification(n)
    }
}

/// A decoded incoming message.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    /// A request expecting a response.
    Request(JsonRpcRequest),
    /// A notification (no response expected).
    Notification(JsonRpcNotification),
    /// A response from the client.
    Response(IncomingResponse),
}

impl IncomingMessage {
    /// Returns the method name, or `None` for client responses.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(req) => Some(&req.method),
            Self::Notification(notif) => Some(&notif.method),
            Self::Response(_) => None,
        }
    }

    /// Returns the request ID if this is a request.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(req) => Some(&req.id),
            Self::Notification(_) => None,
            Self::Response(resp) => resp.id.as_ref(),
        }
    }
}

/// Parses one frame into an incoming message.
///
/// # Errors
///
/// Returns a `JsonRpcError` ready to be written back if the frame is not
/// valid JSON (`ParseError`) or not a valid message (`InvalidRequest`,
/// `InvalidParams`). The error carries the request ID whenever one could
/// be read.
pub fn parse_message(frame: impl AsRef<[u8]>) -> Result<IncomingMessage, JsonRpcError> {
    let value: Value =
        serde_json::from_slice(frame.as_ref()).map_err(|_| JsonRpcError::parse_error())?;

    let Value::Object(mut obj) = value else {
        return Err(JsonRpcError::invalid_request(
            None,
            "Message must be a JSON object",
        ));
    };

    let id = match obj.get("id") {
        Some(Value::Number(n)) if n.as_i64().is_none() => {
            return Err(JsonRpcError::invalid_request(
                None,
                "id must be an integer or a string",
            ));
        }
        id => id.and_then(RequestId::from_value),
    };

    if let Some(version) = obj.get("jsonrpc") {
        if version.as_str() != Some(JSONRPC_VERSION) {
            return Err(JsonRpcError::invalid_request(
                id,
                "jsonrpc field must be \"2.0\"",
            ));
        }
    }

    let method = match obj.remove("method") {
        Some(Value::String(m)) if !m.is_empty() => m,
        Some(_) => return Err(JsonRpcError::invalid_request(id, "Invalid method")),
        None if obj.contains_key("result") || obj.contains_key("error") => {
            return Ok(IncomingMessage::Response(IncomingResponse {
                id,
                is_error: obj.contains_key("error"),
            }));
        }
        None => {
            return Err(JsonRpcError::invalid_request(id, "Missing method property"));
        }
    };

    let params = match obj.remove("params") {
        None | Some(Value::Null) => None,
        Some(p @ Value::Object(_)) => Some(p),
        Some(_) => {
            return Err(JsonRpcError::with_code(
                id,
                ErrorCode::InvalidParams,
                "params must be an object",
            ));
        }
    };

    Ok(match id {
        Some(id) => IncomingMessage::Request(JsonRpcRequest { id, method, params }),
        None => IncomingMessage::Notification(JsonRpcNotification { method, params }),
    })
}

/// Reads a named string member of a params object.
///
/// Returns `None` when params are absent, the member is missing, or it is
/// not a non-empty string.
#[must_use]
pub fn string_param<'a>(params: Option<&'a Value>, name: &str) -> Option<&'a str> {
    params
        .and_then(|p| p.get(name))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Reads the optional `arguments` object of a params object.
///
/// A missing or `null` member yields an empty map.
///
/// # Errors
///
/// Returns a message if `arguments` is present but not an object.
pub fn arguments_param(params: Option<&Value>) -> Result<Map<String, Value>, &'static str> {
    match params.and_then(|p| p.get("arguments")) {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => Err("arguments must be an object"),
    }
}
