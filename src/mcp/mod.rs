//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the MCP specification for exposing VAT declaration
//! operations as tools, resources and prompts to AI assistants. The server
//! communicates over stdio transport using JSON-RPC 2.0 messages.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          MCP Server                          │
//! │                                                              │
//! │   ┌─────────────┐    ┌─────────────┐    ┌────────────────┐   │
//! │   │  Transport  │───▶│ Dispatcher  │───▶│ Collaborators  │   │
//! │   │   (stdio)   │◀───│  (session)  │    │ tools/res/pmpt │   │
//! │   └─────────────┘    └─────────────┘    └────────────────┘   │
//! │          │                  │                   │            │
//! │          ▼                  ▼                   ▼            │
//! │   ┌──────────────────────────────────────────────────────┐   │
//! │   │                  JSON-RPC Messages                   │   │
//! │   └──────────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod capabilities;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod transport;

pub use protocol::{
    ErrorCode, IncomingMessage, JsonRpcError, JsonRpcRequest, JsonRpcResponse, OutgoingMessage,
    RequestId, MCP_PROTOCOL_VERSION,
};
pub use registry::{Collaborators, RegistryError, ToolRouter};
pub use server::{Dispatcher, McpServer};
pub use session::{Session, SessionState};
pub use transport::{StdioTransport, Transport};
