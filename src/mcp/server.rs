//! MCP server for VAT declarations.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: `initialize` answers with the fixed capability set
//!    and moves the [`Session`] to ready
//! 2. **Operation**: tools, resources and prompts are routed to the
//!    collaborators in [`Collaborators`]
//! 3. **Shutdown**: end of input, or cancellation of the run token
//!
//! # Architecture
//!
//! [`Dispatcher`] turns one decoded message into the messages to write
//! back. It is transport-agnostic and cheap to clone. [`McpServer`] owns the
//! read loop: it decodes frames, runs each message on its own task (bounded
//! by `max_concurrent`) and writes replies through the shared
//! [`FrameWriter`]. A handler that panics is answered with `InternalError`.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::mcp::capabilities::{negotiate, InitializeParams};
use crate::mcp::protocol::{
    arguments_param, parse_message, string_param, ErrorCode, IncomingMessage, IncomingResponse,
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, OutgoingMessage,
    OutgoingNotification, RequestId,
};
use crate::mcp::registry::{Collaborators, Method, ProviderError, ToolCallResult};
use crate::mcp::session::{Session, SessionState};
use crate::mcp::transport::{FrameWriter, Transport};

/// Upper bound for `max_concurrent`.
pub const MAX_CONCURRENT_LIMIT: usize = 256;

/// Stand-in id used while routing a notification.
const NOTIFICATION_ID: &str = "notification";

/// Successful outcome of a routed request.
struct Reply {
    result: Value,
    resources_changed: bool,
}

impl From<Value> for Reply {
    fn from(result: Value) -> Self {
        Self {
            result,
            resources_changed: false,
        }
    }
}

/// Serialises a handler result, reporting failure as `InternalError`.
fn to_result<T: Serialize>(id: &RequestId, value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, %id, "Failed to serialise result");
        JsonRpcError::internal_error(id.clone(), format!("Failed to serialise result: {e}"))
    })
}

/// Maps a resource or prompt collaborator failure to a JSON-RPC error.
fn provider_error(id: &RequestId, error: ProviderError, not_found: ErrorCode) -> JsonRpcError {
    match error {
        ProviderError::NotFound(message) => {
            JsonRpcError::with_code(Some(id.clone()), not_found, message)
        }
        ProviderError::InvalidArguments(message) => JsonRpcError::invalid_params(id.clone(), message),
        ProviderError::Api(e) => {
            tracing::error!(error = %e, %id, "Downstream API failure");
            JsonRpcError::internal_error(id.clone(), e.to_string())
        }
        ProviderError::Internal(message) => JsonRpcError::internal_error(id.clone(), message),
    }
}

/// Decides whether a decode failure is answered.
///
/// Everything is answered except `InvalidParams` on a frame without an id,
/// which is a malformed notification.
#[must_use]
pub fn decode_error_reply(error: JsonRpcError) -> Option<OutgoingMessage> {
    if error.id.is_none() && error.code() == ErrorCode::InvalidParams.code() {
        tracing::debug!(message = %error.error.message, "Dropping malformed notification");
        return None;
    }
    tracing::debug!(code = error.code(), message = %error.error.message, "Rejecting frame");
    Some(error.into())
}

/// Routes decoded messages to the collaborators.
#[derive(Clone)]
pub struct Dispatcher {
    collaborators: Collaborators,
    session: Arc<Session>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given collaborators and session.
    #[must_use]
    pub fn new(collaborators: Collaborators, session: Arc<Session>) -> Self {
        Self {
            collaborators,
            session,
        }
    }

    /// Returns the session this dispatcher gates on.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Decodes one frame and dispatches it.
    pub async fn handle_frame(&self, frame: &[u8]) -> Vec<OutgoingMessage> {
        match parse_message(frame) {
            Ok(message) => self.dispatch(message).await,
            Err(error) => decode_error_reply(error).into_iter().collect(),
        }
    }

    /// Handles one decoded message.
    ///
    /// Returns the messages to write, in order: at most one response,
    /// optionally followed by server notifications. Notifications are run
    /// but never answered; client responses produce nothing.
    pub async fn dispatch(&self, message: IncomingMessage) -> Vec<OutgoingMessage> {
        match message {
            IncomingMessage::Request(req) => self.handle_request(req).await,
            IncomingMessage::Notification(notif) => self.handle_notification(notif).await,
            IncomingMessage::Response(resp) => {
                Self::handle_client_response(&resp);
                Vec::new()
            }
        }
    }

    /// Handles an incoming request.
    async fn handle_request(&self, req: JsonRpcRequest) -> Vec<OutgoingMessage> {
        let Some(method) = Method::from_name(&req.method) else {
            tracing::debug!(method = %req.method, id = %req.id, "Unknown method");
            return vec![JsonRpcError::method_not_found(req.id, &req.method).into()];
        };

        if method.requires_session() && self.session.state() == SessionState::Uninitialized {
            tracing::warn!(
                method = method.name(),
                id = %req.id,
                "Rejecting request before initialize"
            );
            return vec![JsonRpcError::not_initialized(req.id).into()];
        }

        tracing::debug!(method = method.name(), id = %req.id, "Handling request");

        match self.route(method, &req).await {
            Ok(reply) => {
                let mut out = vec![JsonRpcResponse::success(req.id, reply.result).into()];
                if reply.resources_changed {
                    out.push(OutgoingNotification::resources_list_changed().into());
                }
                out
            }
            Err(error) => vec![error.into()],
        }
    }

    async fn route(&self, method: Method, req: &JsonRpcRequest) -> Result<Reply, JsonRpcError> {
        match method {
            Method::Initialize => self.handle_initialize(req).map(Reply::from),
            Method::Initialized => Ok(json!({}).into()),
            Method::ToolsList => self.handle_tools_list(req).map(Reply::from),
            Method::ToolsCall => self.handle_tools_call(req).await,
            Method::ResourcesList => self.handle_resources_list(req).await.map(Reply::from),
            Method::ResourcesRead => self.handle_resources_read(req).await.map(Reply::from),
            Method::PromptsList => self.handle_prompts_list(req).map(Reply::from),
            Method::PromptsGet => self.handle_prompts_get(req).map(Reply::from),
            Method::Ping => Ok(Self::handle_ping().into()),
        }
    }

    /// Handles an incoming notification.
    ///
    /// Recognised methods run exactly as requests do, but the reply is
    /// discarded. Only a resource list change is announced.
    async fn handle_notification(&self, notif: JsonRpcNotification) -> Vec<OutgoingMessage> {
        let Some(method) = Method::from_name(&notif.method) else {
            tracing::debug!(method = %notif.method, "Ignoring unknown notification");
            return Vec::new();
        };

        if method == Method::Initialized {
            tracing::info!(
                ready = self.session.is_ready(),
                "Client initialization complete"
            );
            return Vec::new();
        }

        if method.requires_session() && self.session.state() == SessionState::Uninitialized {
            tracing::debug!(
                method = method.name(),
                "Dropping notification before initialize"
            );
            return Vec::new();
        }

        tracing::debug!(method = method.name(), "Handling notification");

        // Handlers are written against requests; this id never reaches the wire.
        let req = JsonRpcRequest {
            id: RequestId::from(NOTIFICATION_ID),
            method: notif.method,
            params: notif.params,
        };

        match self.route(method, &req).await {
            Ok(reply) if reply.resources_changed => {
                vec![OutgoingNotification::resources_list_changed().into()]
            }
            Ok(_) => Vec::new(),
            Err(error) => {
                tracing::debug!(
                    method = method.name(),
                    code = error.code(),
                    message = %error.error.message,
                    "Notification failed"
                );
                Vec::new()
            }
        }
    }

    fn handle_client_response(resp: &IncomingResponse) {
        tracing::debug!(
            id = ?resp.id.as_ref().map(ToString::to_string),
            is_error = resp.is_error,
            "Ignoring response from client"
        );
    }

    /// Handles the initialize request.
    ///
    /// Repeating it re-runs negotiation; the session stays ready.
    fn handle_initialize(&self, req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        let params = InitializeParams::from_params(req.params.as_ref());

        if let Some(client) = &params.client_info {
            tracing::info!(
                client = %client.name,
                version = client.version.as_deref().unwrap_or("unknown"),
                "Client connected"
            );
        }

        let result = to_result(&req.id, &negotiate(&params))?;

        if self.session.mark_ready() {
            tracing::info!("Session initialized");
        } else {
            tracing::debug!("Repeated initialize, session stays ready");
        }

        Ok(result)
    }

    /// Handles the tools/list request.
    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        let tools = self.collaborators.tools.definitions();
        Ok(json!({ "tools": to_result(&req.id, &tools)? }))
    }

    /// Handles the tools/call request.
    ///
    /// Collaborator failures become a result with `isError` set. Only
    /// malformed params and unknown tool names are JSON-RPC errors.
    async fn handle_tools_call(&self, req: &JsonRpcRequest) -> Result<Reply, JsonRpcError> {
        let params = req.params.as_ref();

        let name = string_param(params, "name").ok_or_else(|| {
            JsonRpcError::invalid_params(req.id.clone(), "Missing required parameter: name")
        })?;
        let arguments = arguments_param(params)
            .map_err(|message| JsonRpcError::invalid_params(req.id.clone(), message))?;

        let provider = self.collaborators.tools.resolve(name).ok_or_else(|| {
            JsonRpcError::invalid_params(req.id.clone(), format!("Unknown tool: {name}"))
        })?;

        tracing::info!(tool = name, id = %req.id, "Executing tool");

        let result = match provider.call(name, arguments).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(tool = name, error = %e, "Tool failed");
                ToolCallResult::error(format!("Error: {e}"))
            }
        };

        Ok(Reply {
            resources_changed: !result.is_error && provider.changes_resources(name),
            result: to_result(&req.id, &result)?,
        })
    }

    /// Handles the resources/list request.
    async fn handle_resources_list(&self, req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        let resources = self
            .collaborators
            .resources
            .list()
            .await
            .map_err(|e| provider_error(&req.id, e, ErrorCode::ResourceNotFound))?;

        Ok(json!({ "resources": to_result(&req.id, &resources)? }))
    }

    /// Handles the resources/read request.
    async fn handle_resources_read(&self, req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        let uri = string_param(req.params.as_ref(), "uri").ok_or_else(|| {
            JsonRpcError::invalid_params(req.id.clone(), "Missing required parameter: uri")
        })?;

        tracing::debug!(uri, id = %req.id, "Reading resource");

        let content = self
            .collaborators
            .resources
            .read(uri)
            .await
            .map_err(|e| provider_error(&req.id, e, ErrorCode::ResourceNotFound))?;

        Ok(json!({ "contents": [to_result(&req.id, &content)?] }))
    }

    /// Handles the prompts/list request.
    fn handle_prompts_list(&self, req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        let prompts = self.collaborators.prompts.prompts();
        Ok(json!({ "prompts": to_result(&req.id, &prompts)? }))
    }

    /// Handles the prompts/get request.
    fn handle_prompts_get(&self, req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        let params = req.params.as_ref();

        let name = string_param(params, "name").ok_or_else(|| {
            JsonRpcError::invalid_params(req.id.clone(), "Missing required parameter: name")
        })?;
        let arguments = arguments_param(params)
            .map_err(|message| JsonRpcError::invalid_params(req.id.clone(), message))?;

        let messages = self
            .collaborators
            .prompts
            .get(name, arguments)
            .map_err(|e| provider_error(&req.id, e, ErrorCode::PromptNotFound))?;

        Ok(json!({ "messages": to_result(&req.id, &messages)? }))
    }

    /// Handles the ping request.
    fn handle_ping() -> Value {
        json!({})
    }
}

/// The MCP server read loop.
pub struct McpServer<R, W> {
    dispatcher: Dispatcher,
    transport: Transport<R, W>,
    max_concurrent: usize,
    in_flight: JoinSet<io::Result<()>>,
    pending: HashMap<task::Id, RequestId>,
}

impl<R, W> McpServer<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Creates a server.
    ///
    /// `max_concurrent` is the number of messages handled at once; it is
    /// clamped to `1..=MAX_CONCURRENT_LIMIT`. With `1`, every message is
    /// answered before the next frame is read.
    #[must_use]
    pub fn new(dispatcher: Dispatcher, transport: Transport<R, W>, max_concurrent: usize) -> Self {
        Self {
            dispatcher,
            transport,
            max_concurrent: max_concurrent.clamp(1, MAX_CONCURRENT_LIMIT),
            in_flight: JoinSet::new(),
            pending: HashMap::new(),
        }
    }

    /// Runs the read loop until end of input or until `shutdown` fires.
    ///
    /// At end of input, messages already being handled are finished and
    /// their replies written. On cancellation they are aborted and nothing
    /// more is written.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing the transport fails.
    pub async fn run(&mut self, shutdown: CancellationToken) -> io::Result<()> {
        tracing::info!(max_concurrent = self.max_concurrent, "MCP server running");

        loop {
            if self.in_flight.len() >= self.max_concurrent {
                tokio::select! {
                    biased;

                    () = shutdown.cancelled() => {
                        self.abort_in_flight();
                        return Ok(());
                    }

                    Some(joined) = self.in_flight.join_next_with_id() => {
                        self.handle_task_result(joined).await?;
                    }
                }
                continue;
            }

            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    self.abort_in_flight();
                    return Ok(());
                }

                Some(joined) = self.in_flight.join_next_with_id(), if !self.in_flight.is_empty() => {
                    self.handle_task_result(joined).await?;
                }

                frame = self.transport.reader.read_frame() => {
                    let Some(frame) = frame? else {
                        tracing::info!("End of input, shutting down");
                        return self.drain(&shutdown).await;
                    };
                    self.accept(&frame).await?;
                }
            }
        }
    }

    /// Decodes a frame and starts handling it.
    async fn accept(&mut self, frame: &[u8]) -> io::Result<()> {
        let message = match parse_message(frame) {
            Ok(message) => message,
            Err(error) => {
                if let Some(reply) = decode_error_reply(error) {
                    self.transport.writer.send(&reply).await?;
                }
                return Ok(());
            }
        };

        let request_id = match &message {
            IncomingMessage::Request(req) => Some(req.id.clone()),
            _ => None,
        };

        tracing::trace!(method = ?message.method(), "Dispatching message");

        let dispatcher = self.dispatcher.clone();
        let writer = self.transport.writer.clone();
        let handle = self.in_flight.spawn(async move {
            for reply in dispatcher.dispatch(message).await {
                if let Err(e) = writer.send(&reply).await {
                    tracing::error!(
                        id = ?reply.id().map(ToString::to_string),
                        error = %e,
                        "Failed to write reply"
                    );
                    return Err(e);
                }
            }
            Ok(())
        });

        if let Some(id) = request_id {
            self.pending.insert(handle.id(), id);
        }
        Ok(())
    }

    /// Finishes every in-flight message, unless cancelled meanwhile.
    async fn drain(&mut self, shutdown: &CancellationToken) -> io::Result<()> {
        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    self.abort_in_flight();
                    return Ok(());
                }

                joined = self.in_flight.join_next_with_id() => {
                    let Some(joined) = joined else {
                        return Ok(());
                    };
                    self.handle_task_result(joined).await?;
                }
            }
        }
    }

    async fn handle_task_result(
        &mut self,
        joined: Result<(task::Id, io::Result<()>), JoinError>,
    ) -> io::Result<()> {
        match joined {
            Ok((task_id, outcome)) => {
                self.pending.remove(&task_id);
                outcome
            }
            Err(error) => {
                let request_id = self.pending.remove(&error.id());
                if !error.is_panic() {
                    return Ok(());
                }

                tracing::error!(
                    id = ?request_id.as_ref().map(ToString::to_string),
                    "Handler panicked"
                );
                match request_id {
                    Some(id) => {
                        let reply: OutgoingMessage =
                            JsonRpcError::internal_error(id, "Internal error: handler panicked")
                                .into();
                        self.transport.writer.send(&reply).await
                    }
                    None => Ok(()),
                }
            }
        }
    }

    fn abort_in_flight(&mut self) {
        if !self.in_flight.is_empty() {
            tracing::info!(
                in_flight = self.in_flight.len(),
                "Shutdown requested, aborting in-flight requests"
            );
        }
        self.in_flight.abort_all();
        self.pending.clear();
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be installed.
#[cfg(unix)]
pub async fn shutdown_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }

        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C).
///
/// # Errors
///
/// Returns an error if the signal handler cannot be installed.
#[cfg(windows)]
pub async fn shutdown_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
    Ok(())
}
