//! Integration tests for MCP protocol handling.
//!
//! These tests drive a real server over in-memory pipes, covering the
//! request/response cycle, error responses and lifecycle management.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use vat_mcp::build_collaborators;
use vat_mcp::mcp::registry::{
    Collaborators, ProviderError, ToolCallResult, ToolDefinition, ToolProvider, ToolRouter,
};
use vat_mcp::mcp::{Dispatcher, McpServer, Session, Transport};
use vat_mcp::prompts::VatPrompts;
use vat_mcp::resources::VatResources;
use vat_mcp::vat::{MemoryVatApi, VatDraft, VatSubmission};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Harness
// =============================================================================

struct Client {
    input: Option<DuplexStream>,
    output: Lines<BufReader<DuplexStream>>,
    shutdown: CancellationToken,
    server: JoinHandle<io::Result<()>>,
}

impl Client {
    fn start(collaborators: Collaborators, max_concurrent: usize) -> Self {
        let (client_tx, server_rx) = tokio::io::duplex(1 << 16);
        let (server_tx, client_rx) = tokio::io::duplex(1 << 16);

        let dispatcher = Dispatcher::new(collaborators, Arc::new(Session::new()));
        let transport = Transport::new(BufReader::new(server_rx), server_tx);
        let mut server = McpServer::new(dispatcher, transport, max_concurrent);

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let server = tokio::spawn(async move { server.run(token).await });

        Self {
            input: Some(client_tx),
            output: BufReader::new(client_rx).lines(),
            shutdown,
            server,
        }
    }

    fn with_memory(api: MemoryVatApi) -> Self {
        Self::start(build_collaborators(Arc::new(api)).unwrap(), 1)
    }

    async fn send_raw(&mut self, text: &str) {
        let input = self.input.as_mut().expect("input closed");
        input.write_all(text.as_bytes()).await.unwrap();
        input.flush().await.unwrap();
    }

    async fn send(&mut self, message: Value) {
        self.send_raw(&format!("{message}\n")).await;
    }

    async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(RECV_TIMEOUT, self.output.next_line())
            .await
            .expect("timed out waiting for server output")
            .unwrap()
            .expect("server closed its output");
        serde_json::from_str(&line).unwrap()
    }

    async fn recv_eof(&mut self) {
        let line = tokio::time::timeout(RECV_TIMEOUT, self.output.next_line())
            .await
            .expect("timed out waiting for end of output")
            .unwrap();
        assert_eq!(line, None, "unexpected output");
    }

    async fn request(&mut self, id: Value, method: &str, params: Value) -> Value {
        self.send(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await;
        self.recv().await
    }

    async fn initialize(&mut self) {
        let response = self
            .request(
                json!(0),
                "initialize",
                json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "integration-test", "version": "1.0.0"}
                }),
            )
            .await;
        assert!(response.get("result").is_some(), "{response}");
        self.send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
    }

    async fn call_tool(&mut self, id: i64, name: &str, arguments: Value) -> Value {
        self.request(
            json!(id),
            "tools/call",
            json!({"name": name, "arguments": arguments}),
        )
        .await
    }

    fn close_input(&mut self) {
        self.input = None;
    }

    async fn finish(self) -> io::Result<()> {
        tokio::time::timeout(RECV_TIMEOUT, self.server)
            .await
            .expect("server did not stop")
            .expect("server task failed")
    }
}

fn tool_text(response: &Value) -> &str {
    response["result"]["content"][0]["text"].as_str().unwrap()
}

// =============================================================================
// Handshake and Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_initialize_list_and_read_missing_draft() {
    let mut client = Client::with_memory(MemoryVatApi::new());

    let response = client
        .request(json!(1), "initialize", json!({"protocolVersion": "2024-11-05"}))
        .await;
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["capabilities"]["tools"]["listChanged"], false);
    assert_eq!(response["result"]["capabilities"]["resources"]["listChanged"], true);
    assert_eq!(response["result"]["serverInfo"]["name"], "vat-mcp");

    let response = client.request(json!(2), "tools/list", json!({})).await;
    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 12);
    assert!(tools.iter().any(|t| t["name"] == "get_vat_drafts"));
    assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));

    let response = client
        .request(
            json!(3),
            "resources/read",
            json!({"uri": "vat://drafts/999/9999-99"}),
        )
        .await;
    assert_eq!(response["id"], 3);
    assert_eq!(response["error"]["code"], -32002);
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn test_gated_methods_before_initialize() {
    let mut client = Client::with_memory(MemoryVatApi::new());

    for (id, method) in [
        "tools/list",
        "tools/call",
        "resources/list",
        "resources/read",
        "prompts/list",
        "prompts/get",
    ]
    .into_iter()
    .enumerate()
    {
        let response = client.request(json!(id), method, json!({})).await;
        assert_eq!(response["id"], id, "{method}");
        assert_eq!(response["error"]["code"], -32000, "{method}");
        assert_eq!(response["error"]["message"], "Server not initialized");
    }

    let response = client.request(json!("p"), "ping", json!({})).await;
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn test_repeated_initialize_stays_ready() {
    let mut client = Client::with_memory(MemoryVatApi::new());
    client.initialize().await;

    let response = client.request(json!(5), "initialize", json!({})).await;
    assert_eq!(response["result"]["protocolVersion"], "2024-11-05");

    let response = client.request(json!(6), "prompts/list", json!({})).await;
    assert_eq!(response["result"]["prompts"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_id_types_are_echoed() {
    let mut client = Client::with_memory(MemoryVatApi::new());

    let response = client.request(json!(42), "ping", json!({})).await;
    assert_eq!(response["id"], json!(42));

    let response = client.request(json!("abc-1"), "ping", json!({})).await;
    assert_eq!(response["id"], json!("abc-1"));
}

#[tokio::test]
async fn test_notifications_get_no_response() {
    let mut client = Client::with_memory(MemoryVatApi::new());

    client
        .send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await;
    client
        .send(json!({"jsonrpc": "2.0", "method": "notifications/cancelled", "params": {}}))
        .await;
    client.send(json!({"jsonrpc": "2.0", "method": "ping"})).await;

    let response = client.request(json!(1), "ping", json!({})).await;
    assert_eq!(response["id"], 1, "a notification was answered: {response}");
}

#[tokio::test]
async fn test_notification_runs_tool_after_initialize() {
    let mut client = Client::with_memory(MemoryVatApi::new());
    client.initialize().await;

    client
        .send(json!({
            "jsonrpc": "2.0",
            "method": "tools/call",
            "params": {
                "name": "create_vat_draft",
                "arguments": {"redovisare": "1", "period": "2024-01"}
            }
        }))
        .await;
    let notification = client.recv().await;
    assert_eq!(notification["method"], "notifications/resources/list_changed");
    assert!(notification.get("id").is_none());

    let response = client
        .call_tool(2, "get_vat_draft", json!({"redovisare": "1", "period": "2024-01"}))
        .await;
    assert_eq!(response["id"], 2);
    assert!(tool_text(&response).starts_with("VAT draft for 1/2024-01:"));
}

#[tokio::test]
async fn test_initialized_request_is_gated() {
    let mut client = Client::with_memory(MemoryVatApi::new());

    let response = client.request(json!(5), "initialized", json!({})).await;
    assert_eq!(response["id"], 5);
    assert_eq!(response["error"]["code"], -32000);

    client.initialize().await;
    let response = client.request(json!(6), "initialized", json!({})).await;
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn test_unrepresentable_numeric_ids_are_answered() {
    let mut client = Client::with_memory(MemoryVatApi::new());

    for id in [json!(1.5), json!(u64::MAX)] {
        client
            .send(json!({"jsonrpc": "2.0", "id": id, "method": "ping"}))
            .await;
        let response = client.recv().await;
        assert_eq!(response["error"]["code"], -32600, "{id}");
        assert!(response.get("id").is_none());
    }
}

#[tokio::test]
async fn test_unknown_method() {
    let mut client = Client::with_memory(MemoryVatApi::new());
    client.initialize().await;

    let response = client.request(json!(7), "resources/subscribe", json!({})).await;
    assert_eq!(response["error"]["code"], -32601);
    assert_eq!(response["error"]["message"], "Unknown method: resources/subscribe");
}

#[tokio::test]
async fn test_malformed_frames() {
    let mut client = Client::with_memory(MemoryVatApi::new());

    client.send_raw("{\"jsonrpc\": \"2.0\", \"id\": 1,\n").await;
    let response = client.recv().await;
    assert_eq!(response["error"]["code"], -32700);
    assert!(response.get("id").is_none());

    client.send_raw("\n   \n").await;
    client.send(json!({"jsonrpc": "1.0", "id": 2, "method": "ping"})).await;
    let response = client.recv().await;
    assert_eq!(response["id"], 2);
    assert_eq!(response["error"]["code"], -32600);

    client.send(json!({"jsonrpc": "2.0", "id": 3, "method": "ping", "params": [1]})).await;
    let response = client.recv().await;
    assert_eq!(response["error"]["code"], -32602);
}

// =============================================================================
// Tool, Resource and Prompt Tests
// =============================================================================

#[tokio::test]
async fn test_tool_failures_are_results_not_errors() {
    let mut client = Client::with_memory(MemoryVatApi::new());
    client.initialize().await;

    let response = client
        .call_tool(10, "lock_vat_draft", json!({"redovisare": "1", "period": "2024-01"}))
        .await;
    assert_eq!(response["id"], 10);
    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(tool_text(&response), "Error: VAT draft 1/2024-01 not found");

    let response = client
        .call_tool(11, "get_vat_draft", json!({"redovisare": "1"}))
        .await;
    assert_eq!(response["result"]["isError"], true);
    assert!(tool_text(&response).starts_with("Error: Invalid arguments:"));

    let response = client.call_tool(12, "file_taxes", json!({})).await;
    assert_eq!(response["error"]["code"], -32602);
    assert_eq!(response["error"]["message"], "Unknown tool: file_taxes");
}

#[tokio::test]
async fn test_draft_lifecycle_announces_resource_changes() {
    let mut client = Client::with_memory(MemoryVatApi::new());
    client.initialize().await;
    let key = json!({"redovisare": "5566778899", "period": "2024-01"});

    let response = client
        .call_tool(
            1,
            "create_vat_draft",
            json!({
                "redovisare": "5566778899",
                "period": "2024-01",
                "momsinkomst": 100000,
                "utgaendeMoms": 25000,
                "ingaendeMoms": 5000
            }),
        )
        .await;
    assert_eq!(response["result"]["isError"], false);
    assert!(tool_text(&response).starts_with("Successfully created/updated VAT draft:"));

    let notification = client.recv().await;
    assert_eq!(notification["method"], "notifications/resources/list_changed");
    assert!(notification.get("id").is_none());

    let response = client.request(json!(2), "resources/list", json!({})).await;
    let uris: Vec<&str> = response["result"]["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["uri"].as_str().unwrap())
        .collect();
    assert_eq!(uris, ["vat://status", "vat://drafts/5566778899/2024-01"]);

    let response = client
        .request(
            json!(3),
            "resources/read",
            json!({"uri": "vat://drafts/5566778899/2024-01"}),
        )
        .await;
    let content = &response["result"]["contents"][0];
    assert_eq!(content["mimeType"], "application/json");
    let draft: Value = serde_json::from_str(content["text"].as_str().unwrap()).unwrap();
    assert_eq!(draft["attBetala"], 20000.0);

    let response = client.call_tool(4, "lock_vat_draft", key.clone()).await;
    assert_eq!(response["result"]["isError"], false);

    let response = client.call_tool(5, "delete_vat_draft", key.clone()).await;
    assert_eq!(response["result"]["isError"], true);
    assert!(tool_text(&response).contains("locked"));

    client.call_tool(6, "unlock_vat_draft", key.clone()).await;
    let response = client.call_tool(7, "delete_vat_draft", key).await;
    assert_eq!(
        tool_text(&response),
        "Successfully deleted VAT draft for 5566778899/2024-01"
    );
    let notification = client.recv().await;
    assert_eq!(notification["method"], "notifications/resources/list_changed");

    let response = client.request(json!(8), "ping", json!({})).await;
    assert_eq!(response["id"], 8);
}

#[tokio::test]
async fn test_submission_resource_and_tools() {
    let api = MemoryVatApi::new()
        .with_draft(VatDraft {
            redovisare: "1".to_string(),
            period: "2023-12".to_string(),
            ..VatDraft::default()
        })
        .with_submission(VatSubmission {
            redovisare: "1".to_string(),
            period: "2023-12".to_string(),
            status: "received".to_string(),
            ..VatSubmission::default()
        });
    let mut client = Client::with_memory(api);
    client.initialize().await;

    let response = client.call_tool(1, "get_vat_submissions", json!({})).await;
    assert!(tool_text(&response).starts_with("Retrieved 1 VAT submissions:"));

    let response = client
        .request(
            json!(2),
            "resources/read",
            json!({"uri": "vat://submissions/1/2023-12"}),
        )
        .await;
    assert!(response["result"]["contents"][0]["text"]
        .as_str()
        .unwrap()
        .contains("received"));

    let response = client
        .request(json!(3), "resources/read", json!({"uri": "vat://submissions/1"}))
        .await;
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn test_downstream_outage() {
    let api = Arc::new(MemoryVatApi::new());
    let collaborators = build_collaborators(api.clone()).unwrap();
    let mut client = Client::start(collaborators, 1);
    client.initialize().await;
    api.set_available(false);

    let response = client.call_tool(1, "health_check", json!({})).await;
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(tool_text(&response), "Error: VAT API unavailable");

    let response = client
        .request(json!(2), "resources/read", json!({"uri": "vat://status"}))
        .await;
    assert_eq!(response["error"]["code"], -32603);
    assert_eq!(response["error"]["message"], "VAT API unavailable");

    let response = client.request(json!(3), "resources/list", json!({})).await;
    assert_eq!(response["result"]["resources"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_prompts_get() {
    let mut client = Client::with_memory(MemoryVatApi::new());
    client.initialize().await;

    let response = client
        .request(
            json!(1),
            "prompts/get",
            json!({"name": "check_status", "arguments": {}}),
        )
        .await;
    let message = &response["result"]["messages"][0];
    assert_eq!(message["role"], "user");
    assert_eq!(message["content"]["type"], "text");
    assert!(message["content"]["text"]
        .as_str()
        .unwrap()
        .contains("all reporters"));

    let response = client
        .request(json!(2), "prompts/get", json!({"name": "review_draft"}))
        .await;
    assert_eq!(response["error"]["code"], -32602);

    let response = client
        .request(json!(3), "prompts/get", json!({"name": "nope"}))
        .await;
    assert_eq!(response["error"]["code"], -32003);
}

// =============================================================================
// Concurrency and Shutdown Tests
// =============================================================================

#[tokio::test]
async fn test_concurrent_responses_are_whole_lines() {
    let collaborators = build_collaborators(Arc::new(MemoryVatApi::new())).unwrap();
    let mut client = Client::start(collaborators, 16);
    client.initialize().await;

    let count = 50_i64;
    let mut batch = String::new();
    for id in 0..count {
        let method = if id % 2 == 0 { "tools/list" } else { "ping" };
        batch.push_str(&json!({"jsonrpc": "2.0", "id": id, "method": method}).to_string());
        batch.push('\n');
    }
    client.send_raw(&batch).await;

    let mut seen = Vec::new();
    for _ in 0..count {
        let response = client.recv().await;
        assert!(response.get("result").is_some(), "{response}");
        seen.push(response["id"].as_i64().unwrap());
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..count).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_end_of_input_flushes_pending_and_drops_unterminated_tail() {
    let collaborators = build_collaborators(Arc::new(MemoryVatApi::new())).unwrap();
    let mut client = Client::start(collaborators, 4);

    for id in 0..4 {
        client
            .send(json!({"jsonrpc": "2.0", "id": id, "method": "ping"}))
            .await;
    }
    client.send_raw("{\"jsonrpc\":\"2.0\",\"id\":99,\"method\":\"ping\"}").await;
    client.close_input();

    let mut seen = Vec::new();
    for _ in 0..4 {
        let response = client.recv().await;
        assert_eq!(response["result"], json!({}));
        seen.push(response["id"].as_i64().unwrap());
    }
    seen.sort_unstable();
    assert_eq!(seen, [0, 1, 2, 3]);
    client.recv_eof().await;
    client.finish().await.unwrap();
}

#[tokio::test]
async fn test_cancellation_stops_the_loop() {
    let mut client = Client::with_memory(MemoryVatApi::new());
    client.initialize().await;

    client.shutdown.cancel();
    client.recv_eof().await;
    client.finish().await.unwrap();
}

struct Panicking;

#[async_trait]
impl ToolProvider for Panicking {
    fn tools(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "explode".to_string(),
            description: "Panics".to_string(),
            input_schema: json!({"type": "object"}),
        }]
    }

    async fn call(
        &self,
        _name: &str,
        _arguments: Map<String, Value>,
    ) -> Result<ToolCallResult, ProviderError> {
        panic!("tool exploded")
    }
}

#[tokio::test]
async fn test_panicking_handler_becomes_internal_error() {
    let api = Arc::new(MemoryVatApi::new());
    let collaborators = Collaborators {
        tools: Arc::new(ToolRouter::from_providers([
            Arc::new(Panicking) as Arc<dyn ToolProvider>
        ])
        .unwrap()),
        resources: Arc::new(VatResources::new(api)),
        prompts: Arc::new(VatPrompts::new()),
    };
    let mut client = Client::start(collaborators, 1);
    client.initialize().await;

    let response = client.call_tool(13, "explode", json!({})).await;
    assert_eq!(response["id"], 13);
    assert_eq!(response["error"]["code"], -32603);

    let response = client.request(json!(14), "ping", json!({})).await;
    assert_eq!(response["id"], 14);
}
