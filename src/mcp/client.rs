use super::protocol::{
    ClientInfo, IncomingMessage, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcReply, JsonRpcRequest, ToolCallResult, ToolDescriptor,
    ToolsListResult, JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum McpError {
    #[error("failed to launch {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("tool channel I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid message on tool channel: {0}")]
    Json(#[from] serde_json::Error),
    #[error("tool server closed the channel")]
    Closed,
    #[error("tool server error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("tool call task failed: {0}")]
    Task(String),
}

/// How to launch a tool server.
#[derive(Debug, Clone, PartialEq)]
pub struct McpServerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl McpServerConfig {
    /// `npx firecrawl-mcp`, forwarding the Firecrawl key when it is set.
    pub fn firecrawl_from_env() -> Self {
        let env = std::env::var("FIRECRAWL_API_KEY")
            .map(|key| vec![("FIRECRAWL_API_KEY".to_string(), key)])
            .unwrap_or_default();
        Self {
            command: "npx".to_string(),
            args: vec!["-y".to_string(), "firecrawl-mcp".to_string()],
            env,
        }
    }
}

struct Channel {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    reader: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
}

impl Channel {
    async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), McpError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<IncomingMessage, McpError> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                return Err(McpError::Closed);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str(trimmed) {
                Ok(message) => return Ok(message),
                Err(e) => warn!("Ignoring non JSON-RPC line from tool server ({}): {}", e, trimmed),
            }
        }
    }
}

/// Client side of a newline-delimited JSON-RPC tool server.
///
/// Requests are serialized: one request is in flight at a time.
pub struct McpClient {
    channel: Mutex<Channel>,
    next_id: AtomicI64,
    child: Mutex<Option<Child>>,
}

impl McpClient {
    /// Launches the server process and performs the initialize handshake.
    pub async fn spawn(config: &McpServerConfig) -> Result<Self, McpError> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| McpError::Spawn {
                command: config.command.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(McpError::Closed)?;
        let stdout = child.stdout.take().ok_or(McpError::Closed)?;

        let client = Self::from_io(stdout, stdin);
        *client.child.lock().await = Some(child);
        client.initialize().await?;
        Ok(client)
    }

    /// Wraps an already-connected stream pair. Call [`McpClient::initialize`] next.
    pub fn from_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        Self {
            channel: Mutex::new(Channel {
                writer: Box::new(writer),
                reader: BufReader::new(reader),
            }),
            next_id: AtomicI64::new(1),
            child: Mutex::new(None),
        }
    }

    pub async fn initialize(&self) -> Result<InitializeResult, McpError> {
        let params = InitializeParams {
            protocol_version: MCP_PROTOCOL_VERSION,
            capabilities: json!({}),
            client_info: ClientInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        let result = self
            .request("initialize", Some(serde_json::to_value(params)?))
            .await?;
        let result: InitializeResult = serde_json::from_value(result)?;

        self.channel
            .lock()
            .await
            .send(&JsonRpcNotification::new("notifications/initialized"))
            .await?;

        info!(
            "Connected to tool server {} (protocol {})",
            result.server_info.as_ref().map(|s| s.name.as_str()).unwrap_or("unknown"),
            result.protocol_version
        );
        Ok(result)
    }

    /// Every tool the server advertises, following pagination.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ToolsListResult = serde_json::from_value(self.request("tools/list", params).await?)?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        debug!("Tool server offers {} tools", tools.len());
        Ok(tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.request("tools/call", Some(params)).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Terminates the server process, if this client launched one.
    pub async fn shutdown(&self) {
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop tool server: {}", e);
            }
        }
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut channel = self.channel.lock().await;
        channel.send(&JsonRpcRequest::new(id, method, params)).await?;

        loop {
            let message = channel.receive().await?;
            if message.is_response_to(id) {
                if let Some(error) = message.error {
                    return Err(McpError::Rpc {
                        code: error.code,
                        message: error.message,
                    });
                }
                return Ok(message.result.unwrap_or(Value::Null));
            }
            if let Some(error) = message.unattributed_error() {
                warn!("Tool server rejected request {} without echoing its id", id);
                return Err(McpError::Rpc {
                    code: error.code,
                    message: error.message.clone(),
                });
            }

            match (message.method, message.id) {
                (Some(method), Some(request_id)) => {
                    let reply = answer_server_request(&method, request_id);
                    channel.send(&reply).await?;
                }
                (Some(method), None) => debug!("Tool server notification: {}", method),
                _ => warn!("Dropping unexpected message while waiting for response {}", id),
            }
        }
    }
}

fn answer_server_request(method: &str, id: Value) -> JsonRpcReply {
    if method == "ping" {
        JsonRpcReply {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(json!({})),
            error: None,
        }
    } else {
        JsonRpcReply {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcError {
                code: -32601,
                message: format!("Method not found: {}", method),
                data: None,
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{duplex, split, DuplexStream};

    /// Minimal tool server: two pages of tools, one echoing tool, and a
    /// notification plus a ping before every tool result.
    pub(crate) async fn fake_server(io: DuplexStream, seen: Arc<Mutex<Vec<Value>>>) {
        let (read, mut write) = split(io);
        let mut lines = BufReader::new(read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let message: Value = serde_json::from_str(&line).unwrap();
            seen.lock().await.push(message.clone());

            let (Some(id), Some(method)) = (message.get("id").cloned(), message["method"].as_str()) else {
                continue;
            };

            let reply = match method {
                "initialize" => json!({"jsonrpc": "2.0", "id": id, "result": {
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "fake-firecrawl", "version": "0.0.1"}
                }}),
                "tools/list" if message["params"]["cursor"].is_null() => json!({"jsonrpc": "2.0", "id": id, "result": {
                    "tools": [{"name": "firecrawl_scrape", "description": "Scrape a page",
                               "inputSchema": {"type": "object", "properties": {"url": {"type": "string"}}}}],
                    "nextCursor": "page-2"
                }}),
                "tools/list" => json!({"jsonrpc": "2.0", "id": id, "result": {
                    "tools": [{"name": "firecrawl_search"}]
                }}),
                "tools/call" => {
                    let note = json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {}});
                    let ping = json!({"jsonrpc": "2.0", "id": "srv-1", "method": "ping"});
                    for extra in [note, ping] {
                        write.write_all(format!("{}\n", extra).as_bytes()).await.unwrap();
                    }
                    let url = message["params"]["arguments"]["url"].as_str().unwrap_or("").to_string();
                    json!({"jsonrpc": "2.0", "id": id, "result": {
                        "content": [{"type": "text", "text": format!("scraped {url}")}],
                        "isError": url.is_empty()
                    }})
                }
                _ => json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "nope"}}),
            };
            write.write_all(format!("{}\n", reply).as_bytes()).await.unwrap();
        }
    }

    pub(crate) async fn connected() -> (McpClient, Arc<Mutex<Vec<Value>>>) {
        let (client_io, server_io) = duplex(64 * 1024);
        let seen = Arc::new(Mutex::new(Vec::new()));
        tokio::spawn(fake_server(server_io, seen.clone()));
        let (read, write) = split(client_io);
        (McpClient::from_io(read, write), seen)
    }
}
