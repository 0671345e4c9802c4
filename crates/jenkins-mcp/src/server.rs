//! MCP server: JSON-RPC dispatch plus the stdio and HTTP transports

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::SemaphorePermit;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::{
    jsonrpc::{
        error_response, success_response, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
        JSONRPC_VERSION,
    },
    mcp::{
        ContentBlock, Implementation, InitializeRequest, InitializeResponse, PaginatedRequest,
        ResourceTemplatesListResponse, ResourcesCapability, ResourcesListResponse,
        ResourcesReadRequest, ResourcesReadResponse, ServerCapabilities, ToolsCallRequest,
        ToolsCallResponse, ToolsCapability, ToolsListResponse, LATEST_PROTOCOL_VERSION,
        METHOD_INITIALIZE, METHOD_PING, METHOD_RESOURCES_LIST, METHOD_RESOURCES_READ,
        METHOD_RESOURCES_TEMPLATES_LIST, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
        SUPPORTED_PROTOCOL_VERSIONS,
    },
    tools::{ToolCall, ToolKind, ToolOutput},
    GovernanceConfig, McpError, McpResult,
};
use jenkins_connector::JenkinsClient;
use jenkins_resources::ResourceRouter;

/// MCP Server
pub struct McpServer {
    client: JenkinsClient,
    resources: ResourceRouter,
    governance: GovernanceConfig,
}

impl McpServer {
    pub fn new(client: JenkinsClient, governance: GovernanceConfig) -> Self {
        Self {
            resources: ResourceRouter::new(client.clone()),
            client,
            governance,
        }
    }

    /// Process a single MCP message. Returns `None` for notifications.
    pub async fn process_message(&self, body: &[u8]) -> Option<JsonRpcResponse> {
        if body.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'[') {
            error!("Batch requests are not supported");
            return Some(error_response(
                None,
                JsonRpcError::invalid_request()
                    .with_data(json!({"message": "Batch requests are not supported"})),
            ));
        }

        let request: JsonRpcRequest = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                error!("Failed to parse JSON-RPC request: {}", e);
                let err = if serde_json::from_slice::<Value>(body).is_ok() {
                    JsonRpcError::invalid_request()
                } else {
                    JsonRpcError::parse_error()
                };
                return Some(error_response(
                    None,
                    err.with_data(json!({"message": e.to_string()})),
                ));
            }
        };

        debug!("Processing method: {}", request.method);

        // Check JSON-RPC version
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(error_response(
                request.id,
                JsonRpcError::invalid_request()
                    .with_data(json!({"message": "Invalid JSON-RPC version"})),
            ));
        }

        // Notifications get no response
        if request.id.is_none() {
            debug!("Received notification '{}', ignoring", request.method);
            return None;
        }

        let result = match request.method.as_str() {
            METHOD_INITIALIZE => self.handle_initialize(&request),
            METHOD_PING => Ok(json!({})),
            METHOD_TOOLS_LIST => self.handle_tools_list(&request),
            METHOD_TOOLS_CALL => self.handle_tools_call(&request).await,
            METHOD_RESOURCES_LIST => self.handle_resources_list(&request),
            METHOD_RESOURCES_TEMPLATES_LIST => self.handle_resource_templates_list(&request),
            METHOD_RESOURCES_READ => self.handle_resources_read(&request).await,
            _ => {
                return Some(error_response(
                    request.id,
                    JsonRpcError::method_not_found()
                        .with_data(json!({"method": request.method.clone()})),
                ))
            }
        };

        Some(match result {
            Ok(value) => success_response(request.id, value),
            Err(e) => {
                warn!(method = %request.method, "Request failed: {}", e);
                error_response(request.id, e.to_jsonrpc_error())
            }
        })
    }

    fn handle_initialize(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        let init_request: InitializeRequest = required_params(request)?;
        if let Some(client) = &init_request.client_info {
            info!(client = %client.name, version = %client.version, "Client connected");
        }

        // Choose protocol version
        let protocol_version =
            if SUPPORTED_PROTOCOL_VERSIONS.contains(&init_request.protocol_version.as_str()) {
                init_request.protocol_version
            } else {
                LATEST_PROTOCOL_VERSION.to_string()
            };

        let response = InitializeResponse {
            protocol_version,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
                resources: Some(ResourcesCapability::default()),
            },
            server_info: Implementation {
                name: "jenkins-mcp".to_string(),
                title: Some("Jenkins MCP".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Inspect and operate a Jenkins controller. Folder jobs are named 'folder/job'; \
                 resources use the jenkins:// scheme."
                    .to_string(),
            ),
        };
        Ok(serde_json::to_value(response)?)
    }

    fn handle_tools_list(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        let _params: PaginatedRequest = optional_params(request)?;
        let tools = ToolKind::ALL
            .iter()
            .filter(|kind| {
                let visible = self.governance.permits(kind.name(), kind.is_mutating());
                if !visible {
                    debug!("Tool '{}' filtered by governance policy", kind.name());
                }
                visible
            })
            .map(|kind| kind.to_tool())
            .collect();

        let response = ToolsListResponse {
            tools,
            next_cursor: None,
        };
        Ok(serde_json::to_value(response)?)
    }

    async fn handle_tools_call(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        let call_request: ToolsCallRequest = required_params(request)?;
        debug!("Calling tool: {}", call_request.name);

        let kind = ToolKind::from_name(&call_request.name)
            .ok_or_else(|| McpError::ToolNotFound(call_request.name.clone()))?;

        if !self.governance.permits(kind.name(), kind.is_mutating()) {
            warn!("Tool '{}' denied by governance policy", kind.name());
            return Err(McpError::PermissionDenied(format!(
                "Tool '{}' is not allowed",
                kind.name()
            )));
        }

        let call = ToolCall::parse(kind, call_request.arguments)?;

        let deadline = self.governance.deadline();
        let _permit = self.acquire_permit(deadline).await?;
        let client = self.client.with_deadline(deadline);
        let started = Instant::now();
        let output = match timeout_at(deadline, call.run(&client)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Tool '{}' timed out after {:?}",
                    kind.name(),
                    self.governance.timeout
                );
                return Err(McpError::Timeout(self.governance.timeout));
            }
        };
        info!(
            tool = kind.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Tool call completed"
        );

        Ok(serde_json::to_value(call_result(output)?)?)
    }

    fn handle_resources_list(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        let _params: PaginatedRequest = optional_params(request)?;
        Ok(serde_json::to_value(ResourcesListResponse {
            resources: self.resources.list_resources(),
            next_cursor: None,
        })?)
    }

    fn handle_resource_templates_list(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        let _params: PaginatedRequest = optional_params(request)?;
        Ok(serde_json::to_value(ResourceTemplatesListResponse {
            resource_templates: self.resources.list_templates(),
            next_cursor: None,
        })?)
    }

    async fn handle_resources_read(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        let read_request: ResourcesReadRequest = required_params(request)?;

        let deadline = self.governance.deadline();
        let _permit = self.acquire_permit(deadline).await?;
        let router = self.resources.with_deadline(deadline);
        let content = match timeout_at(deadline, router.read(&read_request.uri)).await {
            Ok(result) => result?,
            Err(_) => return Err(McpError::Timeout(self.governance.timeout)),
        };

        Ok(serde_json::to_value(ResourcesReadResponse {
            contents: vec![content],
        })?)
    }

    async fn acquire_permit(&self, deadline: Instant) -> McpResult<SemaphorePermit<'_>> {
        match timeout_at(deadline, self.governance.concurrency_limiter.acquire()).await {
            Ok(permit) => permit
                .map_err(|_| McpError::Internal("Failed to acquire concurrency permit".to_string())),
            Err(_) => Err(McpError::Timeout(self.governance.timeout)),
        }
    }
}

fn required_params<T: DeserializeOwned>(request: &JsonRpcRequest) -> McpResult<T> {
    let params = request.params.as_ref().ok_or_else(|| {
        McpError::InvalidArguments(format!("Missing params for {}", request.method))
    })?;
    Ok(serde_json::from_value(params.clone())?)
}

fn optional_params<T: DeserializeOwned + Default>(request: &JsonRpcRequest) -> McpResult<T> {
    match &request.params {
        Some(params) => Ok(serde_json::from_value(params.clone())?),
        None => Ok(T::default()),
    }
}

/// Wrap tool output as a call result: one text block, plus structured content
/// for JSON objects.
fn call_result(output: ToolOutput) -> McpResult<ToolsCallResponse> {
    let response = match output {
        ToolOutput::Json(value) => ToolsCallResponse {
            content: vec![ContentBlock::Text {
                text: serde_json::to_string_pretty(&value)?,
            }],
            is_error: None,
            structured_content: value.is_object().then_some(value),
        },
        ToolOutput::Text(text) => ToolsCallResponse {
            content: vec![ContentBlock::Text { text }],
            is_error: None,
            structured_content: None,
        },
    };
    Ok(response)
}

fn log_governance(governance: &GovernanceConfig) {
    info!(
        "Governance: max_concurrency={}, timeout={:?}, read_only={}",
        governance.max_concurrency, governance.timeout, governance.read_only
    );
    if !governance.allow_patterns.is_empty() {
        info!("Allow patterns: {:?}", governance.allow_patterns);
    }
    if !governance.deny_patterns.is_empty() {
        info!("Deny patterns: {:?}", governance.deny_patterns);
    }
}

/// Serve newline-delimited JSON-RPC messages from `reader`, writing one
/// response line per request.
pub async fn serve_lines<R, W>(server: &McpServer, reader: R, mut writer: W) -> McpResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(response) = server.process_message(line.as_bytes()).await {
            let mut response_json = serde_json::to_string(&response)?;
            response_json.push('\n');
            writer.write_all(response_json.as_bytes()).await?;
            writer.flush().await?;
        }
    }
    Ok(())
}

/// Serve MCP over stdin/stdout
pub async fn serve_stdio(client: JenkinsClient, governance: GovernanceConfig) -> McpResult<()> {
    info!("Starting Jenkins MCP server (stdio mode)");
    log_governance(&governance);

    let server = McpServer::new(client, governance);
    serve_lines(
        &server,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;

    info!("MCP server stopped");
    Ok(())
}

/// Build the HTTP router exposing `POST /mcp`.
pub fn build_router(server: Arc<McpServer>) -> axum::Router {
    use axum::{
        extract::State,
        http::{HeaderMap, HeaderValue, StatusCode},
        response::{IntoResponse, Json, Response},
        routing::post,
        Router,
    };
    use uuid::Uuid;

    async fn handle_mcp_request(
        State(server): State<Arc<McpServer>>,
        headers: HeaderMap,
        body: axum::body::Bytes,
    ) -> Response {
        // Validate MCP protocol version
        if let Some(protocol_version) = headers.get("mcp-protocol-version") {
            let version_str = protocol_version.to_str().unwrap_or("");
            if !SUPPORTED_PROTOCOL_VERSIONS.contains(&version_str) {
                warn!("Unsupported MCP protocol version: {}", version_str);
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Unsupported MCP protocol version",
                        "supported_versions": SUPPORTED_PROTOCOL_VERSIONS
                    })),
                )
                    .into_response();
            }
        }

        let mut response_headers = HeaderMap::new();
        response_headers.insert(
            "mcp-protocol-version",
            HeaderValue::from_static(LATEST_PROTOCOL_VERSION),
        );
        let session = headers
            .get("mcp-session-id")
            .cloned()
            .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());
        if let Some(session) = session {
            response_headers.insert("mcp-session-id", session);
        }

        match server.process_message(&body[..]).await {
            Some(response) => (response_headers, Json(response)).into_response(),
            // Notification - accepted, no body
            None => (StatusCode::ACCEPTED, response_headers).into_response(),
        }
    }

    Router::new()
        .route("/mcp", post(handle_mcp_request))
        .with_state(server)
}

/// Serve MCP over HTTP
pub async fn serve_http(
    client: JenkinsClient,
    governance: GovernanceConfig,
    addr: &str,
) -> McpResult<()> {
    info!("Starting Jenkins MCP server (HTTP mode) on {}", addr);
    log_governance(&governance);

    let app = build_router(Arc::new(McpServer::new(client, governance)));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| McpError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("HTTP MCP server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| McpError::Internal(format!("HTTP server error: {}", e)))?;

    Ok(())
}
