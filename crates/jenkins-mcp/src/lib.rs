//! Jenkins MCP (Model Context Protocol) Server
//!
//! Exposes Jenkins operations as MCP tools and `jenkins://` addresses as MCP
//! resources, over newline-delimited stdio or HTTP.

pub mod error;
pub mod governance;
pub mod jsonrpc;
pub mod mcp;
pub mod server;
pub mod tools;

// Re-export key types
pub use error::{McpError, McpResult};
pub use governance::GovernanceConfig;
pub use server::McpServer;
pub use tools::{ToolCall, ToolKind};

pub use server::{build_router, serve_http, serve_lines, serve_stdio};
