//! Error handling for the Jenkins MCP server

use crate::jsonrpc::{self, JsonRpcError};
use jenkins_connector::JenkinsError;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// Errors that can occur in MCP operations
#[derive(Debug, Error)]
pub enum McpError {
    #[error(transparent)]
    Jenkins(#[from] JenkinsError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid params: {0}")]
    InvalidArguments(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Execution timeout after {0:?}")]
    Timeout(Duration),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    /// Convert to JSON-RPC error
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        match self {
            McpError::Jenkins(err) => jenkins_error(err),
            McpError::Serialization(e) => {
                JsonRpcError::invalid_params().with_data(json!({ "message": e.to_string() }))
            }
            McpError::InvalidArguments(msg) => {
                JsonRpcError::invalid_params().with_data(json!({ "message": msg }))
            }
            McpError::ToolNotFound(msg) => {
                JsonRpcError::method_not_found().with_data(json!({ "message": msg }))
            }
            McpError::PermissionDenied(msg) => JsonRpcError::invalid_request()
                .with_data(json!({ "message": format!("Permission denied: {}", msg) })),
            McpError::Timeout(after) => {
                JsonRpcError::new(jsonrpc::TIMEOUT_ERROR, "Request timeout").with_data(json!({
                    "kind": "timeout",
                    "message": format!("no result within {}ms", after.as_millis())
                }))
            }
            _ => JsonRpcError::internal_error().with_data(json!({ "message": self.to_string() })),
        }
    }
}

fn jenkins_error(err: &JenkinsError) -> JsonRpcError {
    let code = match err {
        JenkinsError::Authentication { .. } => jsonrpc::AUTHENTICATION_ERROR,
        JenkinsError::Authorization { .. } => jsonrpc::AUTHORIZATION_ERROR,
        JenkinsError::NotFound { .. } => jsonrpc::NOT_FOUND_ERROR,
        JenkinsError::Validation { .. } => jsonrpc::VALIDATION_ERROR,
        JenkinsError::Timeout { .. } => jsonrpc::TIMEOUT_ERROR,
        JenkinsError::Network { .. } => jsonrpc::NETWORK_ERROR,
        JenkinsError::Server { .. } => jsonrpc::SERVER_ERROR,
        JenkinsError::AddressParse { .. } => jsonrpc::ADDRESS_PARSE_ERROR,
        JenkinsError::Configuration(_) | JenkinsError::CertificateLoad { .. } => {
            jsonrpc::CONFIGURATION_ERROR
        }
        JenkinsError::UnexpectedStatus { .. } | JenkinsError::InvalidResponse { .. } => {
            jsonrpc::UNEXPECTED_RESPONSE_ERROR
        }
    };
    JsonRpcError::new(code, err.to_string()).with_data(json!({
        "kind": err.kind(),
        "operation": err.operation(),
        "message": err.to_string(),
        "retryable": err.is_transient(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jenkins_errors_keep_stable_codes() {
        let err = McpError::from(JenkinsError::NotFound {
            operation: "get_job".into(),
            message: "Not Found".into(),
        });
        let rpc = err.to_jsonrpc_error();
        assert_eq!(rpc.code, -32003);
        let data = rpc.data.unwrap();
        assert_eq!(data["kind"], "not_found");
        assert_eq!(data["operation"], "get_job");
        assert_eq!(data["retryable"], false);

        let err = McpError::from(JenkinsError::Server {
            operation: "list_jobs".into(),
            status: 503,
            attempts: 3,
            message: "Service Unavailable".into(),
        });
        let rpc = err.to_jsonrpc_error();
        assert_eq!(rpc.code, -32007);
        assert_eq!(rpc.data.unwrap()["retryable"], true);

        let err = McpError::from(JenkinsError::address("jenkins://bogus", "unrecognised resource shape"));
        let rpc = err.to_jsonrpc_error();
        assert_eq!(rpc.code, -32008);
        assert!(rpc.data.unwrap()["operation"].is_null());
    }

    #[test]
    fn protocol_errors_use_standard_codes() {
        assert_eq!(
            McpError::InvalidArguments("missing name".into()).to_jsonrpc_error().code,
            -32602
        );
        assert_eq!(
            McpError::ToolNotFound("deploy".into()).to_jsonrpc_error().code,
            -32601
        );
        assert_eq!(
            McpError::Internal("boom".into()).to_jsonrpc_error().code,
            -32603
        );
    }

    #[test]
    fn secrets_are_not_part_of_error_data() {
        let err = McpError::from(JenkinsError::Authentication {
            operation: "list_jobs".into(),
            message: "Invalid password/token for user: alice".into(),
        });
        let rpc = err.to_jsonrpc_error();
        assert_eq!(rpc.code, -32001);
        assert!(!serde_json::to_string(&rpc).unwrap().contains("Basic "));
    }
}
