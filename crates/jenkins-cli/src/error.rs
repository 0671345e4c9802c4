//! Error types for the CLI

use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Jenkins(#[from] jenkins_connector::JenkinsError),

    #[error("MCP server error: {0}")]
    Mcp(#[from] jenkins_mcp::McpError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        Self::General(format!("{:#}", err))
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
