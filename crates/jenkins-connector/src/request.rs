//! Request and response values exchanged with a [`Transport`].

use crate::error::{JenkinsError, JenkinsResult};
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tokio::time::Instant;

/// Request payloads Jenkins accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(JsonValue),
    /// `application/xml`, used for job configuration documents.
    Xml(String),
    /// `application/x-www-form-urlencoded`, used for build parameters.
    Form(Vec<(String, String)>),
}

/// One logical call against the Jenkins REST surface.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Name used in logs and error messages, e.g. `trigger_build`.
    pub operation: String,
    pub method: Method,
    /// Encoded path relative to the Jenkins root, starting with `/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// State-mutating calls carry an anti-forgery token.
    pub mutating: bool,
    pub deadline: Option<Instant>,
}

impl ApiRequest {
    pub fn get(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
            mutating: false,
            deadline: None,
        }
    }

    pub fn post(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: None,
            mutating: true,
            deadline: None,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// A response with a 2xx status (or any status, when returned by the raw
/// sending layer of the executor).
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub status: u16,
    /// Header names are lower-cased.
    pub headers: HashMap<String, String>,
    pub body: String,
    pub elapsed_ms: u64,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self, operation: &str) -> JenkinsResult<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            JenkinsError::invalid_response(operation, format!("could not decode JSON body: {}", e))
        })
    }
}

/// Anything that can carry out an [`ApiRequest`].
///
/// [`JenkinsExecutor`](crate::executor::JenkinsExecutor) is the production
/// implementation; tests substitute in-memory ones.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> JenkinsResult<ApiResponse>;
}
