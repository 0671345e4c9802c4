use crate::config::JenkinsConfig;
use crate::credentials::{self, CredentialHeader};
use crate::crumb::{Crumb, CrumbFetch, CrumbManager};
use crate::error::{excerpt, JenkinsError, JenkinsResult};
use crate::request::{ApiRequest, ApiResponse, RequestBody, Transport};
use crate::retry_manager::{FailureClass, RetryDecision, RetryManager};
use crate::timeout_manager::{AttemptError, TimeoutManager};
use crate::tls::{TransportPolicy, TrustBuilder};
use crate::url_builder::UrlBuilder;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Request};
use std::collections::HashMap;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};
use url::Url;

const CRUMB_ISSUER_PATH: &str = "/crumbIssuer/api/json";

/// Executes Jenkins REST calls with the configured trust policy, credentials,
/// anti-forgery tokens, per-attempt timeouts and bounded retries.
///
/// Built once at startup; everything except the crumb state is immutable and
/// the executor can be shared freely behind an `Arc`.
#[derive(Debug)]
pub struct JenkinsExecutor {
    client: Client,
    base_url: Url,
    credentials: Option<CredentialHeader>,
    trust: TransportPolicy,
    crumbs: CrumbManager,
    timeouts: TimeoutManager,
    retries: RetryManager,
    crumb_retries: u32,
}

/// Why the last attempt of a retried send failed.
enum SendFailure {
    Status(ApiResponse),
    Attempt(AttemptError),
}

impl SendFailure {
    fn into_error(self, operation: &str, attempts: u32) -> JenkinsError {
        match self {
            SendFailure::Status(response) => JenkinsError::Server {
                operation: operation.to_string(),
                status: response.status,
                attempts,
                message: excerpt(&response.body),
            },
            SendFailure::Attempt(AttemptError::TimedOut { after }) => JenkinsError::Timeout {
                operation: operation.to_string(),
                timeout_ms: Some(after.as_millis() as u64),
            },
            SendFailure::Attempt(AttemptError::Transport { message, .. }) => JenkinsError::Network {
                operation: operation.to_string(),
                attempts,
                message,
            },
        }
    }

    fn describe(&self) -> String {
        match self {
            SendFailure::Status(response) => format!("HTTP {}", response.status),
            SendFailure::Attempt(AttemptError::TimedOut { after }) => {
                format!("timed out after {}ms", after.as_millis())
            }
            SendFailure::Attempt(AttemptError::Transport { message, .. }) => message.clone(),
        }
    }

    fn class(&self) -> FailureClass {
        match self {
            SendFailure::Status(_) => FailureClass::Transient,
            SendFailure::Attempt(err) => err.class(),
        }
    }
}

impl JenkinsExecutor {
    /// Validate the configuration, load trust material and resolve credentials.
    ///
    /// Fails only with `Configuration` or `CertificateLoad` errors; no network
    /// traffic happens here.
    pub fn new(config: &JenkinsConfig) -> JenkinsResult<Self> {
        let base_url = config.validate()?;
        let trust = TrustBuilder::build(&config.trust)?;
        let credentials = credentials::resolve(config);
        let timeouts = TimeoutManager::new(config.timeout());
        let retries = RetryManager::new(config.retry.clone());

        let builder = Client::builder()
            .cookie_store(true)
            .user_agent(concat!("jenkins-mcp/", env!("CARGO_PKG_VERSION")));
        let builder = timeouts.apply_to_client_builder(builder);
        let client = trust.apply_to(builder)?.build().map_err(|e| {
            JenkinsError::configuration(format!("Failed to build HTTP client: {}", e))
        })?;

        info!(
            base_url = %base_url,
            authenticated = credentials.is_some(),
            user = credentials.as_ref().map(|c| c.username()).unwrap_or("anonymous"),
            tls = trust.mode().as_str(),
            timeout_ms = config.timeout_ms,
            max_attempts = retries.max_attempts(),
            worst_case_ms = retries.worst_case(timeouts.per_attempt()).as_millis() as u64,
            "Jenkins executor ready"
        );

        Ok(Self {
            client,
            base_url,
            credentials,
            trust,
            crumbs: CrumbManager::new(),
            timeouts,
            retries,
            crumb_retries: config.crumb_retries,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn crumbs(&self) -> &CrumbManager {
        &self.crumbs
    }

    pub fn trust(&self) -> &TransportPolicy {
        &self.trust
    }

    /// Fetch the anti-forgery token eagerly, e.g. at session start.
    /// Returns whether the server issued one.
    pub async fn prime_crumb(&self) -> JenkinsResult<bool> {
        let crumb = self
            .crumbs
            .current_or_fetch(|| self.fetch_crumb("prime_crumb", None))
            .await?;
        Ok(crumb.is_some())
    }

    async fn execute_request(&self, request: &ApiRequest) -> JenkinsResult<ApiResponse> {
        let mut crumb_refreshes = 0;
        loop {
            let crumb = if request.mutating {
                self.crumbs
                    .current_or_fetch(|| self.fetch_crumb(&request.operation, request.deadline))
                    .await?
            } else {
                None
            };

            let response = self.send_with_retry(request, crumb.as_ref()).await?;
            if response.is_success() {
                return Ok(response);
            }

            if response.status == 401 {
                self.crumbs.clear().await;
            }

            if request.mutating && is_crumb_rejection(&response) {
                self.crumbs.invalidate(crumb.as_ref()).await;
                if crumb_refreshes < self.crumb_retries {
                    crumb_refreshes += 1;
                    warn!(
                        operation = %request.operation,
                        refresh = crumb_refreshes,
                        "Anti-forgery token rejected; fetching a fresh one"
                    );
                    continue;
                }
                return Err(JenkinsError::Authentication {
                    operation: request.operation.clone(),
                    message: format!(
                        "anti-forgery token rejected after {} refresh(es): {}",
                        crumb_refreshes,
                        excerpt(&response.body)
                    ),
                });
            }

            return Err(JenkinsError::from_status(
                &request.operation,
                response.status,
                &response.body,
            ));
        }
    }

    /// Send with transient-failure retries. Returns the first response that is
    /// not a 5xx, whatever its status.
    async fn send_with_retry(
        &self,
        request: &ApiRequest,
        crumb: Option<&Crumb>,
    ) -> JenkinsResult<ApiResponse> {
        let mut attempt = 1;
        loop {
            let limit = self
                .timeouts
                .attempt_timeout(request.deadline)
                .ok_or_else(|| JenkinsError::Timeout {
                    operation: request.operation.clone(),
                    timeout_ms: None,
                })?;
            let http_request = self.build_request(request, crumb)?;

            if self.trust.debug_trace() {
                info!(
                    target: "jenkins::tls",
                    operation = %request.operation,
                    method = %request.method,
                    path = %request.path,
                    attempt,
                    tls = self.trust.mode().as_str(),
                    client_identity = self.trust.has_client_identity(),
                    "Dispatching request"
                );
            } else {
                debug!(operation = %request.operation, method = %request.method, path = %request.path, attempt, "Dispatching request");
            }

            let failure = match self.timeouts.run(limit, self.send_once(http_request)).await {
                Ok(response) if self.retries.classify_status(response.status) == FailureClass::Transient => {
                    SendFailure::Status(response)
                }
                Ok(response) => return Ok(response),
                Err(err) => SendFailure::Attempt(err),
            };

            match self.retries.should_retry(attempt, failure.class()) {
                RetryDecision::Retry { delay, next_attempt } => {
                    warn!(
                        operation = %request.operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        cause = %failure.describe(),
                        "Transient failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next_attempt;
                }
                RetryDecision::Stop { reason } => {
                    debug!(operation = %request.operation, attempt, %reason, "Giving up");
                    return Err(failure.into_error(&request.operation, attempt));
                }
            }
        }
    }

    fn build_request(&self, request: &ApiRequest, crumb: Option<&Crumb>) -> JenkinsResult<Request> {
        let url = UrlBuilder::join(&self.base_url, &request.path, &request.query)?;
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(ACCEPT, "application/json");

        if let Some(credentials) = &self.credentials {
            builder = builder.header(AUTHORIZATION, credentials.header_value());
        }
        if let Some(crumb) = crumb {
            builder = builder.header(crumb.field.as_str(), crumb.value.as_str());
        }

        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Xml(xml)) => builder
                .header(CONTENT_TYPE, "application/xml; charset=utf-8")
                .body(xml.clone()),
            Some(RequestBody::Form(pairs)) => builder.form(pairs),
            None => builder,
        };

        builder.build().map_err(|e| JenkinsError::Validation {
            operation: request.operation.clone(),
            message: format!("could not build request: {}", e),
        })
    }

    /// One round trip; the body is read completely before returning.
    async fn send_once(&self, request: Request) -> Result<ApiResponse, reqwest::Error> {
        let started = Instant::now();
        let response = self.client.execute(request).await?;
        let status = response.status().as_u16();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
            }
        }
        let body = response.text().await?;
        Ok(ApiResponse {
            status,
            headers,
            body,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn fetch_crumb(&self, operation: &str, deadline: Option<Instant>) -> JenkinsResult<CrumbFetch> {
        let request = ApiRequest::get("fetch_crumb", CRUMB_ISSUER_PATH).deadline(deadline);
        let failed = |message: String| JenkinsError::Authentication {
            operation: operation.to_string(),
            message: format!("could not obtain anti-forgery token: {}", message),
        };

        let response = self
            .send_with_retry(&request, None)
            .await
            .map_err(|e| failed(e.to_string()))?;

        match response.status {
            200..=299 => response
                .json::<Crumb>("fetch_crumb")
                .map(CrumbFetch::Issued)
                .map_err(|e| failed(e.to_string())),
            404 => Ok(CrumbFetch::NotRequired),
            status => Err(failed(format!(
                "crumb issuer returned HTTP {}: {}",
                status,
                excerpt(&response.body)
            ))),
        }
    }
}

#[async_trait]
impl Transport for JenkinsExecutor {
    async fn execute(&self, request: ApiRequest) -> JenkinsResult<ApiResponse> {
        match request.deadline {
            Some(deadline) => {
                let budget = deadline.saturating_duration_since(Instant::now());
                match timeout_at(deadline, self.execute_request(&request)).await {
                    Ok(result) => result,
                    Err(_) => Err(JenkinsError::Timeout {
                        operation: request.operation.clone(),
                        timeout_ms: (!budget.is_zero()).then(|| budget.as_millis() as u64),
                    }),
                }
            }
            None => self.execute_request(&request).await,
        }
    }
}

/// Jenkins answers a missing or stale crumb with 403 and a message naming it.
fn is_crumb_rejection(response: &ApiResponse) -> bool {
    response.status == 403 && response.body.to_ascii_lowercase().contains("crumb")
}
