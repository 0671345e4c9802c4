//! Connection configuration for a Jenkins controller.
//!
//! A [`JenkinsConfig`] is assembled once at startup (usually from the
//! environment by the CLI), validated, and then handed to
//! [`JenkinsExecutor::new`](crate::executor::JenkinsExecutor::new). Nothing in
//! here performs I/O.

use crate::error::{JenkinsError, JenkinsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// A secret value (API token, password) that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(<redacted>)")
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Where a piece of PEM material comes from.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PemSource {
    Path(PathBuf),
    Inline(String),
}

impl PemSource {
    /// Interpret a raw setting: inline PEM when it starts with a PEM armor line,
    /// a filesystem path otherwise.
    pub fn parse(value: &str) -> Self {
        if value.trim_start().starts_with("-----BEGIN") {
            PemSource::Inline(value.to_string())
        } else {
            PemSource::Path(PathBuf::from(value))
        }
    }

    /// Path used when reporting errors about this source.
    pub fn display_path(&self) -> PathBuf {
        match self {
            PemSource::Path(path) => path.clone(),
            PemSource::Inline(_) => PathBuf::from("<inline>"),
        }
    }
}

impl fmt::Debug for PemSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PemSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            PemSource::Inline(content) => write!(f, "Inline(<{} bytes>)", content.len()),
        }
    }
}

/// Transport trust inputs, before any material is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustSettings {
    pub verify: bool,
    pub allow_self_signed: bool,
    pub ca_bundle: Option<PemSource>,
    pub client_cert: Option<PemSource>,
    pub client_key: Option<PemSource>,
    pub debug_trace: bool,
}

impl Default for TrustSettings {
    fn default() -> Self {
        Self {
            verify: true,
            allow_self_signed: false,
            ca_bundle: None,
            client_cert: None,
            client_key: None,
            debug_trace: false,
        }
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            backoff_multiplier: 2.0,
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_crumb_retries() -> u32 {
    1
}

/// Everything needed to talk to one Jenkins controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JenkinsConfig {
    pub base_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub api_token: Option<SecretString>,
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Upper bound for a single attempt, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// How many times a rejected anti-forgery token is re-fetched before failing.
    #[serde(default = "default_crumb_retries")]
    pub crumb_retries: u32,
    #[serde(default)]
    pub trust: TrustSettings,
}

impl JenkinsConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: None,
            api_token: None,
            password: None,
            timeout_ms: default_timeout_ms(),
            retry: RetryPolicy::default(),
            crumb_retries: default_crumb_retries(),
            trust: TrustSettings::default(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(SecretString::new(token));
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::new(password));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_trust(mut self, trust: TrustSettings) -> Self {
        self.trust = trust;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check every invariant of the configuration and return the parsed base URL.
    pub fn validate(&self) -> JenkinsResult<Url> {
        let url = Url::parse(self.base_url.trim()).map_err(|e| {
            JenkinsError::configuration(format!("Invalid base URL '{}': {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(JenkinsError::configuration(format!(
                "Base URL '{}' must use http or https",
                self.base_url
            )));
        }
        if url.host_str().is_none() {
            return Err(JenkinsError::configuration(format!(
                "Base URL '{}' has no host",
                self.base_url
            )));
        }

        let username = self.username.as_deref().filter(|u| !u.is_empty());
        let has_token = self.api_token.as_ref().is_some_and(|t| !t.is_empty());
        let has_password = self.password.as_ref().is_some_and(|p| !p.is_empty());
        match username {
            Some(user) if !has_token && !has_password => {
                return Err(JenkinsError::configuration(format!(
                    "User '{}' is configured without an API token or password",
                    user
                )));
            }
            None if has_token || has_password => {
                return Err(JenkinsError::configuration(
                    "An API token or password is configured without a username",
                ));
            }
            _ => {}
        }

        if self.timeout_ms == 0 {
            return Err(JenkinsError::configuration("Timeout must be greater than 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(JenkinsError::configuration(
                "Maximum retry attempts must be at least 1",
            ));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(JenkinsError::configuration(
                "Retry base delay cannot exceed the retry delay cap",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(JenkinsError::configuration(
                "Backoff multiplier must be at least 1.0",
            ));
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = JenkinsConfig::new("https://ci.example.com/jenkins");
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.crumb_retries, 1);
        assert!(config.trust.verify);
    }

    #[test]
    fn rejects_relative_and_non_http_urls() {
        assert!(JenkinsConfig::new("ci.example.com").validate().is_err());
        assert!(JenkinsConfig::new("ftp://ci.example.com").validate().is_err());
        assert!(JenkinsConfig::new("").validate().is_err());
    }

    #[test]
    fn username_requires_a_secret() {
        let err = JenkinsConfig::new("https://ci.example.com")
            .with_username("alice")
            .validate()
            .unwrap_err();
        assert!(matches!(err, JenkinsError::Configuration(_)));

        assert!(JenkinsConfig::new("https://ci.example.com")
            .with_username("alice")
            .with_password("pw")
            .validate()
            .is_ok());
    }

    #[test]
    fn secret_requires_a_username() {
        let err = JenkinsConfig::new("https://ci.example.com")
            .with_api_token("t0k3n")
            .validate()
            .unwrap_err();
        assert!(matches!(err, JenkinsError::Configuration(_)));
    }

    #[test]
    fn retry_and_timeout_bounds() {
        let mut config = JenkinsConfig::new("https://ci.example.com");
        config.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = JenkinsConfig::new("https://ci.example.com");
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = JenkinsConfig::new("https://ci.example.com");
        config.retry.initial_delay_ms = 10_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let config = JenkinsConfig::new("https://ci.example.com")
            .with_username("alice")
            .with_api_token("super-secret-token");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn pem_source_detection() {
        assert_eq!(
            PemSource::parse("/etc/ssl/ca.pem"),
            PemSource::Path(PathBuf::from("/etc/ssl/ca.pem"))
        );
        let inline = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";
        assert!(matches!(PemSource::parse(inline), PemSource::Inline(_)));
        assert!(!format!("{:?}", PemSource::parse(inline)).contains("MIIB"));
    }
}
