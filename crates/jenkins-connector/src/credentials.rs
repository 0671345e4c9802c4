//! Credential resolution: decides which identity to present to Jenkins and
//! renders it as an HTTP Basic `Authorization` header value.

use crate::config::{JenkinsConfig, SecretString};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

/// Which secret the header was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    ApiToken,
    Password,
}

/// A fully rendered `Authorization` header value.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialHeader {
    username: String,
    kind: CredentialKind,
    value: String,
}

impl CredentialHeader {
    fn basic(username: &str, secret: &SecretString, kind: CredentialKind) -> Self {
        let encoded = STANDARD.encode(format!("{}:{}", username, secret.expose()));
        Self {
            username: username.to_string(),
            kind,
            value: format!("Basic {}", encoded),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn kind(&self) -> CredentialKind {
        self.kind
    }

    /// The header value, e.g. `Basic YWxpY2U6dG9rZW4=`.
    pub fn header_value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for CredentialHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHeader")
            .field("username", &self.username)
            .field("kind", &self.kind)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Resolve the credential header for a configuration.
///
/// An API token wins over a password. A username without any secret, or no
/// username at all, resolves to anonymous access (`None`).
pub fn resolve(config: &JenkinsConfig) -> Option<CredentialHeader> {
    let username = config.username.as_deref().filter(|u| !u.is_empty())?;

    if let Some(token) = config.api_token.as_ref().filter(|t| !t.is_empty()) {
        return Some(CredentialHeader::basic(username, token, CredentialKind::ApiToken));
    }
    if let Some(password) = config.password.as_ref().filter(|p| !p.is_empty()) {
        return Some(CredentialHeader::basic(username, password, CredentialKind::Password));
    }
    None
}
