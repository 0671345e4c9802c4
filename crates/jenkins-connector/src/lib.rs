//! Jenkins integration core.
//!
//! Configuration flows into a [`TrustBuilder`] and the credential resolver at
//! startup; the resulting [`JenkinsExecutor`] carries out every REST call with
//! anti-forgery tokens, per-attempt timeouts and bounded retries. The
//! [`JenkinsClient`] exposes typed operations over any [`Transport`].

pub mod client;
pub mod config;
pub mod credentials;
pub mod crumb;
pub mod error;
pub mod executor;
pub mod models;
pub mod request;
pub mod retry_manager;
pub mod timeout_manager;
pub mod tls;
pub mod url_builder;

pub use client::JenkinsClient;
pub use config::{JenkinsConfig, PemSource, RetryPolicy, SecretString, TrustSettings};
pub use credentials::{CredentialHeader, CredentialKind};
pub use crumb::{Crumb, CrumbManager};
pub use error::{JenkinsError, JenkinsResult};
pub use executor::JenkinsExecutor;
pub use models::BuildRef;
pub use request::{ApiRequest, ApiResponse, RequestBody, Transport};
pub use tls::{TransportPolicy, TrustBuilder, TrustMode};
