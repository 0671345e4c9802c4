//! Serde models for the subset of the Jenkins remote API this crate reads.
//!
//! Jenkins decorates every object with a `_class` field and a long tail of
//! optional properties; unknown fields are ignored and most known ones are
//! optional.

use crate::error::{JenkinsError, JenkinsResult};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Permalinks Jenkins maintains for every job.
pub const BUILD_ALIASES: &[&str] = &[
    "lastBuild",
    "lastSuccessfulBuild",
    "lastFailedBuild",
    "lastStableBuild",
    "lastUnstableBuild",
    "lastCompletedBuild",
];

/// A build number or one of the [`BUILD_ALIASES`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BuildRef {
    Number(u64),
    Alias(String),
}

impl FromStr for BuildRef {
    type Err = JenkinsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(alias) = BUILD_ALIASES.iter().find(|a| **a == s) {
            return Ok(BuildRef::Alias((*alias).to_string()));
        }
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(JenkinsError::address(
                s,
                format!("expected a build number or one of {}", BUILD_ALIASES.join(", ")),
            ));
        }
        if s.starts_with('0') {
            return Err(JenkinsError::address(
                s,
                "build numbers start at 1 and have no leading zeros",
            ));
        }
        s.parse::<u64>()
            .map(BuildRef::Number)
            .map_err(|_| JenkinsError::address(s, "build number out of range"))
    }
}

impl fmt::Display for BuildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildRef::Number(n) => write!(f, "{}", n),
            BuildRef::Alias(alias) => f.write_str(alias),
        }
    }
}

impl From<u64> for BuildRef {
    fn from(n: u64) -> Self {
        BuildRef::Number(n)
    }
}

fn from_epoch_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerInfo {
    /// Taken from the `X-Jenkins` response header.
    pub version: Option<String>,
    pub mode: Option<String>,
    pub node_description: Option<String>,
    pub num_executors: Option<u32>,
    pub quieting_down: Option<bool>,
    pub use_crumbs: Option<bool>,
    pub use_security: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobSummary {
    pub name: String,
    pub full_name: Option<String>,
    pub url: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct JobList {
    pub jobs: Vec<JobSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthReport {
    pub description: Option<String>,
    pub score: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobDetail {
    pub name: String,
    pub full_name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub buildable: Option<bool>,
    pub color: Option<String>,
    pub in_queue: Option<bool>,
    pub next_build_number: Option<u64>,
    pub last_build: Option<BuildSummary>,
    pub last_completed_build: Option<BuildSummary>,
    pub last_successful_build: Option<BuildSummary>,
    pub last_failed_build: Option<BuildSummary>,
    pub health_report: Vec<HealthReport>,
    /// Child jobs when the job is a folder.
    pub jobs: Vec<JobSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildSummary {
    pub number: u64,
    pub url: Option<String>,
    pub result: Option<String>,
    pub building: Option<bool>,
    pub timestamp: Option<i64>,
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct BuildList {
    pub builds: Vec<BuildSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Artifact {
    pub file_name: String,
    pub relative_path: String,
    pub display_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ArtifactList {
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildDetail {
    pub number: u64,
    pub url: Option<String>,
    pub display_name: Option<String>,
    pub full_display_name: Option<String>,
    pub description: Option<String>,
    pub result: Option<String>,
    pub building: Option<bool>,
    pub duration: Option<u64>,
    pub estimated_duration: Option<i64>,
    pub timestamp: Option<i64>,
    pub queue_id: Option<u64>,
    pub artifacts: Vec<Artifact>,
}

/// A chunk of console output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildLog {
    pub text: String,
    /// Offset to pass as `start` to continue reading.
    pub next_start: u64,
    /// Whether the build is still producing output.
    pub has_more: bool,
}

/// What Jenkins answered when a build was triggered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedBuild {
    pub job: String,
    pub queue_id: Option<u64>,
    pub queue_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeInfo {
    pub display_name: String,
    pub description: Option<String>,
    pub offline: bool,
    pub temporarily_offline: bool,
    pub idle: bool,
    pub num_executors: u32,
    pub offline_cause_reason: Option<String>,
    pub jnlp_agent: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeList {
    pub busy_executors: u32,
    pub total_executors: u32,
    #[serde(rename = "computer")]
    pub nodes: Vec<NodeInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueTask {
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueExecutable {
    pub number: Option<u64>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueItem {
    pub id: u64,
    pub task: QueueTask,
    pub why: Option<String>,
    pub in_queue_since: Option<i64>,
    pub blocked: bool,
    pub buildable: bool,
    pub stuck: bool,
    pub cancelled: Option<bool>,
    pub executable: Option<QueueExecutable>,
}

impl QueueItem {
    pub fn queued_since(&self) -> Option<DateTime<Utc>> {
        self.in_queue_since.and_then(from_epoch_millis)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Queue {
    pub items: Vec<QueueItem>,
}

/// Extract the queue item id from a `Location` header such as
/// `https://ci.example.com/queue/item/42/`.
pub fn queue_id_from_location(location: &str) -> Option<u64> {
    let trimmed = location.trim_end_matches('/');
    let (prefix, id) = trimmed.rsplit_once('/')?;
    if !prefix.ends_with("/queue/item") {
        return None;
    }
    id.parse().ok()
}

pub(crate) fn require_name(operation: &str, field: &str, value: &str) -> JenkinsResult<()> {
    if value.trim().is_empty() {
        return Err(JenkinsError::Validation {
            operation: operation.to_string(),
            message: format!("'{}' must not be empty", field),
        });
    }
    Ok(())
}
