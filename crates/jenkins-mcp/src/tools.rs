//! The closed set of operations exposed as MCP tools.
//!
//! [`ToolKind`] names each operation and carries its listing metadata;
//! [`ToolCall`] is a parsed invocation with typed arguments, and
//! [`ToolCall::run`] is the only place operations reach the Jenkins client.

use crate::error::{McpError, McpResult};
use crate::mcp::{Tool, ToolAnnotations};
use jenkins_connector::{BuildRef, JenkinsClient, JenkinsError, JenkinsResult};
use jenkins_resources::health;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

const DEFAULT_BUILD_LIMIT: usize = 20;
const MAX_BUILD_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    GetVersion,
    ListJobs,
    GetJob,
    GetJobConfig,
    CreateJob,
    EnableJob,
    DisableJob,
    TriggerBuild,
    ListBuilds,
    GetBuild,
    GetBuildLog,
    GetBuildArtifacts,
    StopBuild,
    ListNodes,
    GetNode,
    GetQueue,
    GetQueueItem,
    CancelQueueItem,
    GetSystemHealth,
}

impl ToolKind {
    pub const ALL: [ToolKind; 19] = [
        ToolKind::GetVersion,
        ToolKind::ListJobs,
        ToolKind::GetJob,
        ToolKind::GetJobConfig,
        ToolKind::CreateJob,
        ToolKind::EnableJob,
        ToolKind::DisableJob,
        ToolKind::TriggerBuild,
        ToolKind::ListBuilds,
        ToolKind::GetBuild,
        ToolKind::GetBuildLog,
        ToolKind::GetBuildArtifacts,
        ToolKind::StopBuild,
        ToolKind::ListNodes,
        ToolKind::GetNode,
        ToolKind::GetQueue,
        ToolKind::GetQueueItem,
        ToolKind::CancelQueueItem,
        ToolKind::GetSystemHealth,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::GetVersion => "get_version",
            ToolKind::ListJobs => "list_jobs",
            ToolKind::GetJob => "get_job",
            ToolKind::GetJobConfig => "get_job_config",
            ToolKind::CreateJob => "create_job",
            ToolKind::EnableJob => "enable_job",
            ToolKind::DisableJob => "disable_job",
            ToolKind::TriggerBuild => "trigger_build",
            ToolKind::ListBuilds => "list_builds",
            ToolKind::GetBuild => "get_build",
            ToolKind::GetBuildLog => "get_build_log",
            ToolKind::GetBuildArtifacts => "get_build_artifacts",
            ToolKind::StopBuild => "stop_build",
            ToolKind::ListNodes => "list_nodes",
            ToolKind::GetNode => "get_node",
            ToolKind::GetQueue => "get_queue",
            ToolKind::GetQueueItem => "get_queue_item",
            ToolKind::CancelQueueItem => "cancel_queue_item",
            ToolKind::GetSystemHealth => "get_system_health",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether the operation changes controller state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            ToolKind::CreateJob
                | ToolKind::EnableJob
                | ToolKind::DisableJob
                | ToolKind::TriggerBuild
                | ToolKind::StopBuild
                | ToolKind::CancelQueueItem
        )
    }

    fn is_destructive(&self) -> bool {
        matches!(self, ToolKind::StopBuild | ToolKind::CancelQueueItem)
    }

    pub fn title(&self) -> &'static str {
        match self {
            ToolKind::GetVersion => "Jenkins version",
            ToolKind::ListJobs => "List jobs",
            ToolKind::GetJob => "Job details",
            ToolKind::GetJobConfig => "Job configuration",
            ToolKind::CreateJob => "Create job",
            ToolKind::EnableJob => "Enable job",
            ToolKind::DisableJob => "Disable job",
            ToolKind::TriggerBuild => "Trigger build",
            ToolKind::ListBuilds => "List builds",
            ToolKind::GetBuild => "Build details",
            ToolKind::GetBuildLog => "Build console log",
            ToolKind::GetBuildArtifacts => "Build artifacts",
            ToolKind::StopBuild => "Stop build",
            ToolKind::ListNodes => "List nodes",
            ToolKind::GetNode => "Node details",
            ToolKind::GetQueue => "Build queue",
            ToolKind::GetQueueItem => "Queue item",
            ToolKind::CancelQueueItem => "Cancel queue item",
            ToolKind::GetSystemHealth => "System health",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::GetVersion => "Jenkins version and controller mode",
            ToolKind::ListJobs => "List top-level jobs with their status colour",
            ToolKind::GetJob => "Details of a job; folder jobs are addressed as 'folder/job'",
            ToolKind::GetJobConfig => "The job's config.xml",
            ToolKind::CreateJob => "Create a job from a config.xml document",
            ToolKind::EnableJob => "Enable a disabled job",
            ToolKind::DisableJob => "Disable a job so it cannot be built",
            ToolKind::TriggerBuild => "Queue a build, optionally with parameters; returns the queue item id",
            ToolKind::ListBuilds => "Most recent builds of a job, newest first",
            ToolKind::GetBuild => "Details of a build by number or alias such as lastBuild",
            ToolKind::GetBuildLog => "Console output of a build from a byte offset",
            ToolKind::GetBuildArtifacts => "Artifacts archived by a build",
            ToolKind::StopBuild => "Abort a running build",
            ToolKind::ListNodes => "Build nodes and executor usage",
            ToolKind::GetNode => "Details of a single build node",
            ToolKind::GetQueue => "Items waiting in the build queue",
            ToolKind::GetQueueItem => "A queue item, including the build it became once started",
            ToolKind::CancelQueueItem => "Remove an item from the build queue",
            ToolKind::GetSystemHealth => "Node availability, executor usage and queue length",
        }
    }

    pub fn input_schema(&self) -> Value {
        let job = json!({"type": "string", "description": "Full job name, e.g. 'team/app'"});
        let build = json!({
            "oneOf": [
                {"type": "integer", "minimum": 1},
                {"type": "string", "enum": jenkins_connector::models::BUILD_ALIASES}
            ],
            "description": "Build number or alias"
        });
        let (properties, required): (Value, Vec<&str>) = match self {
            ToolKind::GetVersion
            | ToolKind::ListJobs
            | ToolKind::ListNodes
            | ToolKind::GetQueue
            | ToolKind::GetSystemHealth => (json!({}), vec![]),
            ToolKind::GetJob
            | ToolKind::GetJobConfig
            | ToolKind::EnableJob
            | ToolKind::DisableJob => (json!({ "name": job }), vec!["name"]),
            ToolKind::CreateJob => (
                json!({
                    "name": job,
                    "config_xml": {"type": "string", "description": "Job config.xml document"}
                }),
                vec!["name", "config_xml"],
            ),
            ToolKind::TriggerBuild => (
                json!({
                    "name": job,
                    "parameters": {
                        "type": "object",
                        "description": "Build parameters",
                        "additionalProperties": {"type": ["string", "number", "boolean"]}
                    }
                }),
                vec!["name"],
            ),
            ToolKind::ListBuilds => (
                json!({
                    "name": job,
                    "limit": {"type": "integer", "minimum": 1, "maximum": MAX_BUILD_LIMIT, "default": DEFAULT_BUILD_LIMIT}
                }),
                vec!["name"],
            ),
            ToolKind::GetBuild | ToolKind::GetBuildArtifacts | ToolKind::StopBuild => {
                (json!({ "name": job, "build": build }), vec!["name", "build"])
            }
            ToolKind::GetBuildLog => (
                json!({
                    "name": job,
                    "build": build,
                    "start": {"type": "integer", "minimum": 0, "default": 0, "description": "Byte offset"}
                }),
                vec!["name", "build"],
            ),
            ToolKind::GetNode => (
                json!({"name": {"type": "string", "description": "Node name, '(built-in)' for the controller"}}),
                vec!["name"],
            ),
            ToolKind::GetQueueItem | ToolKind::CancelQueueItem => (
                json!({"id": {"type": "integer", "minimum": 1}}),
                vec!["id"],
            ),
        };
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }

    pub fn to_tool(&self) -> Tool {
        let mutating = self.is_mutating();
        Tool {
            name: self.name().to_string(),
            title: Some(self.title().to_string()),
            description: Some(self.description().to_string()),
            input_schema: self.input_schema(),
            annotations: Some(ToolAnnotations {
                title: Some(self.title().to_string()),
                read_only_hint: Some(!mutating),
                destructive_hint: Some(self.is_destructive()),
                idempotent_hint: Some(!matches!(self, ToolKind::TriggerBuild | ToolKind::CreateJob)),
                open_world_hint: Some(true),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobArgs {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateJobArgs {
    pub name: String,
    pub config_xml: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerBuildArgs {
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListBuildsArgs {
    pub name: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// A build number or a permalink alias, as sent by clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BuildSelector {
    Number(u64),
    Text(String),
}

impl BuildSelector {
    fn resolve(&self) -> McpResult<BuildRef> {
        let parsed = match self {
            BuildSelector::Number(n) => n.to_string().parse::<BuildRef>(),
            BuildSelector::Text(s) => s.parse::<BuildRef>(),
        };
        parsed.map_err(|e| match e {
            JenkinsError::AddressParse { input, reason } => {
                McpError::InvalidArguments(format!("build '{}': {}", input, reason))
            }
            other => McpError::Jenkins(other),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildArgs {
    pub name: String,
    pub build: BuildSelector,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildLogArgs {
    pub name: String,
    pub build: BuildSelector,
    #[serde(default)]
    pub start: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeArgs {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueItemArgs {
    pub id: u64,
}

/// A parsed tool invocation.
#[derive(Debug, Clone)]
pub enum ToolCall {
    GetVersion,
    ListJobs,
    GetJob(JobArgs),
    GetJobConfig(JobArgs),
    CreateJob(CreateJobArgs),
    EnableJob(JobArgs),
    DisableJob(JobArgs),
    TriggerBuild(TriggerBuildArgs),
    ListBuilds(ListBuildsArgs),
    GetBuild { name: String, build: BuildRef },
    GetBuildLog { name: String, build: BuildRef, start: u64 },
    GetBuildArtifacts { name: String, build: BuildRef },
    StopBuild { name: String, build: BuildRef },
    ListNodes,
    GetNode(NodeArgs),
    GetQueue,
    GetQueueItem(QueueItemArgs),
    CancelQueueItem(QueueItemArgs),
    GetSystemHealth,
}

/// What a tool produced, before it is wrapped into a call result.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Json(Value),
    Text(String),
}

fn args<T: DeserializeOwned>(kind: ToolKind, arguments: Value) -> McpResult<T> {
    serde_json::from_value(arguments)
        .map_err(|e| McpError::InvalidArguments(format!("{}: {}", kind.name(), e)))
}

fn json_output<T: Serialize>(value: &T) -> JenkinsResult<ToolOutput> {
    serde_json::to_value(value)
        .map(ToolOutput::Json)
        .map_err(|e| JenkinsError::invalid_response("encode_result", e.to_string()))
}

fn acknowledged(action: &str, target: Value) -> ToolOutput {
    ToolOutput::Json(json!({ "status": action, "target": target }))
}

/// Parameter values are sent as form fields; non-string JSON scalars use their
/// JSON text.
fn parameter_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl ToolCall {
    /// Parse `arguments` for `kind`. Missing arguments are treated as `{}`.
    pub fn parse(kind: ToolKind, arguments: Option<Value>) -> McpResult<Self> {
        let arguments = match arguments {
            None | Some(Value::Null) => json!({}),
            Some(value) => value,
        };
        let call = match kind {
            ToolKind::GetVersion => {
                args::<NoArgs>(kind, arguments)?;
                ToolCall::GetVersion
            }
            ToolKind::ListJobs => {
                args::<NoArgs>(kind, arguments)?;
                ToolCall::ListJobs
            }
            ToolKind::GetJob => ToolCall::GetJob(args(kind, arguments)?),
            ToolKind::GetJobConfig => ToolCall::GetJobConfig(args(kind, arguments)?),
            ToolKind::CreateJob => ToolCall::CreateJob(args(kind, arguments)?),
            ToolKind::EnableJob => ToolCall::EnableJob(args(kind, arguments)?),
            ToolKind::DisableJob => ToolCall::DisableJob(args(kind, arguments)?),
            ToolKind::TriggerBuild => ToolCall::TriggerBuild(args(kind, arguments)?),
            ToolKind::ListBuilds => {
                let parsed: ListBuildsArgs = args(kind, arguments)?;
                if matches!(parsed.limit, Some(limit) if limit == 0 || limit > MAX_BUILD_LIMIT) {
                    return Err(McpError::InvalidArguments(format!(
                        "list_builds: limit must be between 1 and {}",
                        MAX_BUILD_LIMIT
                    )));
                }
                ToolCall::ListBuilds(parsed)
            }
            ToolKind::GetBuild => {
                let BuildArgs { name, build } = args(kind, arguments)?;
                ToolCall::GetBuild {
                    name,
                    build: build.resolve()?,
                }
            }
            ToolKind::GetBuildLog => {
                let BuildLogArgs { name, build, start } = args(kind, arguments)?;
                ToolCall::GetBuildLog {
                    name,
                    build: build.resolve()?,
                    start,
                }
            }
            ToolKind::GetBuildArtifacts => {
                let BuildArgs { name, build } = args(kind, arguments)?;
                ToolCall::GetBuildArtifacts {
                    name,
                    build: build.resolve()?,
                }
            }
            ToolKind::StopBuild => {
                let BuildArgs { name, build } = args(kind, arguments)?;
                ToolCall::StopBuild {
                    name,
                    build: build.resolve()?,
                }
            }
            ToolKind::ListNodes => {
                args::<NoArgs>(kind, arguments)?;
                ToolCall::ListNodes
            }
            ToolKind::GetNode => ToolCall::GetNode(args(kind, arguments)?),
            ToolKind::GetQueue => {
                args::<NoArgs>(kind, arguments)?;
                ToolCall::GetQueue
            }
            ToolKind::GetQueueItem => ToolCall::GetQueueItem(args(kind, arguments)?),
            ToolKind::CancelQueueItem => ToolCall::CancelQueueItem(args(kind, arguments)?),
            ToolKind::GetSystemHealth => {
                args::<NoArgs>(kind, arguments)?;
                ToolCall::GetSystemHealth
            }
        };
        Ok(call)
    }

    /// Execute against the client. The client's deadline bounds every request.
    pub async fn run(self, client: &JenkinsClient) -> JenkinsResult<ToolOutput> {
        match self {
            ToolCall::GetVersion => json_output(&client.server_info().await?),
            ToolCall::ListJobs => json_output(&client.list_jobs().await?),
            ToolCall::GetJob(a) => json_output(&client.get_job(&a.name).await?),
            ToolCall::GetJobConfig(a) => client.get_job_config(&a.name).await.map(ToolOutput::Text),
            ToolCall::CreateJob(a) => {
                client.create_job(&a.name, &a.config_xml).await?;
                Ok(acknowledged("created", json!(a.name)))
            }
            ToolCall::EnableJob(a) => {
                client.enable_job(&a.name).await?;
                Ok(acknowledged("enabled", json!(a.name)))
            }
            ToolCall::DisableJob(a) => {
                client.disable_job(&a.name).await?;
                Ok(acknowledged("disabled", json!(a.name)))
            }
            ToolCall::TriggerBuild(a) => {
                let parameters: BTreeMap<String, String> = a
                    .parameters
                    .into_iter()
                    .map(|(k, v)| (k, parameter_text(v)))
                    .collect();
                json_output(&client.trigger_build(&a.name, &parameters).await?)
            }
            ToolCall::ListBuilds(a) => {
                let limit = a.limit.unwrap_or(DEFAULT_BUILD_LIMIT);
                json_output(&client.list_builds(&a.name, limit).await?)
            }
            ToolCall::GetBuild { name, build } => json_output(&client.get_build(&name, &build).await?),
            ToolCall::GetBuildLog { name, build, start } => {
                json_output(&client.get_build_log(&name, &build, start).await?)
            }
            ToolCall::GetBuildArtifacts { name, build } => {
                json_output(&client.get_build_artifacts(&name, &build).await?)
            }
            ToolCall::StopBuild { name, build } => {
                client.stop_build(&name, &build).await?;
                Ok(acknowledged("stopped", json!(format!("{}#{}", name, build))))
            }
            ToolCall::ListNodes => json_output(&client.list_nodes().await?),
            ToolCall::GetNode(a) => json_output(&client.get_node(&a.name).await?),
            ToolCall::GetQueue => json_output(&client.get_queue().await?),
            ToolCall::GetQueueItem(a) => json_output(&client.get_queue_item(a.id).await?),
            ToolCall::CancelQueueItem(a) => {
                client.cancel_queue_item(a.id).await?;
                Ok(acknowledged("cancelled", json!(a.id)))
            }
            ToolCall::GetSystemHealth => json_output(&health::check(client).await?),
        }
    }
}
