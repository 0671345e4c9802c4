use crate::address::{ResourceAddress, ResourceKind};
use crate::health;
use jenkins_connector::{JenkinsClient, JenkinsError, JenkinsResult};
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_BUILD_HISTORY: usize = 20;

/// Materialised payload of one resource read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: String,
    pub text: String,
}

/// A concrete, directly readable resource.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

/// An RFC 6570 style template for the parameterised shapes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub uri_template: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

const RESOURCES: &[ResourceDescriptor] = &[
    ResourceDescriptor {
        uri: "jenkins://jobs",
        name: "Jobs",
        description: "All top-level jobs with their status colour",
        mime_type: "application/json",
    },
    ResourceDescriptor {
        uri: "jenkins://nodes",
        name: "Nodes",
        description: "Build nodes and executor usage",
        mime_type: "application/json",
    },
    ResourceDescriptor {
        uri: "jenkins://queue",
        name: "Build queue",
        description: "Items waiting in the build queue",
        mime_type: "application/json",
    },
    ResourceDescriptor {
        uri: "jenkins://system/version",
        name: "Server version",
        description: "Jenkins version and controller mode",
        mime_type: "application/json",
    },
    ResourceDescriptor {
        uri: "jenkins://system/health",
        name: "System health",
        description: "Node availability, executor usage and queue length",
        mime_type: "application/json",
    },
];

const TEMPLATES: &[ResourceTemplate] = &[
    ResourceTemplate {
        uri_template: "jenkins://job/{name}",
        name: "Job",
        description: "Job detail; folder paths are percent-encoded (a%2Fb)",
        mime_type: "application/json",
    },
    ResourceTemplate {
        uri_template: "jenkins://job/{name}/config",
        name: "Job configuration",
        description: "The job's config.xml",
        mime_type: "application/xml",
    },
    ResourceTemplate {
        uri_template: "jenkins://job/{name}/builds",
        name: "Build history",
        description: "Most recent builds of a job",
        mime_type: "application/json",
    },
    ResourceTemplate {
        uri_template: "jenkins://job/{name}/build/{number}",
        name: "Build",
        description: "Build detail by number or alias such as lastBuild",
        mime_type: "application/json",
    },
    ResourceTemplate {
        uri_template: "jenkins://job/{name}/build/{number}/logs",
        name: "Build log",
        description: "Console output of a build",
        mime_type: "text/plain",
    },
    ResourceTemplate {
        uri_template: "jenkins://job/{name}/build/{number}/artifacts",
        name: "Build artifacts",
        description: "Artifacts archived by a build",
        mime_type: "application/json",
    },
    ResourceTemplate {
        uri_template: "jenkins://node/{name}",
        name: "Node",
        description: "A single build node",
        mime_type: "application/json",
    },
];

/// Resolves resource identifiers into payloads through the typed client.
#[derive(Clone)]
pub struct ResourceRouter {
    client: JenkinsClient,
    build_history: usize,
}

impl ResourceRouter {
    pub fn new(client: JenkinsClient) -> Self {
        Self {
            client,
            build_history: DEFAULT_BUILD_HISTORY,
        }
    }

    pub fn with_build_history(mut self, limit: usize) -> Self {
        self.build_history = limit.max(1);
        self
    }

    /// A router whose reads are bounded by `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            client: self.client.with_deadline(deadline),
            build_history: self.build_history,
        }
    }

    pub fn list_resources(&self) -> &'static [ResourceDescriptor] {
        RESOURCES
    }

    pub fn list_templates(&self) -> &'static [ResourceTemplate] {
        TEMPLATES
    }

    pub async fn read(&self, uri: &str) -> JenkinsResult<ResourceContent> {
        let address = ResourceAddress::parse(uri)?;
        debug!(uri, kind = %address.kind(), "Reading resource");
        let text = self.materialize(&address).await?;
        Ok(ResourceContent {
            uri: uri.to_string(),
            mime_type: address.kind().mime_type().to_string(),
            text,
        })
    }

    async fn materialize(&self, address: &ResourceAddress) -> JenkinsResult<String> {
        let client = &self.client;
        match address {
            ResourceAddress::Jobs => to_json(address, &client.list_jobs().await?),
            ResourceAddress::Job { name } => to_json(address, &client.get_job(name).await?),
            ResourceAddress::JobConfig { name } => client.get_job_config(name).await,
            ResourceAddress::JobBuilds { name } => {
                to_json(address, &client.list_builds(name, self.build_history).await?)
            }
            ResourceAddress::Build { job, build } => {
                to_json(address, &client.get_build(job, build).await?)
            }
            ResourceAddress::BuildLog { job, build } => {
                Ok(client.get_build_log(job, build, 0).await?.text)
            }
            ResourceAddress::BuildArtifacts { job, build } => {
                to_json(address, &client.get_build_artifacts(job, build).await?)
            }
            ResourceAddress::Nodes => to_json(address, &client.list_nodes().await?),
            ResourceAddress::Node { name } => to_json(address, &client.get_node(name).await?),
            ResourceAddress::Queue => to_json(address, &client.get_queue().await?),
            ResourceAddress::SystemVersion => to_json(address, &client.server_info().await?),
            ResourceAddress::SystemHealth => to_json(address, &health::check(client).await?),
        }
    }
}

fn to_json<T: Serialize>(address: &ResourceAddress, value: &T) -> JenkinsResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| {
        JenkinsError::invalid_response(format!("read_{}", kind_slug(address.kind())), e.to_string())
    })
}

fn kind_slug(kind: ResourceKind) -> String {
    kind.as_str().replace('-', "_")
}
