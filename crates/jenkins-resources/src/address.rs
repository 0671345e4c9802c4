//! Parsing of `jenkins://` resource identifiers.
//!
//! Every identifier resolves to exactly one [`ResourceAddress`] variant or
//! fails with an `AddressParse` error; there is no fallback shape.

use jenkins_connector::{BuildRef, JenkinsError, JenkinsResult};
use std::fmt;
use std::str::FromStr;
use urlencoding::{decode, encode};

pub const SCHEME: &str = "jenkins://";

/// The closed set of resource shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Jobs,
    Job,
    JobConfig,
    JobBuilds,
    Build,
    BuildLog,
    BuildArtifacts,
    Nodes,
    Node,
    Queue,
    SystemVersion,
    SystemHealth,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Jobs => "collection-of-jobs",
            ResourceKind::Job => "single-job",
            ResourceKind::JobConfig => "job-configuration",
            ResourceKind::JobBuilds => "job-build-history",
            ResourceKind::Build => "single-build",
            ResourceKind::BuildLog => "build-log",
            ResourceKind::BuildArtifacts => "build-artifacts",
            ResourceKind::Nodes => "collection-of-nodes",
            ResourceKind::Node => "single-node",
            ResourceKind::Queue => "queue",
            ResourceKind::SystemVersion => "system-version",
            ResourceKind::SystemHealth => "system-health",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ResourceKind::JobConfig => "application/xml",
            ResourceKind::BuildLog => "text/plain",
            _ => "application/json",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed resource identifier. Path variables are already percent-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceAddress {
    Jobs,
    Job { name: String },
    JobConfig { name: String },
    JobBuilds { name: String },
    Build { job: String, build: BuildRef },
    BuildLog { job: String, build: BuildRef },
    BuildArtifacts { job: String, build: BuildRef },
    Nodes,
    Node { name: String },
    Queue,
    SystemVersion,
    SystemHealth,
}

impl ResourceAddress {
    pub fn parse(uri: &str) -> JenkinsResult<Self> {
        let fail = |reason: &str| JenkinsError::address(uri, reason);

        let path = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| fail("expected the jenkins:// scheme"))?;
        if path.contains(['?', '#']) {
            return Err(fail("query strings and fragments are not supported"));
        }

        // Split first, decode each variable afterwards: an encoded slash is
        // part of a name, never a separator.
        let segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(fail("empty path segment"));
        }

        let name = |raw: &str| decode_segment(uri, raw);
        let build = |raw: &str| -> JenkinsResult<BuildRef> {
            decode_segment(uri, raw)?.parse::<BuildRef>().map_err(|e| match e {
                JenkinsError::AddressParse { reason, .. } => fail(&reason),
                other => other,
            })
        };

        let address = match segments[..] {
            ["jobs"] => ResourceAddress::Jobs,
            ["job", job] => ResourceAddress::Job { name: name(job)? },
            ["job", job, "config"] => ResourceAddress::JobConfig { name: name(job)? },
            ["job", job, "builds"] => ResourceAddress::JobBuilds { name: name(job)? },
            ["job", job, "build", number] => ResourceAddress::Build {
                job: name(job)?,
                build: build(number)?,
            },
            ["job", job, "build", number, "logs"] => ResourceAddress::BuildLog {
                job: name(job)?,
                build: build(number)?,
            },
            ["job", job, "build", number, "artifacts"] => ResourceAddress::BuildArtifacts {
                job: name(job)?,
                build: build(number)?,
            },
            ["nodes"] => ResourceAddress::Nodes,
            ["node", node] => ResourceAddress::Node { name: name(node)? },
            ["queue"] => ResourceAddress::Queue,
            ["system", "version"] => ResourceAddress::SystemVersion,
            ["system", "health"] => ResourceAddress::SystemHealth,
            _ => return Err(fail("unrecognised resource shape")),
        };
        Ok(address)
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceAddress::Jobs => ResourceKind::Jobs,
            ResourceAddress::Job { .. } => ResourceKind::Job,
            ResourceAddress::JobConfig { .. } => ResourceKind::JobConfig,
            ResourceAddress::JobBuilds { .. } => ResourceKind::JobBuilds,
            ResourceAddress::Build { .. } => ResourceKind::Build,
            ResourceAddress::BuildLog { .. } => ResourceKind::BuildLog,
            ResourceAddress::BuildArtifacts { .. } => ResourceKind::BuildArtifacts,
            ResourceAddress::Nodes => ResourceKind::Nodes,
            ResourceAddress::Node { .. } => ResourceKind::Node,
            ResourceAddress::Queue => ResourceKind::Queue,
            ResourceAddress::SystemVersion => ResourceKind::SystemVersion,
            ResourceAddress::SystemHealth => ResourceKind::SystemHealth,
        }
    }

    pub fn job_name(&self) -> Option<&str> {
        match self {
            ResourceAddress::Job { name }
            | ResourceAddress::JobConfig { name }
            | ResourceAddress::JobBuilds { name } => Some(name),
            ResourceAddress::Build { job, .. }
            | ResourceAddress::BuildLog { job, .. }
            | ResourceAddress::BuildArtifacts { job, .. } => Some(job),
            _ => None,
        }
    }

    pub fn build(&self) -> Option<&BuildRef> {
        match self {
            ResourceAddress::Build { build, .. }
            | ResourceAddress::BuildLog { build, .. }
            | ResourceAddress::BuildArtifacts { build, .. } => Some(build),
            _ => None,
        }
    }

    pub fn node_name(&self) -> Option<&str> {
        match self {
            ResourceAddress::Node { name } => Some(name),
            _ => None,
        }
    }
}

fn decode_segment(uri: &str, raw: &str) -> JenkinsResult<String> {
    let decoded = decode(raw)
        .map_err(|_| JenkinsError::address(uri, format!("'{}' is not valid UTF-8", raw)))?;
    if decoded.trim().is_empty() {
        return Err(JenkinsError::address(uri, "empty path variable"));
    }
    Ok(decoded.into_owned())
}

impl FromStr for ResourceAddress {
    type Err = JenkinsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceAddress::parse(s)
    }
}

/// Renders the canonical identifier, re-encoding path variables.
impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SCHEME)?;
        match self {
            ResourceAddress::Jobs => f.write_str("jobs"),
            ResourceAddress::Job { name } => write!(f, "job/{}", encode(name)),
            ResourceAddress::JobConfig { name } => write!(f, "job/{}/config", encode(name)),
            ResourceAddress::JobBuilds { name } => write!(f, "job/{}/builds", encode(name)),
            ResourceAddress::Build { job, build } => write!(f, "job/{}/build/{}", encode(job), build),
            ResourceAddress::BuildLog { job, build } => {
                write!(f, "job/{}/build/{}/logs", encode(job), build)
            }
            ResourceAddress::BuildArtifacts { job, build } => {
                write!(f, "job/{}/build/{}/artifacts", encode(job), build)
            }
            ResourceAddress::Nodes => f.write_str("nodes"),
            ResourceAddress::Node { name } => write!(f, "node/{}", encode(name)),
            ResourceAddress::Queue => f.write_str("queue"),
            ResourceAddress::SystemVersion => f.write_str("system/version"),
            ResourceAddress::SystemHealth => f.write_str("system/health"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_log_address() {
        let address = ResourceAddress::parse("jenkins://job/my-job/build/42/logs").unwrap();
        assert_eq!(address.kind(), ResourceKind::BuildLog);
        assert_eq!(address.kind().as_str(), "build-log");
        assert_eq!(address.job_name(), Some("my-job"));
        assert_eq!(address.build(), Some(&BuildRef::Number(42)));
    }

    #[test]
    fn encoded_slashes_stay_inside_the_name() {
        let address = ResourceAddress::parse("jenkins://job/my%2Fteam%2Fjob/config").unwrap();
        assert_eq!(
            address,
            ResourceAddress::JobConfig {
                name: "my/team/job".into()
            }
        );
        assert_eq!(address.to_string(), "jenkins://job/my%2Fteam%2Fjob/config");
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        for uri in [
            "jenkins://bogus",
            "jenkins://",
            "jenkins://jobs/",
            "jenkins://job//config",
            "jenkins://job/app/build",
            "jenkins://job/app/settings",
            "jenkins://system",
            "jenkins://queue?x=1",
            "http://job/app",
        ] {
            let err = ResourceAddress::parse(uri).unwrap_err();
            assert_eq!(err.kind(), "address_parse", "{}", uri);
            assert!(err.to_string().contains(uri), "{}", err);
        }
    }

    #[test]
    fn build_aliases_and_bad_numbers() {
        let address = ResourceAddress::parse("jenkins://job/app/build/lastSuccessfulBuild").unwrap();
        assert_eq!(
            address.build(),
            Some(&BuildRef::Alias("lastSuccessfulBuild".into()))
        );

        assert!(ResourceAddress::parse("jenkins://job/app/build/latest").is_err());
        assert!(ResourceAddress::parse("jenkins://job/app/build/0").is_err());
        assert!(ResourceAddress::parse("jenkins://job/app/build/+5").is_err());
        assert!(ResourceAddress::parse("jenkins://job/app/build/007/logs").is_err());
    }

    #[test]
    fn every_shape_parses() {
        let cases = [
            ("jenkins://jobs", ResourceKind::Jobs),
            ("jenkins://job/app", ResourceKind::Job),
            ("jenkins://job/app/config", ResourceKind::JobConfig),
            ("jenkins://job/app/builds", ResourceKind::JobBuilds),
            ("jenkins://job/app/build/3", ResourceKind::Build),
            ("jenkins://job/app/build/3/logs", ResourceKind::BuildLog),
            ("jenkins://job/app/build/3/artifacts", ResourceKind::BuildArtifacts),
            ("jenkins://nodes", ResourceKind::Nodes),
            ("jenkins://node/agent-1", ResourceKind::Node),
            ("jenkins://queue", ResourceKind::Queue),
            ("jenkins://system/version", ResourceKind::SystemVersion),
            ("jenkins://system/health", ResourceKind::SystemHealth),
        ];
        for (uri, kind) in cases {
            let address: ResourceAddress = uri.parse().unwrap();
            assert_eq!(address.kind(), kind);
            assert_eq!(address.to_string(), uri);
        }
    }

    #[test]
    fn node_names_are_decoded() {
        let address = ResourceAddress::parse("jenkins://node/%28built-in%29").unwrap();
        assert_eq!(address.node_name(), Some("(built-in)"));
    }
}
