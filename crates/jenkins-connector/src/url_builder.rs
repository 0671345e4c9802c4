//! URL building for Jenkins paths.
//!
//! Jenkins addresses nested items as `/job/<folder>/job/<name>`. Every segment
//! is percent-encoded individually so names containing `/`, spaces or `#` can
//! never alter the path structure.

use crate::error::{JenkinsError, JenkinsResult};
use crate::models::BuildRef;
use url::Url;
use urlencoding::encode;

pub struct UrlBuilder;

impl UrlBuilder {
    /// Append an already-encoded absolute `path` to the base URL (keeping any
    /// context path such as `/jenkins`) and add query parameters.
    pub fn join(base: &Url, path: &str, query: &[(String, String)]) -> JenkinsResult<Url> {
        let mut url = base.clone();
        let prefix = base.path().trim_end_matches('/');
        let suffix = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        url.set_path(&format!("{}{}", prefix, suffix));
        url.set_query(None);
        url.set_fragment(None);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// `/job/a/job/b` for the full name `a/b`.
    pub fn job_path(full_name: &str) -> JenkinsResult<String> {
        let segments: Vec<&str> = full_name.trim_matches('/').split('/').collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(invalid_name(full_name));
        }
        Ok(segments
            .iter()
            .map(|segment| format!("/job/{}", encode(segment)))
            .collect())
    }

    /// Parent folder path and leaf name for item creation. The parent of a
    /// top-level job is the root (empty path).
    pub fn parent_and_leaf(full_name: &str) -> JenkinsResult<(String, String)> {
        let trimmed = full_name.trim_matches('/');
        match trimmed.rsplit_once('/') {
            Some((parent, leaf)) if !leaf.trim().is_empty() => {
                Ok((Self::job_path(parent)?, leaf.to_string()))
            }
            None if !trimmed.trim().is_empty() => Ok((String::new(), trimmed.to_string())),
            _ => Err(invalid_name(full_name)),
        }
    }

    pub fn build_path(full_name: &str, build: &BuildRef) -> JenkinsResult<String> {
        Ok(format!("{}/{}", Self::job_path(full_name)?, encode(&build.to_string())))
    }

    pub fn node_path(name: &str) -> String {
        format!("/computer/{}", encode(name))
    }
}

fn invalid_name(full_name: &str) -> JenkinsError {
    JenkinsError::Validation {
        operation: "resolve_job_path".to_string(),
        message: format!("invalid job name '{}'", full_name),
    }
}
