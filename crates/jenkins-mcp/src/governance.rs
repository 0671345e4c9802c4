//! Governance and security controls for MCP server

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Governance configuration for MCP server
#[derive(Debug, Clone)]
pub struct GovernanceConfig {
    /// Allowed tool patterns (e.g., ["get_*", "list_jobs"])
    pub allow_patterns: Vec<String>,
    /// Denied tool patterns (e.g., ["*_job", "stop_build"])
    pub deny_patterns: Vec<String>,
    /// Hide and refuse tools that change controller state
    pub read_only: bool,
    /// Maximum concurrent executions
    pub max_concurrency: usize,
    /// Per-call deadline, measured from dispatch
    pub timeout: Duration,
    /// Semaphore for concurrency control
    pub concurrency_limiter: Arc<Semaphore>,
}

impl GovernanceConfig {
    /// Create new governance configuration
    pub fn new(
        allow_patterns: Vec<String>,
        deny_patterns: Vec<String>,
        max_concurrency: usize,
        timeout_secs: u64,
    ) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            allow_patterns,
            deny_patterns,
            read_only: false,
            max_concurrency,
            timeout: Duration::from_secs(timeout_secs),
            concurrency_limiter: Arc::new(Semaphore::new(max_concurrency)),
        }
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Deadline for a call dispatched now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.timeout
    }

    /// Check if a tool is allowed by governance policies
    pub fn is_tool_allowed(&self, tool_name: &str) -> bool {
        // If allow patterns are specified, tool must match at least one
        if !self.allow_patterns.is_empty() {
            let allowed = self
                .allow_patterns
                .iter()
                .any(|pattern| matches_pattern(tool_name, pattern));
            if !allowed {
                return false;
            }
        }

        // Tool must not match any deny pattern
        !self
            .deny_patterns
            .iter()
            .any(|pattern| matches_pattern(tool_name, pattern))
    }

    /// Name patterns plus the read-only switch.
    pub fn permits(&self, tool_name: &str, mutating: bool) -> bool {
        !(self.read_only && mutating) && self.is_tool_allowed(tool_name)
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self::new(vec![], vec![], 10, 120)
    }
}

/// Wildcard matching: `*`, exact names, `prefix*` and `*suffix`.
fn matches_pattern(tool_name: &str, pattern: &str) -> bool {
    if pattern == "*" || pattern == tool_name {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return !prefix.contains('*') && tool_name.starts_with(prefix);
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return !suffix.contains('*') && tool_name.ends_with(suffix);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matching() {
        // Exact match
        assert!(matches_pattern("get_job", "get_job"));
        assert!(!matches_pattern("get_jobs", "get_job"));

        // Prefix wildcard
        assert!(matches_pattern("get_build_log", "get_*"));
        assert!(matches_pattern("get_queue", "get_*"));
        assert!(!matches_pattern("list_jobs", "get_*"));

        // Suffix wildcard
        assert!(matches_pattern("enable_job", "*_job"));
        assert!(matches_pattern("disable_job", "*_job"));
        assert!(!matches_pattern("list_jobs", "*_job"));

        // Universal wildcard
        assert!(matches_pattern("anything", "*"));
    }

    #[test]
    fn test_allow_and_deny_combined() {
        let config = GovernanceConfig::new(
            vec!["get_*".to_string(), "list_*".to_string()],
            vec!["*_config".to_string()],
            10,
            30,
        );

        assert!(config.is_tool_allowed("get_job"));
        assert!(config.is_tool_allowed("list_builds"));
        // Allowed but denied
        assert!(!config.is_tool_allowed("get_job_config"));
        // Not allowed
        assert!(!config.is_tool_allowed("trigger_build"));
    }

    #[test]
    fn test_read_only_blocks_mutations() {
        let config = GovernanceConfig::default().with_read_only(true);
        assert!(config.permits("get_job", false));
        assert!(!config.permits("trigger_build", true));

        let config = GovernanceConfig::default();
        assert!(config.permits("trigger_build", true));
    }

    #[test]
    fn test_concurrency_floor() {
        let config = GovernanceConfig::new(vec![], vec![], 0, 30);
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.concurrency_limiter.available_permits(), 1);
    }
}
