//! Composite controller health summary.

use chrono::{DateTime, Utc};
use jenkins_connector::models::{NodeList, QueueItem, ServerInfo};
use jenkins_connector::{JenkinsClient, JenkinsResult};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeCounts {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub idle: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
    pub version: Option<String>,
    pub quieting_down: bool,
    pub nodes: NodeCounts,
    pub busy_executors: u32,
    pub total_executors: u32,
    pub queue_length: usize,
    pub stuck_items: usize,
    /// When the longest-waiting queue item was enqueued.
    pub oldest_queued_since: Option<DateTime<Utc>>,
}

/// Merge the three inputs into one summary. A controller with no node online
/// cannot run anything and is reported as degraded.
pub fn summarize(
    info: &ServerInfo,
    nodes: &NodeList,
    queue: &[QueueItem],
    checked_at: DateTime<Utc>,
) -> HealthSummary {
    let total = nodes.nodes.len();
    let offline = nodes.nodes.iter().filter(|n| n.offline).count();
    let idle = nodes.nodes.iter().filter(|n| !n.offline && n.idle).count();
    let counts = NodeCounts {
        total,
        online: total - offline,
        offline,
        idle,
    };

    HealthSummary {
        status: if counts.online > 0 {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        },
        checked_at,
        version: info.version.clone(),
        quieting_down: info.quieting_down.unwrap_or(false),
        nodes: counts,
        busy_executors: nodes.busy_executors,
        total_executors: nodes.total_executors,
        queue_length: queue.len(),
        stuck_items: queue.iter().filter(|item| item.stuck).count(),
        oldest_queued_since: queue.iter().filter_map(QueueItem::queued_since).min(),
    }
}

/// Fetch nodes, queue and version concurrently and summarise them.
pub async fn check(client: &JenkinsClient) -> JenkinsResult<HealthSummary> {
    let (nodes, queue, info) = tokio::join!(
        client.list_nodes(),
        client.get_queue(),
        client.server_info()
    );
    let summary = summarize(&info?, &nodes?, &queue?, Utc::now());
    debug!(
        status = ?summary.status,
        online = summary.nodes.online,
        queue = summary.queue_length,
        "Health summary computed"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jenkins_connector::models::NodeInfo;

    fn node(name: &str, offline: bool, idle: bool) -> NodeInfo {
        NodeInfo {
            display_name: name.to_string(),
            offline,
            idle,
            num_executors: 2,
            ..NodeInfo::default()
        }
    }

    #[test]
    fn node_counts_always_add_up() {
        // Every on/off and idle/busy combination for up to four nodes.
        for size in 0..=4usize {
            for mask in 0..(1u32 << (2 * size)) {
                let nodes: Vec<NodeInfo> = (0..size)
                    .map(|i| {
                        let bits = mask >> (2 * i);
                        node(&format!("n{}", i), bits & 1 == 1, bits & 2 == 2)
                    })
                    .collect();
                let list = NodeList {
                    nodes,
                    ..NodeList::default()
                };
                let summary = summarize(&ServerInfo::default(), &list, &[], Utc::now());
                assert_eq!(summary.nodes.total, size);
                assert_eq!(summary.nodes.online + summary.nodes.offline, summary.nodes.total);
                assert!(summary.nodes.idle <= summary.nodes.online);
            }
        }
    }

    #[test]
    fn degraded_without_online_nodes() {
        let list = NodeList {
            nodes: vec![node("built-in", true, true)],
            ..NodeList::default()
        };
        let summary = summarize(&ServerInfo::default(), &list, &[], Utc::now());
        assert_eq!(summary.status, HealthStatus::Degraded);

        let list = NodeList {
            nodes: vec![node("built-in", true, true), node("agent", false, false)],
            busy_executors: 2,
            total_executors: 4,
        };
        let queue = vec![
            QueueItem {
                id: 1,
                stuck: true,
                in_queue_since: Some(1_700_000_500_000),
                ..QueueItem::default()
            },
            QueueItem {
                id: 2,
                in_queue_since: Some(1_700_000_000_000),
                ..QueueItem::default()
            },
        ];
        let summary = summarize(&ServerInfo::default(), &list, &queue, Utc::now());
        assert_eq!(summary.status, HealthStatus::Healthy);
        assert_eq!(summary.queue_length, 2);
        assert_eq!(summary.stuck_items, 1);
        assert_eq!(summary.busy_executors, 2);
        assert_eq!(
            summary.oldest_queued_since.map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn serializes_camel_case() {
        let summary = summarize(
            &ServerInfo {
                version: Some("2.452".into()),
                ..ServerInfo::default()
            },
            &NodeList::default(),
            &[],
            Utc::now(),
        );
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["status"], "degraded");
        assert_eq!(value["version"], "2.452");
        assert!(value.get("checkedAt").is_some());
        assert_eq!(value["queueLength"], 0);
        assert!(value["oldestQueuedSince"].is_null());
    }
}
