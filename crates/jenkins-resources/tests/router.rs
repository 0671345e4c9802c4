use async_trait::async_trait;
use jenkins_connector::{ApiRequest, ApiResponse, JenkinsClient, JenkinsError, JenkinsResult, Transport};
use jenkins_resources::ResourceRouter;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Answers by request path; unknown paths are 404s.
#[derive(Default)]
struct StubJenkins {
    routes: HashMap<String, ApiResponse>,
    seen: Mutex<Vec<String>>,
}

impl StubJenkins {
    fn json(mut self, path: &str, body: Value) -> Self {
        self.routes.insert(
            path.to_string(),
            ApiResponse {
                status: 200,
                body: body.to_string(),
                ..ApiResponse::default()
            },
        );
        self
    }

    fn raw(mut self, path: &str, response: ApiResponse) -> Self {
        self.routes.insert(path.to_string(), response);
        self
    }

    fn paths(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubJenkins {
    async fn execute(&self, request: ApiRequest) -> JenkinsResult<ApiResponse> {
        self.seen.lock().unwrap().push(request.path.clone());
        self.routes
            .get(&request.path)
            .cloned()
            .ok_or_else(|| JenkinsError::NotFound {
                operation: request.operation.clone(),
                message: format!("no route for {}", request.path),
            })
    }
}

fn router(stub: Arc<StubJenkins>) -> ResourceRouter {
    ResourceRouter::new(JenkinsClient::new(stub))
}

#[tokio::test]
async fn reads_build_log_as_plain_text() {
    let mut log = ApiResponse {
        status: 200,
        body: "Started by user alice\nFinished: SUCCESS\n".into(),
        ..ApiResponse::default()
    };
    log.headers.insert("x-text-size".into(), "40".into());
    let stub = Arc::new(StubJenkins::default().raw("/job/my-job/42/logText/progressiveText", log));

    let content = router(stub.clone())
        .read("jenkins://job/my-job/build/42/logs")
        .await
        .unwrap();

    assert_eq!(content.uri, "jenkins://job/my-job/build/42/logs");
    assert_eq!(content.mime_type, "text/plain");
    assert!(content.text.ends_with("Finished: SUCCESS\n"));
}

#[tokio::test]
async fn foldered_job_config_is_fetched_through_folders() {
    let stub = Arc::new(StubJenkins::default().raw(
        "/job/my/job/team/job/job/config.xml",
        ApiResponse {
            status: 200,
            body: "<project><disabled>false</disabled></project>".into(),
            ..ApiResponse::default()
        },
    ));

    let content = router(stub.clone())
        .read("jenkins://job/my%2Fteam%2Fjob/config")
        .await
        .unwrap();

    assert_eq!(content.mime_type, "application/xml");
    assert!(content.text.starts_with("<project>"));
    assert_eq!(stub.paths(), vec!["/job/my/job/team/job/job/config.xml"]);
}

#[tokio::test]
async fn malformed_addresses_never_reach_the_server() {
    let stub = Arc::new(StubJenkins::default());
    let err = router(stub.clone()).read("jenkins://bogus").await.unwrap_err();

    assert_eq!(err.kind(), "address_parse");
    assert!(stub.paths().is_empty());
}

#[tokio::test]
async fn health_merges_nodes_queue_and_version() {
    let mut version = ApiResponse {
        status: 200,
        body: json!({"mode": "NORMAL", "quietingDown": false}).to_string(),
        ..ApiResponse::default()
    };
    version.headers.insert("x-jenkins".into(), "2.452.2".into());

    let stub = Arc::new(
        StubJenkins::default()
            .raw("/api/json", version)
            .json(
                "/computer/api/json",
                json!({
                    "busyExecutors": 1,
                    "totalExecutors": 6,
                    "computer": [
                        {"displayName": "Built-In Node", "offline": false, "idle": true, "numExecutors": 2},
                        {"displayName": "agent-1", "offline": false, "idle": false, "numExecutors": 2},
                        {"displayName": "agent-2", "offline": true, "idle": true, "numExecutors": 2,
                         "offlineCauseReason": "Disconnected"}
                    ]
                }),
            )
            .json(
                "/queue/api/json",
                json!({"items": [{"id": 7, "task": {"name": "app"}, "stuck": true}]}),
            ),
    );

    let content = router(stub).read("jenkins://system/health").await.unwrap();
    let health: Value = serde_json::from_str(&content.text).unwrap();

    assert_eq!(health["status"], "healthy");
    assert_eq!(health["version"], "2.452.2");
    assert_eq!(health["nodes"]["total"], 3);
    assert_eq!(health["nodes"]["online"], 2);
    assert_eq!(health["nodes"]["offline"], 1);
    assert_eq!(health["nodes"]["idle"], 1);
    assert_eq!(health["queueLength"], 1);
    assert_eq!(health["stuckItems"], 1);
}

#[tokio::test]
async fn health_fails_when_any_part_fails() {
    let stub = Arc::new(StubJenkins::default().json("/queue/api/json", json!({"items": []})));
    let err = router(stub).read("jenkins://system/health").await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn build_history_uses_the_limit() {
    let stub = Arc::new(StubJenkins::default().json(
        "/job/app/api/json",
        json!({"builds": [{"number": 12, "result": "SUCCESS"}, {"number": 11, "result": "FAILURE"}]}),
    ));

    let content = router(stub)
        .with_build_history(5)
        .read("jenkins://job/app/builds")
        .await
        .unwrap();
    let builds: Value = serde_json::from_str(&content.text).unwrap();

    assert_eq!(builds.as_array().map(Vec::len), Some(2));
    assert_eq!(builds[0]["number"], 12);
}

#[tokio::test]
async fn listings_describe_every_shape() {
    let router = router(Arc::new(StubJenkins::default()));
    let uris: Vec<&str> = router.list_resources().iter().map(|r| r.uri).collect();
    assert!(uris.contains(&"jenkins://system/health"));
    assert!(router
        .list_templates()
        .iter()
        .any(|t| t.uri_template == "jenkins://job/{name}/build/{number}/logs"));
}
