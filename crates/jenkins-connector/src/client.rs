//! Typed Jenkins operations on top of a [`Transport`].

use crate::error::{JenkinsError, JenkinsResult};
use crate::models::{
    queue_id_from_location, require_name, Artifact, ArtifactList, BuildDetail, BuildList,
    BuildLog, BuildRef, BuildSummary, JobDetail, JobList, JobSummary, NodeInfo, NodeList, Queue,
    QueueItem, QueuedBuild, ServerInfo,
};
use crate::request::{ApiRequest, RequestBody, Transport};
use crate::url_builder::UrlBuilder;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

const SERVER_INFO_TREE: &str = "mode,nodeDescription,numExecutors,quietingDown,useCrumbs,useSecurity";
const JOBS_TREE: &str = "jobs[name,fullName,url,color]";
const ARTIFACTS_TREE: &str = "artifacts[fileName,relativePath,displayPath]";

#[derive(Clone)]
pub struct JenkinsClient {
    transport: Arc<dyn Transport>,
    deadline: Option<Instant>,
}

impl JenkinsClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            deadline: None,
        }
    }

    /// A copy of this client whose calls are all bounded by `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            transport: self.transport.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    async fn send(&self, request: ApiRequest) -> JenkinsResult<crate::request::ApiResponse> {
        self.transport.execute(request.deadline(self.deadline)).await
    }

    async fn get_json<T: DeserializeOwned>(&self, request: ApiRequest) -> JenkinsResult<T> {
        let operation = request.operation.clone();
        self.send(request).await?.json(&operation)
    }

    fn job_path(operation: &str, name: &str) -> JenkinsResult<String> {
        require_name(operation, "job name", name)?;
        UrlBuilder::job_path(name).map_err(|e| e.with_operation(operation))
    }

    fn build_path(operation: &str, name: &str, build: &BuildRef) -> JenkinsResult<String> {
        require_name(operation, "job name", name)?;
        UrlBuilder::build_path(name, build).map_err(|e| e.with_operation(operation))
    }

    pub async fn server_info(&self) -> JenkinsResult<ServerInfo> {
        let request = ApiRequest::get("get_version", "/api/json").query("tree", SERVER_INFO_TREE);
        let response = self.send(request).await?;
        let mut info: ServerInfo = response.json("get_version")?;
        info.version = response.header("x-jenkins").map(str::to_string);
        Ok(info)
    }

    pub async fn list_jobs(&self) -> JenkinsResult<Vec<JobSummary>> {
        let request = ApiRequest::get("list_jobs", "/api/json").query("tree", JOBS_TREE);
        let list: JobList = self.get_json(request).await?;
        Ok(list.jobs)
    }

    pub async fn get_job(&self, name: &str) -> JenkinsResult<JobDetail> {
        let path = Self::job_path("get_job", name)?;
        self.get_json(ApiRequest::get("get_job", format!("{}/api/json", path)))
            .await
    }

    /// The job's `config.xml`, verbatim.
    pub async fn get_job_config(&self, name: &str) -> JenkinsResult<String> {
        let path = Self::job_path("get_job_config", name)?;
        let response = self
            .send(ApiRequest::get("get_job_config", format!("{}/config.xml", path)))
            .await?;
        Ok(response.body)
    }

    /// Create a job (inside its folder, for foldered names) from a config document.
    pub async fn create_job(&self, name: &str, config_xml: &str) -> JenkinsResult<()> {
        require_name("create_job", "job name", name)?;
        require_name("create_job", "config_xml", config_xml)?;
        let (parent, leaf) =
            UrlBuilder::parent_and_leaf(name).map_err(|e| e.with_operation("create_job"))?;
        let request = ApiRequest::post("create_job", format!("{}/createItem", parent))
            .query("name", leaf)
            .body(RequestBody::Xml(config_xml.to_string()));
        self.send(request).await?;
        debug!(job = name, "Job created");
        Ok(())
    }

    pub async fn enable_job(&self, name: &str) -> JenkinsResult<()> {
        let path = Self::job_path("enable_job", name)?;
        self.send(ApiRequest::post("enable_job", format!("{}/enable", path)))
            .await?;
        Ok(())
    }

    pub async fn disable_job(&self, name: &str) -> JenkinsResult<()> {
        let path = Self::job_path("disable_job", name)?;
        self.send(ApiRequest::post("disable_job", format!("{}/disable", path)))
            .await?;
        Ok(())
    }

    /// The most recent `limit` builds of a job, newest first.
    pub async fn list_builds(&self, name: &str, limit: usize) -> JenkinsResult<Vec<BuildSummary>> {
        let path = Self::job_path("list_builds", name)?;
        let tree = format!(
            "builds[number,url,result,building,timestamp,duration]{{0,{}}}",
            limit.max(1)
        );
        let request = ApiRequest::get("list_builds", format!("{}/api/json", path)).query("tree", tree);
        let list: BuildList = self.get_json(request).await?;
        Ok(list.builds)
    }

    /// Queue a build. With parameters the job's `buildWithParameters` endpoint is used.
    pub async fn trigger_build(
        &self,
        name: &str,
        parameters: &BTreeMap<String, String>,
    ) -> JenkinsResult<QueuedBuild> {
        let path = Self::job_path("trigger_build", name)?;
        let request = if parameters.is_empty() {
            ApiRequest::post("trigger_build", format!("{}/build", path))
        } else {
            let form = parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            ApiRequest::post("trigger_build", format!("{}/buildWithParameters", path))
                .body(RequestBody::Form(form))
        };

        let response = self.send(request).await?;
        let queue_url = response.header("location").map(str::to_string);
        let queue_id = queue_url.as_deref().and_then(queue_id_from_location);
        debug!(job = name, ?queue_id, "Build queued");
        Ok(QueuedBuild {
            job: name.to_string(),
            queue_id,
            queue_url,
        })
    }

    pub async fn get_build(&self, name: &str, build: &BuildRef) -> JenkinsResult<BuildDetail> {
        let path = Self::build_path("get_build", name, build)?;
        self.get_json(ApiRequest::get("get_build", format!("{}/api/json", path)))
            .await
    }

    /// Console output from byte offset `start`.
    pub async fn get_build_log(
        &self,
        name: &str,
        build: &BuildRef,
        start: u64,
    ) -> JenkinsResult<BuildLog> {
        let path = Self::build_path("get_build_log", name, build)?;
        let request = ApiRequest::get(
            "get_build_log",
            format!("{}/logText/progressiveText", path),
        )
        .query("start", start.to_string());
        let response = self.send(request).await?;

        let next_start = match response.header("x-text-size") {
            Some(size) => size.trim().parse().map_err(|_| {
                JenkinsError::invalid_response("get_build_log", format!("bad X-Text-Size '{}'", size))
            })?,
            None => start + response.body.len() as u64,
        };
        let has_more = response
            .header("x-more-data")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Ok(BuildLog {
            text: response.body,
            next_start,
            has_more,
        })
    }

    pub async fn get_build_artifacts(
        &self,
        name: &str,
        build: &BuildRef,
    ) -> JenkinsResult<Vec<Artifact>> {
        let path = Self::build_path("get_build_artifacts", name, build)?;
        let request = ApiRequest::get("get_build_artifacts", format!("{}/api/json", path))
            .query("tree", ARTIFACTS_TREE);
        let list: ArtifactList = self.get_json(request).await?;
        Ok(list.artifacts)
    }

    pub async fn stop_build(&self, name: &str, build: &BuildRef) -> JenkinsResult<()> {
        let path = Self::build_path("stop_build", name, build)?;
        self.send(ApiRequest::post("stop_build", format!("{}/stop", path)))
            .await?;
        Ok(())
    }

    pub async fn list_nodes(&self) -> JenkinsResult<NodeList> {
        self.get_json(ApiRequest::get("list_nodes", "/computer/api/json"))
            .await
    }

    pub async fn get_node(&self, name: &str) -> JenkinsResult<NodeInfo> {
        require_name("get_node", "node name", name)?;
        let path = format!("{}/api/json", UrlBuilder::node_path(name));
        self.get_json(ApiRequest::get("get_node", path)).await
    }

    pub async fn get_queue(&self) -> JenkinsResult<Vec<QueueItem>> {
        let queue: Queue = self
            .get_json(ApiRequest::get("get_queue", "/queue/api/json"))
            .await?;
        Ok(queue.items)
    }

    pub async fn get_queue_item(&self, id: u64) -> JenkinsResult<QueueItem> {
        self.get_json(ApiRequest::get(
            "get_queue_item",
            format!("/queue/item/{}/api/json", id),
        ))
        .await
    }

    pub async fn cancel_queue_item(&self, id: u64) -> JenkinsResult<()> {
        let request = ApiRequest::post("cancel_queue_item", "/queue/cancelItem").query("id", id.to_string());
        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ApiResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records requests and answers each with a canned response.
    struct Recorder {
        seen: Mutex<Vec<ApiRequest>>,
        response: ApiResponse,
    }

    impl Recorder {
        fn new(response: ApiResponse) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                response,
            })
        }

        fn last(&self) -> ApiRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for Recorder {
        async fn execute(&self, request: ApiRequest) -> JenkinsResult<ApiResponse> {
            self.seen.lock().unwrap().push(request);
            Ok(self.response.clone())
        }
    }

    fn ok(body: serde_json::Value) -> ApiResponse {
        ApiResponse {
            status: 200,
            body: body.to_string(),
            ..ApiResponse::default()
        }
    }

    #[tokio::test]
    async fn server_info_reads_version_header() {
        let mut response = ok(json!({"mode": "NORMAL", "numExecutors": 2}));
        response.headers.insert("x-jenkins".into(), "2.452.1".into());
        let recorder = Recorder::new(response);
        let client = JenkinsClient::new(recorder.clone());

        let info = client.server_info().await.unwrap();
        assert_eq!(info.version.as_deref(), Some("2.452.1"));
        assert_eq!(info.num_executors, Some(2));
        assert_eq!(recorder.last().path, "/api/json");
    }

    #[tokio::test]
    async fn foldered_job_paths() {
        let recorder = Recorder::new(ok(json!({"name": "api"})));
        let client = JenkinsClient::new(recorder.clone());
        client.get_job("team/api").await.unwrap();
        assert_eq!(recorder.last().path, "/job/team/job/api/api/json");
        assert!(!recorder.last().mutating);
    }

    #[tokio::test]
    async fn trigger_with_parameters_posts_form() {
        let mut response = ApiResponse {
            status: 201,
            ..ApiResponse::default()
        };
        response
            .headers
            .insert("location".into(), "https://ci.example.com/queue/item/99/".into());
        let recorder = Recorder::new(response);
        let client = JenkinsClient::new(recorder.clone());

        let mut params = BTreeMap::new();
        params.insert("BRANCH".to_string(), "main".to_string());
        let queued = client.trigger_build("deploy", &params).await.unwrap();

        assert_eq!(queued.queue_id, Some(99));
        let request = recorder.last();
        assert_eq!(request.path, "/job/deploy/buildWithParameters");
        assert!(request.mutating);
        assert_eq!(
            request.body,
            Some(RequestBody::Form(vec![("BRANCH".into(), "main".into())]))
        );
    }

    #[tokio::test]
    async fn create_job_targets_parent_folder() {
        let recorder = Recorder::new(ApiResponse {
            status: 200,
            ..ApiResponse::default()
        });
        let client = JenkinsClient::new(recorder.clone());
        client.create_job("team/new-job", "<project/>").await.unwrap();

        let request = recorder.last();
        assert_eq!(request.path, "/job/team/createItem");
        assert_eq!(request.query, vec![("name".to_string(), "new-job".to_string())]);
        assert_eq!(request.body, Some(RequestBody::Xml("<project/>".into())));
    }

    #[tokio::test]
    async fn progressive_log_headers() {
        let mut response = ApiResponse {
            status: 200,
            body: "Started by user alice\n".into(),
            ..ApiResponse::default()
        };
        response.headers.insert("x-text-size".into(), "1024".into());
        response.headers.insert("x-more-data".into(), "true".into());
        let recorder = Recorder::new(response);
        let client = JenkinsClient::new(recorder.clone());

        let log = client
            .get_build_log("app", &BuildRef::Number(5), 1000)
            .await
            .unwrap();
        assert_eq!(log.next_start, 1024);
        assert!(log.has_more);
        assert_eq!(recorder.last().path, "/job/app/5/logText/progressiveText");
        assert_eq!(recorder.last().query, vec![("start".to_string(), "1000".to_string())]);
    }

    #[tokio::test]
    async fn empty_names_fail_before_any_request() {
        let recorder = Recorder::new(ok(json!({})));
        let client = JenkinsClient::new(recorder.clone());
        let err = client.get_job("  ").await.unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(err.operation(), Some("get_job"));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deadline_is_attached_to_requests() {
        let recorder = Recorder::new(ok(json!({"items": []})));
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        let client = JenkinsClient::new(recorder.clone()).with_deadline(deadline);
        client.get_queue().await.unwrap();
        assert_eq!(recorder.last().deadline, Some(deadline));
    }
}
