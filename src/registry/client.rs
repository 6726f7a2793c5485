//! Vertex AI REST client for notebook runtime templates.
//!
//! Creation and deletion return long-running operations; both are polled
//! to completion before the call returns, so a successful `create` means
//! the template exists remotely.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::config::RegistryConfig;
use crate::error::{DeployError, RegistryError, Result};
use crate::template::LocalTemplate;

use super::store::TemplateRegistry;
use super::types::{ListTemplatesResponse, Operation, RemoteTemplate};

/// Page size requested when listing templates.
const PAGE_SIZE: u32 = 100;

/// Maximum number of attempts for a single request.
const MAX_RETRIES: u32 = 3;

/// Base delay between retries, scaled linearly by attempt.
const RETRY_DELAY_MS: u64 = 1000;

/// Upper bound on a server-requested retry delay.
const MAX_RETRY_AFTER_SECS: u64 = 30;

/// Delay between operation polls.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Polls before an operation is considered stuck.
const DEFAULT_MAX_POLLS: u32 = 300;

/// Collection id of the template resource.
const COLLECTION: &str = "notebookRuntimeTemplates";

/// REST client for the template registry.
#[derive(Debug, Clone)]
pub struct VertexClient {
    /// HTTP client.
    client: Client,
    /// API base URL without trailing slash.
    endpoint: String,
    /// `projects/{p}/locations/{l}`.
    parent: String,
    /// OAuth bearer token.
    token: String,
    /// Delay between operation polls.
    poll_interval: Duration,
    /// Maximum number of operation polls.
    max_polls: u32,
    /// Base retry delay.
    retry_delay: Duration,
}

/// A single REST call.
struct Call<'a> {
    method: Method,
    url: String,
    /// Resource named in `NotFound` errors.
    resource: &'a str,
    query: Vec<(&'static str, String)>,
    body: Option<&'a Value>,
}

impl<'a> Call<'a> {
    fn new(method: Method, url: String, resource: &'a str) -> Self {
        Self {
            method,
            url,
            resource,
            query: Vec::new(),
            body: None,
        }
    }

    /// GET and DELETE can be replayed safely after a network failure.
    fn is_idempotent(&self) -> bool {
        self.method == Method::GET || self.method == Method::DELETE
    }

    /// A rate-limited call was never processed, so any method may be resent.
    fn may_retry(&self, error: &DeployError) -> bool {
        error.is_retryable() && (error.is_rate_limited() || self.is_idempotent())
    }
}

impl VertexClient {
    /// Creates a new registry client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &RegistryConfig, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RegistryError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            parent: config.parent(),
            token: token.into(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_polls: DEFAULT_MAX_POLLS,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    /// Sets the delay between operation polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the maximum number of operation polls.
    #[must_use]
    pub const fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    /// Sets the base delay between retries.
    #[must_use]
    pub const fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Returns the parent the client operates under.
    #[must_use]
    pub fn parent(&self) -> &str {
        &self.parent
    }

    fn collection_url(&self) -> String {
        format!("{}/{}/{COLLECTION}", self.endpoint, self.parent)
    }

    fn resource_url(&self, name: &str) -> String {
        format!("{}/{}", self.endpoint, name.trim_start_matches('/'))
    }

    /// Executes a call, retrying when it is safe to do so.
    async fn execute<T: DeserializeOwned>(&self, call: &Call<'_>) -> Result<T> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.send_once::<T>(call).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < MAX_RETRIES && call.may_retry(&e) => {
                    let delay = e.retry_delay_secs().map_or(self.retry_delay * attempt, |secs| {
                        Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS))
                    });
                    warn!(
                        "{} {} failed (attempt {attempt}/{MAX_RETRIES}), retrying in {delay:?}: {e}",
                        call.method, call.url
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sends a single request and decodes the response.
    async fn send_once<T: DeserializeOwned>(&self, call: &Call<'_>) -> Result<T> {
        trace!("{} {}", call.method, call.url);

        let mut request = self
            .client
            .request(call.method.clone(), &call.url)
            .bearer_auth(&self.token);
        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        if let Some(body) = call.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::network(format!("Request failed: {e}")))?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();

            return Err(DeployError::Registry(RegistryError::RateLimited {
                retry_after_secs: retry_after,
            }));
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(DeployError::Registry(RegistryError::AuthenticationFailed {
                message: format!("{status}: {}", error_message(&body)),
            }));
        }

        if status.as_u16() == 404 {
            return Err(DeployError::Registry(RegistryError::NotFound {
                name: call.resource.to_string(),
            }));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeployError::Registry(RegistryError::api_error(
                status.as_u16(),
                error_message(&body),
            )));
        }

        response.json().await.map_err(|e| {
            DeployError::Registry(RegistryError::invalid_response(format!(
                "Failed to parse response: {e}"
            )))
        })
    }

    /// Polls an operation until it is done.
    async fn wait_for_operation(&self, mut operation: Operation) -> Result<Operation> {
        let name = operation.name.clone();
        let mut polls = 0;

        while !operation.done {
            if polls >= self.max_polls {
                return Err(DeployError::Registry(RegistryError::OperationTimeout {
                    operation: name,
                }));
            }
            polls += 1;
            tokio::time::sleep(self.poll_interval).await;

            trace!("Polling operation {name} ({polls}/{})", self.max_polls);
            let call = Call::new(Method::GET, self.resource_url(&name), &name);
            operation = match self.execute(&call).await {
                Ok(operation) => operation,
                // Must not read as a 404 on the resource the operation acts on.
                Err(DeployError::Registry(RegistryError::NotFound { .. })) => {
                    return Err(DeployError::Registry(RegistryError::OperationLost {
                        operation: name,
                    }));
                }
                Err(e) => return Err(e),
            };
        }

        if let Some(status) = operation.error {
            return Err(DeployError::Registry(RegistryError::OperationFailed {
                operation: name,
                code: status.code,
                message: status.message,
            }));
        }

        debug!("Operation {name} done after {polls} poll(s)");
        Ok(operation)
    }

    /// Lists all templates under the parent, following pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if any page cannot be fetched.
    pub async fn list_templates(&self) -> Result<Vec<RemoteTemplate>> {
        let mut templates = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut call = Call::new(Method::GET, self.collection_url(), &self.parent);
            call.query.push(("pageSize", PAGE_SIZE.to_string()));
            if let Some(token) = page_token.take() {
                call.query.push(("pageToken", token));
            }

            let page: ListTemplatesResponse = self.execute(&call).await?;
            templates.extend(page.notebook_runtime_templates);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Listed {} template(s) under {}", templates.len(), self.parent);
        Ok(templates)
    }

    /// Gets a template by resource name.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is not found or the call fails.
    pub async fn get_template(&self, resource_name: &str) -> Result<RemoteTemplate> {
        let call = Call::new(Method::GET, self.resource_url(resource_name), resource_name);
        self.execute(&call).await
    }

    /// Creates a template and waits for the operation to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the operation fails.
    pub async fn create_template(&self, template: &LocalTemplate) -> Result<RemoteTemplate> {
        let body = template.payload();
        let mut call = Call::new(
            Method::POST,
            self.collection_url(),
            &template.display_name,
        );
        call.body = Some(&body);

        let operation: Operation = self.execute(&call).await?;
        let operation = self.wait_for_operation(operation).await?;

        let response = operation.response.ok_or_else(|| {
            RegistryError::invalid_response(format!(
                "Operation {} finished without a response",
                operation.name
            ))
        })?;

        let created: RemoteTemplate = serde_json::from_value(response).map_err(|e| {
            RegistryError::invalid_response(format!("Failed to parse created template: {e}"))
        })?;

        info!(
            "Created template '{}' as {}",
            created.display_name, created.resource_name
        );
        Ok(created)
    }

    /// Deletes a template and waits for the operation to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the operation fails.
    pub async fn delete_template(&self, resource_name: &str) -> Result<()> {
        let call = Call::new(
            Method::DELETE,
            self.resource_url(resource_name),
            resource_name,
        );

        let operation: Operation = self.execute(&call).await?;
        self.wait_for_operation(operation).await?;

        info!("Deleted template {resource_name}");
        Ok(())
    }
}

/// Extracts `error.message` from a Google API error body, or returns the body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl TemplateRegistry for VertexClient {
    async fn list(&self) -> Result<Vec<RemoteTemplate>> {
        self.list_templates().await
    }

    async fn get(&self, resource_name: &str) -> Result<RemoteTemplate> {
        self.get_template(resource_name).await
    }

    async fn create(&self, template: &LocalTemplate) -> Result<RemoteTemplate> {
        self.create_template(template).await
    }

    async fn delete(&self, resource_name: &str) -> Result<()> {
        self.delete_template(resource_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEMPLATES_PATH: &str = "/projects/p/locations/l/notebookRuntimeTemplates";

    fn client(server: &MockServer) -> VertexClient {
        let config = RegistryConfig::new("p", "l").with_endpoint(Some(server.uri()));
        VertexClient::new(&config, "tok")
            .expect("client")
            .with_poll_interval(Duration::ZERO)
            .with_retry_delay(Duration::ZERO)
            .with_max_polls(3)
    }

    fn local(name: &str) -> LocalTemplate {
        let mut template = LocalTemplate::from_document(
            format!("{name}.yaml"),
            "fp1",
            json!({ "displayName": name, "machineSpec": { "machineType": "n1-standard-4" } }),
        )
        .expect("valid template");
        template
            .labels
            .insert(String::from("fingerprint"), String::from("fp1"));
        template
    }

    #[tokio::test]
    async fn test_list_follows_pagination() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TEMPLATES_PATH))
            .and(query_param("pageToken", "t2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "notebookRuntimeTemplates": [{ "name": "r-2", "displayName": "b" }]
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(TEMPLATES_PATH))
            .and(query_param("pageSize", "100"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "notebookRuntimeTemplates": [{ "name": "r-1", "displayName": "a" }],
                "nextPageToken": "t2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let templates = client(&server).list().await.expect("list");
        let names: Vec<_> = templates.iter().map(|t| t.display_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_list_empty_registry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TEMPLATES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        assert!(client(&server).list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_create_polls_operation() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TEMPLATES_PATH))
            .and(body_partial_json(json!({
                "displayName": "gpu",
                "labels": { "fingerprint": "fp1" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/p/locations/l/operations/7",
                "done": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/projects/p/locations/l/operations/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/p/locations/l/operations/7",
                "done": true,
                "response": {
                    "@type": "type.googleapis.com/google.cloud.aiplatform.v1beta1.NotebookRuntimeTemplate",
                    "name": "projects/p/locations/l/notebookRuntimeTemplates/42",
                    "displayName": "gpu",
                    "labels": { "fingerprint": "fp1" }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let created = client(&server).create(&local("gpu")).await.expect("create");
        assert_eq!(created.short_id(), "42");
        assert_eq!(created.fingerprint(), Some("fp1"));
    }

    #[tokio::test]
    async fn test_create_operation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TEMPLATES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/p/locations/l/operations/8",
                "done": true,
                "error": { "code": 3, "message": "invalid machine type" }
            })))
            .mount(&server)
            .await;

        let result = client(&server).create(&local("gpu")).await;
        assert!(matches!(
            result,
            Err(DeployError::Registry(RegistryError::OperationFailed { code: 3, .. }))
        ));
    }

    #[tokio::test]
    async fn test_create_is_not_retried_on_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TEMPLATES_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": { "code": 500, "message": "backend error" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server).create(&local("gpu")).await;
        match result {
            Err(DeployError::Registry(RegistryError::ApiRequestFailed { status, message })) => {
                assert_eq!(status, 500);
                assert_eq!(message, "backend error");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_waits_for_operation() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/projects/p/locations/l/notebookRuntimeTemplates/r-old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/p/locations/l/operations/9",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .delete("projects/p/locations/l/notebookRuntimeTemplates/r-old")
            .await
            .expect("delete");
    }

    #[tokio::test]
    async fn test_operation_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/p/locations/l/operations/10"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/projects/p/locations/l/operations/10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/p/locations/l/operations/10",
                "done": false
            })))
            .expect(3)
            .mount(&server)
            .await;

        let result = client(&server).delete("projects/p/locations/l/x").await;
        assert!(matches!(
            result,
            Err(DeployError::Registry(RegistryError::OperationTimeout { .. }))
        ));
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client(&server).get("projects/p/locations/l/notebookRuntimeTemplates/x").await;
        match result {
            Err(DeployError::Registry(RegistryError::NotFound { name })) => {
                assert_eq!(name, "projects/p/locations/l/notebookRuntimeTemplates/x");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "code": 401, "message": "token expired" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server).list().await;
        match result {
            Err(DeployError::Registry(RegistryError::AuthenticationFailed { message })) => {
                assert!(message.contains("token expired"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TEMPLATES_PATH))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(TEMPLATES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "notebookRuntimeTemplates": [{ "name": "r-1", "displayName": "a" }]
            })))
            .mount(&server)
            .await;

        let templates = client(&server).list().await.expect("list after retry");
        assert_eq!(templates.len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_create_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TEMPLATES_PATH))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(TEMPLATES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/p/locations/l/operations/11",
                "done": true,
                "response": { "name": "projects/p/locations/l/notebookRuntimeTemplates/43", "displayName": "gpu" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let created = client(&server).create(&local("gpu")).await.expect("create after retry");
        assert_eq!(created.short_id(), "43");
    }

    #[tokio::test]
    async fn test_vanished_operation_is_not_a_missing_resource() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/p/locations/l/operations/12",
                "done": false
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/projects/p/locations/l/operations/12"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client(&server).delete("r-old").await;
        match result {
            Err(DeployError::Registry(RegistryError::OperationLost { operation })) => {
                assert_eq!(operation, "projects/p/locations/l/operations/12");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unconfirmed_delete_is_reported_as_failure() {
        use crate::config::{DeploymentStamp, Provenance};
        use crate::planner::{PlanExecutor, ReconciliationPlan, UnitStage};
        use crate::registry::RemoteSnapshot;
        use std::sync::Arc;

        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(TEMPLATES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/p/locations/l/operations/1",
                "done": true,
                "response": { "name": "projects/p/locations/l/notebookRuntimeTemplates/new", "displayName": "A" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/r-old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/p/locations/l/operations/2",
                "done": false
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/projects/p/locations/l/operations/2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let stale: RemoteTemplate = serde_json::from_value(json!({
            "name": "r-old",
            "displayName": "A",
            "labels": { "fingerprint": "fp0" }
        }))
        .expect("remote template");
        let snapshot = RemoteSnapshot::from_templates(vec![stale]);
        let plan = ReconciliationPlan::build(vec![local("A")], &snapshot);

        let registry: Arc<dyn TemplateRegistry> = Arc::new(client(&server));
        let stamp = DeploymentStamp::now(Provenance::default());
        let result = PlanExecutor::new(registry, stamp).execute(plan).await;

        assert_eq!(result.replaced(), 0);
        assert_eq!(result.deployed(), 1);
        assert!(!result.is_success());
        let failures = result.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, UnitStage::Delete);
        assert_eq!(failures[0].resource.as_deref(), Some("r-old"));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error":{"code":400,"message":"bad"}}"#),
            "bad"
        );
        assert_eq!(error_message(" plain text \n"), "plain text");
    }
}
