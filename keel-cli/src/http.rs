//! JSON-over-HTTP implementation of [`RemoteGateway`].
//!
//! `ureq` is blocking, so every call runs on tokio's blocking pool.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use keel_core::{ProjectId, WorkflowDefinition};
use keel_patch::ConfigPatch;
use keel_sync::{Page, RemoteError, RemoteGateway, RemoteProject};

const TIMEOUT: Duration = Duration::from_secs(30);

enum Body {
    Empty,
    Json(Value),
    Bytes(Vec<u8>),
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct HttpGateway {
    agent: ureq::Agent,
    endpoint: String,
    token: Option<String>,
}

impl HttpGateway {
    pub fn new(endpoint: &str, token: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(TIMEOUT).build();
        Self {
            agent,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Reads the bearer token from `KEEL_TOKEN` when set.
    pub fn from_env(endpoint: &str) -> Self {
        let token = std::env::var("KEEL_TOKEN").ok().filter(|t| !t.is_empty());
        Self::new(endpoint, token)
    }

    fn project_url(&self, project: &ProjectId, rest: &str) -> String {
        format!(
            "{}/projects/{}/{rest}",
            self.endpoint,
            urlencoding::encode(project.as_str())
        )
    }

    /// Blocking request; returns the response body.
    fn request(&self, method: &str, url: &str, body: Body) -> Result<String, RemoteError> {
        debug!(%method, %url, "remote request");
        let mut request = self.agent.request(method, url);
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        let sent = match body {
            Body::Empty => request.call(),
            Body::Json(value) => request.send_json(value),
            Body::Bytes(bytes) => request
                .set("Content-Type", "application/octet-stream")
                .send_bytes(&bytes),
        };
        match sent {
            Ok(response) => response
                .into_string()
                .map_err(|e| RemoteError::new(format!("failed to read response: {e}"))),
            Err(ureq::Error::Status(code, response)) => {
                let text = response.into_string().unwrap_or_default();
                let message = serde_json::from_str::<ErrorBody>(&text)
                    .map(|body| body.message)
                    .unwrap_or_else(|_| format!("HTTP {code}"));
                Err(RemoteError::new(message))
            }
            Err(ureq::Error::Transport(transport)) => Err(RemoteError::new(transport.to_string())),
        }
    }

    async fn send(&self, method: &'static str, url: String, body: Body) -> Result<String, RemoteError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.request(method, &url, body))
            .await
            .map_err(|e| RemoteError::new(format!("request task failed: {e}")))?
    }

    async fn put_bytes(&self, url: String, content: &[u8]) -> Result<(), RemoteError> {
        self.send("PUT", url, Body::Bytes(content.to_vec()))
            .await
            .map(drop)
    }

    async fn delete(&self, url: String) -> Result<(), RemoteError> {
        self.send("DELETE", url, Body::Empty).await.map(drop)
    }

    async fn put_workflow(
        &self,
        project: &ProjectId,
        workflow: &WorkflowDefinition,
    ) -> Result<(), RemoteError> {
        let url = self.project_url(project, &format!("workflows/{}", encode(&workflow.name)));
        let mut body = workflow.data.clone();
        body.insert("name".to_string(), Value::String(workflow.name.clone()));
        self.send("PUT", url, Body::Json(Value::Object(body)))
            .await
            .map(drop)
    }
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Encodes each `/`-separated segment, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/').map(encode).collect::<Vec<_>>().join("/")
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn apply_config_patch(
        &self,
        project: &ProjectId,
        patch: &ConfigPatch,
    ) -> Result<(), RemoteError> {
        let body = serde_json::to_value(patch)
            .map_err(|e| RemoteError::new(format!("failed to encode patch: {e}")))?;
        self.send("PATCH", self.project_url(project, "config"), Body::Json(body))
            .await
            .map(drop)
    }

    async fn create_migration(
        &self,
        project: &ProjectId,
        file_name: &str,
        content: &[u8],
    ) -> Result<(), RemoteError> {
        let url = self.project_url(project, &format!("migrations/{}", encode(file_name)));
        self.put_bytes(url, content).await
    }

    async fn update_migration(
        &self,
        project: &ProjectId,
        file_name: &str,
        content: &[u8],
    ) -> Result<(), RemoteError> {
        self.create_migration(project, file_name, content).await
    }

    async fn delete_migration(&self, project: &ProjectId, file_name: &str) -> Result<(), RemoteError> {
        self.delete(self.project_url(project, &format!("migrations/{}", encode(file_name))))
            .await
    }

    async fn create_function(&self, project: &ProjectId, name: &str) -> Result<(), RemoteError> {
        let url = self.project_url(project, &format!("functions/{}", encode(name)));
        self.send("PUT", url, Body::Json(json!({ "name": name })))
            .await
            .map(drop)
    }

    async fn delete_function(&self, project: &ProjectId, name: &str) -> Result<(), RemoteError> {
        self.delete(self.project_url(project, &format!("functions/{}", encode(name))))
            .await
    }

    async fn create_function_file(
        &self,
        project: &ProjectId,
        function: &str,
        server_path: &str,
        content: &[u8],
    ) -> Result<(), RemoteError> {
        let url = self.project_url(
            project,
            &format!("functions/{}/files/{}", encode(function), encode_path(server_path)),
        );
        self.put_bytes(url, content).await
    }

    async fn update_function_file(
        &self,
        project: &ProjectId,
        function: &str,
        server_path: &str,
        content: &[u8],
    ) -> Result<(), RemoteError> {
        self.create_function_file(project, function, server_path, content)
            .await
    }

    async fn delete_function_file(
        &self,
        project: &ProjectId,
        function: &str,
        server_path: &str,
    ) -> Result<(), RemoteError> {
        self.delete(self.project_url(
            project,
            &format!("functions/{}/files/{}", encode(function), encode_path(server_path)),
        ))
        .await
    }

    async fn create_workflow(
        &self,
        project: &ProjectId,
        workflow: &WorkflowDefinition,
    ) -> Result<(), RemoteError> {
        self.put_workflow(project, workflow).await
    }

    async fn update_workflow(
        &self,
        project: &ProjectId,
        workflow: &WorkflowDefinition,
    ) -> Result<(), RemoteError> {
        self.put_workflow(project, workflow).await
    }

    async fn delete_workflow(&self, project: &ProjectId, name: &str) -> Result<(), RemoteError> {
        self.delete(self.project_url(project, &format!("workflows/{}", encode(name))))
            .await
    }

    async fn list_projects(&self, cursor: Option<&str>) -> Result<Page<RemoteProject>, RemoteError> {
        let mut url = format!("{}/projects", self.endpoint);
        if let Some(cursor) = cursor {
            url.push_str(&format!("?cursor={}", encode(cursor)));
        }
        let text = self.send("GET", url, Body::Empty).await?;
        serde_json::from_str(&text)
            .map_err(|e| RemoteError::new(format!("malformed project listing: {e}")))
    }
}
