use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::config::DashboardConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{IdentityBackend, ProbeOutcome, ProbeReply, SessionProbe, UserSummary};
use crate::models::{ChecklistItem, Comment, NestedRecord, Project, ProjectStats, Stakeholder, DEFAULT_USER_NAME};
use crate::sync::{CollectionSource, EntityId, NestedSource, ResourceKind};

/// One cookie-carrying `reqwest` client shared by every probe, read and write.
///
/// Session cookies set by any identity backend are replayed on later
/// requests, so the API sees the same ambient credentials the probes did.
#[derive(Clone)]
pub struct HttpClient {
    api_base: Url,
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(api_base: Url, request_timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { api_base, client })
    }

    pub fn from_config(cfg: &DashboardConfig) -> AppResult<Self> {
        Self::new(cfg.api_base.clone(), cfg.request_timeout)
    }

    pub fn api_base(&self) -> &Url { &self.api_base }

    /// `{api_base}/{path}`; the base keeps its own path segment (`/api`).
    pub fn endpoint(&self, path: &str) -> AppResult<Url> {
        let raw = format!("{}/{}", self.api_base.as_str().trim_end_matches('/'), path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|e| AppError::config("bad_url", format!("'{}': {}", raw, e).as_str()))
    }

    async fn send(&self, req: RequestBuilder) -> AppResult<Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(AppError::from_status(status.as_u16(), &error_detail(&body)))
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> AppResult<T> {
        let resp = self.send(req).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> AppResult<T> {
        debug!(target: "projdash::http", method = "GET", url = %url, "request");
        self.send_json(self.client.get(url)).await
    }

    pub async fn probe_session(&self, backend: &IdentityBackend) -> AppResult<ProbeReply> {
        debug!(target: "projdash::http", backend = %backend.name, url = %backend.probe_endpoint, "session probe");
        self.send_json(self.client.get(backend.probe_endpoint.clone())).await
    }

    pub async fn project_stats(&self) -> AppResult<Vec<ProjectStats>> {
        self.get_json(self.endpoint("projects/stats")?).await
    }

    pub async fn checklist(&self, project_id: EntityId) -> AppResult<Vec<ChecklistItem>> {
        self.get_json(self.endpoint(&format!("projects/{}/checklist", project_id))?).await
    }

    pub async fn comments(&self, project_id: EntityId) -> AppResult<Vec<Comment>> {
        self.get_json(self.endpoint(&format!("projects/{}/comments", project_id))?).await
    }

    pub async fn stakeholders(&self, project_id: EntityId) -> AppResult<Vec<Stakeholder>> {
        self.get_json(self.endpoint(&format!("projects/{}/stakeholders", project_id))?).await
    }

    pub async fn nested(&self, kind: ResourceKind, project_id: EntityId) -> AppResult<Vec<NestedRecord>> {
        Ok(match kind {
            ResourceKind::Checklist => self.checklist(project_id).await?.into_iter().map(NestedRecord::Checklist).collect(),
            ResourceKind::Comments => self.comments(project_id).await?.into_iter().map(NestedRecord::Comment).collect(),
            ResourceKind::Stakeholders => self.stakeholders(project_id).await?.into_iter().map(NestedRecord::Stakeholder).collect(),
        })
    }

    pub async fn create_project(&self, project: &Project) -> AppResult<Project> {
        project.validate()?;
        let url = self.endpoint("projects")?;
        debug!(target: "projdash::http", method = "POST", url = %url, "create project");
        self.send_json(self.client.post(url).json(project)).await
    }

    pub async fn update_project(&self, id: EntityId, project: &Project) -> AppResult<Project> {
        project.validate()?;
        let url = self.endpoint(&format!("projects/{}", id))?;
        debug!(target: "projdash::http", method = "PUT", url = %url, "update project");
        self.send_json(self.client.put(url).json(project)).await
    }

    pub async fn delete_project(&self, id: EntityId) -> AppResult<()> {
        let url = self.endpoint(&format!("projects/{}", id))?;
        debug!(target: "projdash::http", method = "DELETE", url = %url, "delete project");
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    pub async fn add_checklist_item(&self, project_id: EntityId, title: &str) -> AppResult<ChecklistItem> {
        if title.trim().is_empty() {
            return Err(AppError::user("blank_title", "checklist item title must not be blank"));
        }
        let url = self.endpoint("checklist")?;
        debug!(target: "projdash::http", method = "POST", url = %url, project_id, "add checklist item");
        let body = json!({"project_id": project_id, "title": title, "completed": false});
        self.send_json(self.client.post(url).json(&body)).await
    }

    /// Set an item's completion flag.
    pub async fn toggle_checklist_item(&self, item_id: EntityId, completed: bool) -> AppResult<()> {
        let url = self.endpoint(&format!("checklist/{}", item_id))?;
        debug!(target: "projdash::http", method = "PATCH", url = %url, completed, "toggle checklist item");
        self.send(self.client.patch(url).query(&[("completed", completed)])).await?;
        Ok(())
    }

    pub async fn add_comment(&self, project_id: EntityId, user_name: Option<&str>, content: &str) -> AppResult<Comment> {
        if content.trim().is_empty() {
            return Err(AppError::user("blank_comment", "comment must not be blank"));
        }
        let url = self.endpoint("comments")?;
        debug!(target: "projdash::http", method = "POST", url = %url, project_id, "add comment");
        let body = json!({
            "project_id": project_id,
            "user_name": user_name.unwrap_or(DEFAULT_USER_NAME),
            "content": content,
        });
        self.send_json(self.client.post(url).json(&body)).await
    }
}

/// Pull `detail` out of a JSON error body; otherwise return the body as-is.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(v) => match v.get("detail") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

impl SessionProbe for HttpClient {
    fn probe<'a>(&'a self, backend: &'a IdentityBackend) -> BoxFuture<'a, ProbeOutcome<UserSummary>> {
        Box::pin(async move {
            match ProbeOutcome::from_result(self.probe_session(backend).await) {
                ProbeOutcome::Ok(reply) => reply.into_outcome(),
                ProbeOutcome::Negative(reason) => ProbeOutcome::Negative(reason),
                ProbeOutcome::Failed(cause) => ProbeOutcome::Failed(cause),
            }
        })
    }
}

impl CollectionSource for HttpClient {
    type Item = ProjectStats;

    fn fetch_collection(&self) -> BoxFuture<'_, AppResult<Vec<ProjectStats>>> {
        Box::pin(self.project_stats())
    }
}

impl NestedSource for HttpClient {
    type Item = NestedRecord;

    fn fetch_nested(&self, kind: ResourceKind, parent: EntityId) -> BoxFuture<'_, AppResult<Vec<NestedRecord>>> {
        Box::pin(self.nested(kind, parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpClient {
        HttpClient::new(Url::parse(base).unwrap(), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn endpoint_keeps_api_prefix() {
        let c = client("http://localhost:8000/api");
        assert_eq!(c.endpoint("projects/stats").unwrap().as_str(), "http://localhost:8000/api/projects/stats");
        let c = client("http://localhost:8000/api/");
        assert_eq!(c.endpoint("/projects/3/checklist").unwrap().as_str(), "http://localhost:8000/api/projects/3/checklist");
    }

    #[test]
    fn detail_extraction() {
        assert_eq!(error_detail(r#"{"detail":"Project not found"}"#), "Project not found");
        assert_eq!(error_detail("plain text"), "plain text");
        assert_eq!(error_detail(r#"{"detail":[{"msg":"x"}]}"#), r#"[{"msg":"x"}]"#);
    }

    #[tokio::test]
    async fn blank_writes_never_leave_the_process() {
        // Nothing listens on port 9; a request would fail as transport, not user input.
        let c = client("http://127.0.0.1:9/api");
        assert_eq!(c.add_checklist_item(1, "  ").await.unwrap_err().code_str(), "blank_title");
        assert_eq!(c.add_comment(1, None, "").await.unwrap_err().code_str(), "blank_comment");
        assert_eq!(c.create_project(&Project::new("")).await.unwrap_err().code_str(), "blank_name");
    }
}
