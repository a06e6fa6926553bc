use super::models::*;
use super::{ProjectApi, SectionApi, TaskApi, UserApi};
use crate::core::AsanaError;
use anyhow::{Context, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Production API root.
pub const API_BASE_URL: &str = "https://app.asana.com/api/1.0";

/// Page size for list endpoints.
const LIST_LIMIT: &str = "100";

#[derive(Serialize, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    help: Option<String>,
}

/// Bearer-token HTTP client for the Asana API.
///
/// # Examples
///
/// ```rust,no_run
/// use asana_cli::api::{AsanaClient, UserApi};
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = AsanaClient::new("1/1234:abcd")?;
/// let me = client.me().await?;
/// println!("Logged in as {}", me.name.unwrap_or_default());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AsanaClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl AsanaClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("asana-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: API_BASE_URL.to_string(),
            token: token.into(),
        })
    }

    /// Send requests to another API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        debug!("{method} {url}");
        self.http.request(method, url).bearer_auth(&self.token)
    }

    fn with_body<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> reqwest::RequestBuilder {
        self.request(method, path).json(&DataEnvelope {
            data: body,
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body).into());
        }

        let envelope: DataEnvelope<T> =
            response.json().await.context("Failed to parse Asana API response")?;
        Ok(envelope.data)
    }

    async fn send_discard(&self, request: reqwest::RequestBuilder) -> Result<()> {
        self.send::<serde_json::Value>(request).await.map(|_| ())
    }
}

fn transport_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_connect() || error.is_timeout() {
        AsanaError::Network {
            operation: "Could not connect to Asana API".to_string(),
            reason: error.to_string(),
        }
        .into()
    } else {
        anyhow::Error::new(error).context("Asana API request failed")
    }
}

/// Map an error response to [`AsanaError::Api`], using the first error message in
/// the body when there is one.
fn api_error(status: u16, body: &str) -> AsanaError {
    let first = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.errors.into_iter().next());

    match first {
        Some(error) if !error.message.is_empty() => AsanaError::Api {
            status,
            message: error.message,
            help: error.help,
        },
        _ => AsanaError::Api {
            status,
            message: reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown error")
                .to_string(),
            help: None,
        },
    }
}

impl TaskApi for AsanaClient {
    async fn create_task(&self, task: &TaskCreate) -> Result<Task> {
        self.send(self.with_body(Method::POST, "/tasks", task)).await
    }

    async fn get_task(&self, gid: &str) -> Result<Task> {
        self.send(self.request(Method::GET, &format!("/tasks/{gid}"))).await
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut query = vec![("limit", LIST_LIMIT.to_string())];
        if let Some(assignee) = &filter.assignee {
            query.push(("assignee", assignee.clone()));
        }
        if let Some(workspace) = &filter.workspace {
            query.push(("workspace", workspace.clone()));
        }
        if let Some(since) = &filter.completed_since {
            query.push(("completed_since", since.clone()));
        }
        self.send(self.request(Method::GET, "/tasks").query(&query)).await
    }

    async fn list_project_tasks(
        &self,
        project: &str,
        completed_since: Option<&str>,
    ) -> Result<Vec<Task>> {
        let mut query = vec![("limit", LIST_LIMIT.to_string())];
        if let Some(since) = completed_since {
            query.push(("completed_since", since.to_string()));
        }
        self.send(self.request(Method::GET, &format!("/projects/{project}/tasks")).query(&query))
            .await
    }

    async fn update_task(&self, gid: &str, update: &TaskUpdate) -> Result<Task> {
        self.send(self.with_body(Method::PUT, &format!("/tasks/{gid}"), update)).await
    }

    async fn delete_task(&self, gid: &str) -> Result<()> {
        self.send_discard(self.request(Method::DELETE, &format!("/tasks/{gid}"))).await
    }

    async fn add_project(&self, gid: &str, add: &AddProject) -> Result<()> {
        self.send_discard(self.with_body(Method::POST, &format!("/tasks/{gid}/addProject"), add))
            .await
    }

    async fn remove_project(&self, gid: &str, project: &str) -> Result<()> {
        let body = serde_json::json!({ "project": project });
        self.send_discard(self.with_body(
            Method::POST,
            &format!("/tasks/{gid}/removeProject"),
            &body,
        ))
        .await
    }
}

impl ProjectApi for AsanaClient {
    async fn create_project(&self, project: &ProjectCreate) -> Result<Project> {
        self.send(self.with_body(Method::POST, "/projects", project)).await
    }

    async fn get_project(&self, gid: &str) -> Result<Project> {
        self.send(self.request(Method::GET, &format!("/projects/{gid}"))).await
    }

    async fn list_projects(&self, scope: &ProjectScope, archived: bool) -> Result<Vec<Project>> {
        let path = match scope {
            ProjectScope::Workspace(gid) => format!("/workspaces/{gid}/projects"),
            ProjectScope::Team(gid) => format!("/teams/{gid}/projects"),
        };
        let query = [("limit", LIST_LIMIT.to_string()), ("archived", archived.to_string())];
        self.send(self.request(Method::GET, &path).query(&query)).await
    }

    async fn update_project(&self, gid: &str, update: &ProjectUpdate) -> Result<Project> {
        self.send(self.with_body(Method::PUT, &format!("/projects/{gid}"), update)).await
    }

    async fn delete_project(&self, gid: &str) -> Result<()> {
        self.send_discard(self.request(Method::DELETE, &format!("/projects/{gid}"))).await
    }
}

impl SectionApi for AsanaClient {
    async fn list_sections(&self, project: &str) -> Result<Vec<Section>> {
        self.send(self.request(Method::GET, &format!("/projects/{project}/sections"))).await
    }

    async fn create_section(&self, project: &str, section: &SectionCreate) -> Result<Section> {
        self.send(self.with_body(Method::POST, &format!("/projects/{project}/sections"), section))
            .await
    }

    async fn update_section(&self, gid: &str, update: &SectionUpdate) -> Result<Section> {
        self.send(self.with_body(Method::PUT, &format!("/sections/{gid}"), update)).await
    }

    async fn delete_section(&self, gid: &str) -> Result<()> {
        self.send_discard(self.request(Method::DELETE, &format!("/sections/{gid}"))).await
    }
}

impl UserApi for AsanaClient {
    async fn me(&self) -> Result<User> {
        self.send(self.request(Method::GET, "/users/me")).await
    }

    async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        self.send(self.request(Method::GET, "/workspaces")).await
    }

    async fn get_workspace(&self, gid: &str) -> Result<Workspace> {
        self.send(self.request(Method::GET, &format!("/workspaces/{gid}"))).await
    }
}
