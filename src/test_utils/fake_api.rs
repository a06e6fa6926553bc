//! In-memory Asana API used by command tests.

use crate::api::*;
use crate::core::AsanaError;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;

/// A single recorded request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiCall {
    /// `"METHOD path"`, e.g. `"PUT /tasks/42"`.
    pub fn route(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Fake implementation of every API capability.
///
/// Records are served from the canned collections; writes echo their payload back
/// as a record so command output can be asserted. When built with
/// [`RecordingApi::failing`], every call is recorded and then fails.
#[derive(Default)]
pub struct RecordingApi {
    calls: Mutex<Vec<ApiCall>>,
    tasks: Vec<Task>,
    projects: Vec<Project>,
    sections: Vec<Section>,
    workspaces: Vec<Workspace>,
    user: Option<User>,
    failure: Option<AsanaError>,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: AsanaError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    #[must_use]
    pub fn with_project(mut self, project: Project) -> Self {
        self.projects.push(project);
        self
    }

    #[must_use]
    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    #[must_use]
    pub fn with_workspace(mut self, workspace: Workspace) -> Self {
        self.workspaces.push(workspace);
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Routes of all recorded calls in order.
    pub fn routes(&self) -> Vec<String> {
        self.calls().iter().map(ApiCall::route).collect()
    }

    /// Body of the most recent call with a body.
    pub fn last_body(&self) -> Option<Value> {
        self.calls().into_iter().rev().find_map(|c| c.body)
    }

    fn record<B: Serialize>(&self, method: &'static str, path: String, body: Option<&B>) -> Result<()> {
        let body = body.and_then(|b| serde_json::to_value(b).ok());
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ApiCall {
                method,
                path,
                body,
            });
        }
        match &self.failure {
            Some(error) => Err(error.clone().into()),
            None => Ok(()),
        }
    }

    fn get(&self, path: String) -> Result<()> {
        self.record::<Value>("GET", path, None)
    }

    fn not_found(kind: &str, gid: &str) -> anyhow::Error {
        AsanaError::Api {
            status: 404,
            message: format!("{kind}: Unknown object: {gid}"),
            help: None,
        }
        .into()
    }

    fn find_task(&self, gid: &str) -> Result<Task> {
        self.tasks
            .iter()
            .find(|t| t.gid == gid)
            .cloned()
            .ok_or_else(|| Self::not_found("task", gid))
    }

    fn find_project(&self, gid: &str) -> Result<Project> {
        self.projects
            .iter()
            .find(|p| p.gid == gid)
            .cloned()
            .ok_or_else(|| Self::not_found("project", gid))
    }
}

fn with_query(path: &str, query: &[(&str, Option<&str>)]) -> String {
    let pairs: Vec<String> = query
        .iter()
        .filter_map(|(key, value)| value.map(|v| format!("{key}={v}")))
        .collect();
    if pairs.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{}", pairs.join("&"))
    }
}

impl TaskApi for RecordingApi {
    async fn create_task(&self, task: &TaskCreate) -> Result<Task> {
        self.record("POST", "/tasks".to_string(), Some(task))?;
        Ok(Task {
            gid: "1000".to_string(),
            name: Some(task.name.clone()),
            completed: Some(false),
            notes: task.notes.clone(),
            due_on: task.due_on.clone(),
            permalink_url: Some("https://app.asana.com/0/0/1000".to_string()),
            ..Task::default()
        })
    }

    async fn get_task(&self, gid: &str) -> Result<Task> {
        self.get(format!("/tasks/{gid}"))?;
        self.find_task(gid)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.get(with_query(
            "/tasks",
            &[
                ("assignee", filter.assignee.as_deref()),
                ("workspace", filter.workspace.as_deref()),
                ("completed_since", filter.completed_since.as_deref()),
            ],
        ))?;
        Ok(self.tasks.clone())
    }

    async fn list_project_tasks(
        &self,
        project: &str,
        completed_since: Option<&str>,
    ) -> Result<Vec<Task>> {
        self.get(with_query(
            &format!("/projects/{project}/tasks"),
            &[("completed_since", completed_since)],
        ))?;
        Ok(self.tasks.clone())
    }

    async fn update_task(&self, gid: &str, update: &TaskUpdate) -> Result<Task> {
        self.record("PUT", format!("/tasks/{gid}"), Some(update))?;
        let mut task = self.find_task(gid)?;
        if let Some(name) = &update.name {
            task.name = Some(name.clone());
        }
        if let Some(notes) = &update.notes {
            task.notes = Some(notes.clone());
        }
        if let Some(due_on) = &update.due_on {
            task.due_on = Some(due_on.clone());
        }
        if let Some(start_on) = &update.start_on {
            task.start_on = Some(start_on.clone());
        }
        if let Some(completed) = update.completed {
            task.completed = Some(completed);
        }
        Ok(task)
    }

    async fn delete_task(&self, gid: &str) -> Result<()> {
        self.record::<Value>("DELETE", format!("/tasks/{gid}"), None)
    }

    async fn add_project(&self, gid: &str, add: &AddProject) -> Result<()> {
        self.record("POST", format!("/tasks/{gid}/addProject"), Some(add))
    }

    async fn remove_project(&self, gid: &str, project: &str) -> Result<()> {
        let body = serde_json::json!({ "project": project });
        self.record("POST", format!("/tasks/{gid}/removeProject"), Some(&body))
    }
}

impl ProjectApi for RecordingApi {
    async fn create_project(&self, project: &ProjectCreate) -> Result<Project> {
        self.record("POST", "/projects".to_string(), Some(project))?;
        Ok(Project {
            gid: "2000".to_string(),
            name: Some(project.name.clone()),
            color: project.color.clone(),
            notes: project.notes.clone(),
            public: project.public,
            archived: Some(false),
            permalink_url: Some("https://app.asana.com/0/2000".to_string()),
        })
    }

    async fn get_project(&self, gid: &str) -> Result<Project> {
        self.get(format!("/projects/{gid}"))?;
        self.find_project(gid)
    }

    async fn list_projects(&self, scope: &ProjectScope, archived: bool) -> Result<Vec<Project>> {
        let path = match scope {
            ProjectScope::Workspace(gid) => format!("/workspaces/{gid}/projects"),
            ProjectScope::Team(gid) => format!("/teams/{gid}/projects"),
        };
        let archived = archived.to_string();
        self.get(with_query(&path, &[("archived", Some(archived.as_str()))]))?;
        Ok(self.projects.clone())
    }

    async fn update_project(&self, gid: &str, update: &ProjectUpdate) -> Result<Project> {
        self.record("PUT", format!("/projects/{gid}"), Some(update))?;
        let mut project = self.find_project(gid)?;
        if let Some(name) = &update.name {
            project.name = Some(name.clone());
        }
        if let Some(notes) = &update.notes {
            project.notes = Some(notes.clone());
        }
        if let Some(color) = &update.color {
            project.color = Some(color.clone());
        }
        if let Some(archived) = update.archived {
            project.archived = Some(archived);
        }
        if let Some(public) = update.public {
            project.public = Some(public);
        }
        Ok(project)
    }

    async fn delete_project(&self, gid: &str) -> Result<()> {
        self.record::<Value>("DELETE", format!("/projects/{gid}"), None)
    }
}

impl SectionApi for RecordingApi {
    async fn list_sections(&self, project: &str) -> Result<Vec<Section>> {
        self.get(format!("/projects/{project}/sections"))?;
        Ok(self.sections.clone())
    }

    async fn create_section(&self, project: &str, section: &SectionCreate) -> Result<Section> {
        self.record("POST", format!("/projects/{project}/sections"), Some(section))?;
        Ok(Section {
            gid: "3000".to_string(),
            name: Some(section.name.clone()),
        })
    }

    async fn update_section(&self, gid: &str, update: &SectionUpdate) -> Result<Section> {
        self.record("PUT", format!("/sections/{gid}"), Some(update))?;
        Ok(Section {
            gid: gid.to_string(),
            name: update.name.clone(),
        })
    }

    async fn delete_section(&self, gid: &str) -> Result<()> {
        self.record::<Value>("DELETE", format!("/sections/{gid}"), None)
    }
}

impl UserApi for RecordingApi {
    async fn me(&self) -> Result<User> {
        self.get("/users/me".to_string())?;
        self.user.clone().ok_or_else(|| {
            AsanaError::Api {
                status: 401,
                message: "Not Authorized".to_string(),
                help: None,
            }
            .into()
        })
    }

    async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        self.get("/workspaces".to_string())?;
        Ok(self.workspaces.clone())
    }

    async fn get_workspace(&self, gid: &str) -> Result<Workspace> {
        self.get(format!("/workspaces/{gid}"))?;
        self.workspaces
            .iter()
            .find(|w| w.gid == gid)
            .cloned()
            .ok_or_else(|| Self::not_found("workspace", gid))
    }
}
