//! Asana REST API access.
//!
//! Commands depend on the capability traits defined here rather than on a concrete
//! client, so the same handler code runs against [`AsanaClient`] in production and
//! against a recording fake in tests.
//!
//! | Trait | Endpoints |
//! |-------|-----------|
//! | [`TaskApi`] | `/tasks`, `/projects/{gid}/tasks`, `/tasks/{gid}/addProject`, `/tasks/{gid}/removeProject` |
//! | [`ProjectApi`] | `/projects`, `/workspaces/{gid}/projects`, `/teams/{gid}/projects` |
//! | [`SectionApi`] | `/projects/{gid}/sections`, `/sections/{gid}` |
//! | [`UserApi`] | `/users/me`, `/workspaces` |

pub mod client;
pub mod models;

pub use client::{API_BASE_URL, AsanaClient};
pub use models::*;

use anyhow::Result;
use std::future::Future;

pub trait TaskApi {
    fn create_task(&self, task: &TaskCreate) -> impl Future<Output = Result<Task>> + Send;

    fn get_task(&self, gid: &str) -> impl Future<Output = Result<Task>> + Send;

    /// `GET /tasks`; Asana requires an assignee together with a workspace.
    fn list_tasks(&self, filter: &TaskFilter) -> impl Future<Output = Result<Vec<Task>>> + Send;

    fn list_project_tasks(
        &self,
        project: &str,
        completed_since: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Task>>> + Send;

    fn update_task(
        &self,
        gid: &str,
        update: &TaskUpdate,
    ) -> impl Future<Output = Result<Task>> + Send;

    fn delete_task(&self, gid: &str) -> impl Future<Output = Result<()>> + Send;

    fn add_project(&self, gid: &str, add: &AddProject) -> impl Future<Output = Result<()>> + Send;

    fn remove_project(&self, gid: &str, project: &str) -> impl Future<Output = Result<()>> + Send;
}

pub trait ProjectApi {
    fn create_project(
        &self,
        project: &ProjectCreate,
    ) -> impl Future<Output = Result<Project>> + Send;

    fn get_project(&self, gid: &str) -> impl Future<Output = Result<Project>> + Send;

    fn list_projects(
        &self,
        scope: &ProjectScope,
        archived: bool,
    ) -> impl Future<Output = Result<Vec<Project>>> + Send;

    fn update_project(
        &self,
        gid: &str,
        update: &ProjectUpdate,
    ) -> impl Future<Output = Result<Project>> + Send;

    fn delete_project(&self, gid: &str) -> impl Future<Output = Result<()>> + Send;
}

pub trait SectionApi {
    fn list_sections(&self, project: &str) -> impl Future<Output = Result<Vec<Section>>> + Send;

    fn create_section(
        &self,
        project: &str,
        section: &SectionCreate,
    ) -> impl Future<Output = Result<Section>> + Send;

    fn update_section(
        &self,
        gid: &str,
        update: &SectionUpdate,
    ) -> impl Future<Output = Result<Section>> + Send;

    fn delete_section(&self, gid: &str) -> impl Future<Output = Result<()>> + Send;
}

pub trait UserApi {
    fn me(&self) -> impl Future<Output = Result<User>> + Send;

    fn list_workspaces(&self) -> impl Future<Output = Result<Vec<Workspace>>> + Send;

    fn get_workspace(&self, gid: &str) -> impl Future<Output = Result<Workspace>> + Send;
}
