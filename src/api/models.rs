//! Asana records and request payloads.
//!
//! Only the fields the CLI reads or writes are modelled. Every optional field is
//! skipped when absent so rendered output never shows `null` placeholders.

use serde::{Deserialize, Serialize};

/// A compact reference to another record (`{ gid, name }`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub gid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub gid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<ResourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<ResourceRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub gid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub gid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub gid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspaces: Option<Vec<ResourceRef>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub gid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_organization: Option<bool>,
}

/// Body of `POST /tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskCreate {
    pub name: String,
    pub workspace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<String>>,
}

/// Body of `PUT /tasks/{gid}`. Only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Filters for `GET /tasks` and `GET /projects/{gid}/tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub assignee: Option<String>,
    pub workspace: Option<String>,
    /// Only tasks incomplete or completed after this point (`now` = incomplete only)
    pub completed_since: Option<String>,
}

/// Body of `POST /tasks/{gid}/addProject`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddProject {
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

/// Body of `POST /projects`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectCreate {
    pub name: String,
    pub workspace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

/// Body of `PUT /projects/{gid}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

impl ProjectUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Where `GET .../projects` looks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectScope {
    Workspace(String),
    Team(String),
}

/// Body of `POST /projects/{gid}/sections`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionCreate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_after: Option<String>,
}

/// Body of `PUT /sections/{gid}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SectionUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_update_serializes_only_set_fields() {
        let update = TaskUpdate {
            due_on: Some("2025-10-30".to_string()),
            completed: Some(false),
            ..TaskUpdate::default()
        };

        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"due_on": "2025-10-30", "completed": false})
        );
        assert!(!update.is_empty());
        assert!(TaskUpdate::default().is_empty());
    }

    #[test]
    fn test_task_ignores_unknown_fields_and_omits_missing() {
        let task: Task = serde_json::from_value(json!({
            "gid": "1",
            "name": "Write docs",
            "resource_type": "task",
            "assignee": {"gid": "2", "name": "Sam", "resource_type": "user"}
        }))
        .unwrap();

        assert_eq!(task.assignee.as_ref().and_then(|a| a.name.as_deref()), Some("Sam"));
        assert_eq!(
            serde_json::to_value(&task).unwrap(),
            json!({"gid": "1", "name": "Write docs", "assignee": {"gid": "2", "name": "Sam"}})
        );
    }

    #[test]
    fn test_project_create_payload() {
        let create = ProjectCreate {
            name: "Launch".to_string(),
            workspace: "9".to_string(),
            public: Some(true),
            ..ProjectCreate::default()
        };

        assert_eq!(
            serde_json::to_value(&create).unwrap(),
            json!({"name": "Launch", "workspace": "9", "public": true})
        );
    }
}
