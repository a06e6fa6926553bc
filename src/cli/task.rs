//! `asana task`: create, list, inspect, update, move, complete and delete tasks.

use super::common::{
    CommandContext, empty_list_message, require_workspace, resolve_workspace, success_line,
    validate_gid, validate_optional_date, validate_optional_gid,
};
use crate::api::{AddProject, TaskApi, TaskCreate, TaskFilter, TaskUpdate};
use crate::auth::Session;
use crate::core::AsanaError;
use crate::output::{OutputContext, Record, format_output};
use anyhow::{Result, bail};
use clap::{ArgAction, Args, Subcommand};
use tracing::debug;

const UPDATE_FIELDS: &str = "--name, --notes, --assignee, --due-on, --start-on, --completed";

#[derive(Args, Debug)]
pub struct TaskCommand {
    #[command(subcommand)]
    command: TaskSubcommand,
}

#[derive(Subcommand, Debug)]
enum TaskSubcommand {
    /// Create a new task
    Create(CreateArgs),
    /// List tasks
    List(ListArgs),
    /// Get task details
    Get {
        /// Task GID
        gid: String,
    },
    /// Update task properties
    Update(UpdateArgs),
    /// Move task to a different project
    Move(MoveArgs),
    /// Mark a task as complete
    Complete {
        /// Task GID
        gid: String,
    },
    /// Delete a task
    Delete {
        /// Task GID
        gid: String,
    },
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// Task name
    #[arg(short, long)]
    name: String,
    /// Task description/notes
    #[arg(short = 'd', long)]
    notes: Option<String>,
    /// Assignee user GID (or "me")
    #[arg(short, long)]
    assignee: Option<String>,
    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    due: Option<String>,
    /// Workspace GID
    #[arg(short, long)]
    workspace: Option<String>,
    /// Project GID
    #[arg(short, long)]
    project: Option<String>,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Filter by assignee (use "me" for current user)
    #[arg(short, long)]
    assignee: Option<String>,
    /// Workspace GID
    #[arg(short, long)]
    workspace: Option<String>,
    /// Project GID
    #[arg(short, long)]
    project: Option<String>,
    /// Include completed tasks
    #[arg(short, long)]
    completed: bool,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    /// Task GID
    gid: String,
    /// Update task name
    #[arg(short, long)]
    name: Option<String>,
    /// Update task description/notes
    #[arg(short = 'd', long)]
    notes: Option<String>,
    /// Update assignee user GID
    #[arg(short, long)]
    assignee: Option<String>,
    /// Update due date (YYYY-MM-DD)
    #[arg(long)]
    due_on: Option<String>,
    /// Update start date (YYYY-MM-DD)
    #[arg(long)]
    start_on: Option<String>,
    /// Mark task as completed or incomplete (true/false)
    #[arg(short, long, action = ArgAction::Set, value_name = "BOOL")]
    completed: Option<bool>,
}

#[derive(Args, Debug)]
struct MoveArgs {
    /// Task GID
    gid: String,
    /// Target project GID
    #[arg(short, long)]
    project: String,
    /// Target section GID
    #[arg(short, long)]
    section: Option<String>,
}

impl UpdateArgs {
    fn payload(&self) -> TaskUpdate {
        TaskUpdate {
            name: self.name.clone(),
            notes: self.notes.clone(),
            assignee: self.assignee.clone(),
            due_on: self.due_on.clone(),
            start_on: self.start_on.clone(),
            completed: self.completed,
        }
    }
}

impl TaskCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        self.validate()?;
        let session = Session::establish(&ctx.store).await?;
        let output = self.run(session.client(), session.default_workspace(), &ctx.output).await?;
        println!("{output}");
        Ok(())
    }

    /// Checks that need no network access.
    fn validate(&self) -> Result<(), AsanaError> {
        match &self.command {
            TaskSubcommand::Create(args) => {
                validate_optional_gid(args.workspace.as_deref(), "workspace GID")?;
                validate_optional_gid(args.project.as_deref(), "project GID")?;
                validate_optional_date(args.due.as_deref(), "due date")
            }
            TaskSubcommand::List(args) => {
                validate_optional_gid(args.workspace.as_deref(), "workspace GID")?;
                validate_optional_gid(args.project.as_deref(), "project GID")
            }
            TaskSubcommand::Get {
                gid,
            }
            | TaskSubcommand::Complete {
                gid,
            }
            | TaskSubcommand::Delete {
                gid,
            } => validate_gid(gid, "task GID"),
            TaskSubcommand::Update(args) => {
                validate_gid(&args.gid, "task GID")?;
                validate_optional_date(args.due_on.as_deref(), "due date")?;
                validate_optional_date(args.start_on.as_deref(), "start date")?;
                if args.payload().is_empty() {
                    return Err(AsanaError::NoUpdateFields {
                        available: UPDATE_FIELDS.to_string(),
                    });
                }
                Ok(())
            }
            TaskSubcommand::Move(args) => {
                validate_gid(&args.gid, "task GID")?;
                validate_gid(&args.project, "project GID")?;
                validate_optional_gid(args.section.as_deref(), "section GID")
            }
        }
    }

    /// Run against `api` and return the text to print.
    pub async fn run<A: TaskApi>(
        self,
        api: &A,
        default_workspace: Option<&str>,
        output: &OutputContext,
    ) -> Result<String> {
        self.validate()?;

        match self.command {
            TaskSubcommand::Create(args) => {
                let workspace = require_workspace(args.workspace.as_deref(), default_workspace)?;
                let payload = TaskCreate {
                    name: args.name,
                    workspace,
                    notes: args.notes,
                    assignee: args.assignee,
                    due_on: args.due,
                    projects: args.project.map(|p| vec![p]),
                };

                let task = api.create_task(&payload).await?;
                let record = Record::new()
                    .field("status", "success")
                    .field("gid", task.gid)
                    .maybe("name", task.name)
                    .maybe("permalink_url", task.permalink_url);
                format_output(&record.wrap("task"), output)
            }

            TaskSubcommand::List(args) => {
                // Asana returns only incomplete tasks for `completed_since=now`; `-c` drops
                // the filter so completed tasks are listed too.
                let completed_since = (!args.completed).then(|| "now".to_string());
                let workspace = resolve_workspace(args.workspace.as_deref(), default_workspace);

                let tasks = if let Some(project) = &args.project {
                    api.list_project_tasks(project, completed_since.as_deref()).await?
                } else if args.assignee.is_some() || workspace.is_some() {
                    let filter = TaskFilter {
                        assignee: args.assignee.or_else(|| Some("me".to_string())),
                        workspace,
                        completed_since,
                    };
                    debug!("Listing tasks with {filter:?}");
                    api.list_tasks(&filter).await?
                } else {
                    bail!("Specify workspace, project, or assignee to list tasks");
                };

                if tasks.is_empty() {
                    return Ok(empty_list_message("tasks"));
                }
                format_output(&Record::new().serialized("tasks", &tasks)?.into_value(), output)
            }

            TaskSubcommand::Get {
                gid,
            } => {
                let task = api.get_task(&gid).await?;
                let record = Record::new()
                    .field("gid", task.gid)
                    .maybe("name", task.name)
                    .maybe("completed", task.completed)
                    .maybe("assignee", task.assignee.and_then(|a| a.name))
                    .maybe("due_on", task.due_on)
                    .maybe("notes", task.notes)
                    .maybe("permalink_url", task.permalink_url);
                format_output(&record.wrap("task"), output)
            }

            TaskSubcommand::Update(args) => {
                let task = api.update_task(&args.gid, &args.payload()).await?;
                let record = Record::new()
                    .field("status", "success")
                    .field("gid", task.gid)
                    .maybe("name", task.name)
                    .maybe("completed", task.completed)
                    .maybe("assignee", task.assignee.and_then(|a| a.name))
                    .maybe("due_on", task.due_on)
                    .maybe("start_on", task.start_on)
                    .maybe("permalink_url", task.permalink_url);
                format_output(&record.wrap("task"), output)
            }

            TaskSubcommand::Move(args) => {
                let current = api.get_task(&args.gid).await?;
                for project in current.projects.unwrap_or_default() {
                    debug!("Removing task {} from project {}", args.gid, project.gid);
                    api.remove_project(&args.gid, &project.gid).await?;
                }

                api.add_project(
                    &args.gid,
                    &AddProject {
                        project: args.project.clone(),
                        section: args.section.clone(),
                    },
                )
                .await?;

                let moved = api.get_task(&args.gid).await?;
                let record = Record::new()
                    .field("status", "success")
                    .field("gid", moved.gid)
                    .maybe("name", moved.name)
                    .field("project", args.project)
                    .maybe("section", args.section)
                    .maybe("permalink_url", moved.permalink_url);
                format_output(&record.wrap("task"), output)
            }

            TaskSubcommand::Complete {
                gid,
            } => {
                let update = TaskUpdate {
                    completed: Some(true),
                    ..TaskUpdate::default()
                };
                api.update_task(&gid, &update).await?;
                Ok(success_line(&format!("Task {gid} marked as complete")))
            }

            TaskSubcommand::Delete {
                gid,
            } => {
                api.delete_task(&gid).await?;
                Ok(success_line(&format!("Task {gid} deleted")))
            }
        }
    }
}
