//! `asana project`: manage projects in a workspace or team.

use super::common::{
    CommandContext, empty_list_message, require_workspace, resolve_workspace, success_line,
    validate_gid, validate_optional_gid,
};
use crate::api::{ProjectApi, ProjectCreate, ProjectScope, ProjectUpdate};
use crate::auth::Session;
use crate::core::AsanaError;
use crate::output::{OutputContext, Record, format_output};
use anyhow::Result;
use clap::{ArgAction, Args, Subcommand};

const UPDATE_FIELDS: &str = "--name, --notes, --color, --archived, --public";

#[derive(Args, Debug)]
pub struct ProjectCommand {
    #[command(subcommand)]
    command: ProjectSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProjectSubcommand {
    /// Create a new project
    Create {
        /// Project name
        #[arg(short, long)]
        name: String,
        /// Workspace GID
        #[arg(short, long)]
        workspace: Option<String>,
        /// Team GID
        #[arg(short, long)]
        team: Option<String>,
        /// Project notes/description
        #[arg(short = 'd', long)]
        notes: Option<String>,
        /// Project color
        #[arg(long)]
        color: Option<String>,
        /// Make project public to workspace
        #[arg(long)]
        public: bool,
    },
    /// List projects
    List {
        /// Workspace GID
        #[arg(short, long)]
        workspace: Option<String>,
        /// Team GID
        #[arg(short, long)]
        team: Option<String>,
        /// Include archived projects
        #[arg(short, long)]
        archived: bool,
    },
    /// Get project details
    Get {
        /// Project GID
        gid: String,
    },
    /// Update project properties
    Update {
        /// Project GID
        gid: String,
        /// Update project name
        #[arg(short, long)]
        name: Option<String>,
        /// Update project notes/description
        #[arg(short = 'd', long)]
        notes: Option<String>,
        /// Update project color
        #[arg(long)]
        color: Option<String>,
        /// Archive or unarchive project (true/false)
        #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
        archived: Option<bool>,
        /// Make project public or private (true/false)
        #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
        public: Option<bool>,
    },
    /// Delete a project
    Delete {
        /// Project GID
        gid: String,
    },
}

impl ProjectCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        self.validate()?;
        let session = Session::establish(&ctx.store).await?;
        let output = self.run(session.client(), session.default_workspace(), &ctx.output).await?;
        println!("{output}");
        Ok(())
    }

    fn validate(&self) -> Result<(), AsanaError> {
        match &self.command {
            ProjectSubcommand::Create {
                workspace,
                team,
                ..
            }
            | ProjectSubcommand::List {
                workspace,
                team,
                ..
            } => {
                validate_optional_gid(workspace.as_deref(), "workspace GID")?;
                validate_optional_gid(team.as_deref(), "team GID")
            }
            ProjectSubcommand::Get {
                gid,
            }
            | ProjectSubcommand::Delete {
                gid,
            } => validate_gid(gid, "project GID"),
            ProjectSubcommand::Update {
                gid,
                name,
                notes,
                color,
                archived,
                public,
            } => {
                validate_gid(gid, "project GID")?;
                let nothing_to_update = name.is_none()
                    && notes.is_none()
                    && color.is_none()
                    && archived.is_none()
                    && public.is_none();
                if nothing_to_update {
                    return Err(AsanaError::NoUpdateFields {
                        available: UPDATE_FIELDS.to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    pub async fn run<A: ProjectApi>(
        self,
        api: &A,
        default_workspace: Option<&str>,
        output: &OutputContext,
    ) -> Result<String> {
        self.validate()?;

        match self.command {
            ProjectSubcommand::Create {
                name,
                workspace,
                team,
                notes,
                color,
                public,
            } => {
                let workspace = require_workspace(workspace.as_deref(), default_workspace)?;
                let payload = ProjectCreate {
                    name,
                    workspace,
                    team,
                    notes,
                    color,
                    public: public.then_some(true),
                };

                let project = api.create_project(&payload).await?;
                let record = Record::new()
                    .field("status", "success")
                    .field("gid", project.gid)
                    .maybe("name", project.name)
                    .maybe("permalink_url", project.permalink_url);
                format_output(&record.wrap("project"), output)
            }

            ProjectSubcommand::List {
                workspace,
                team,
                archived,
            } => {
                let scope = match (team, resolve_workspace(workspace.as_deref(), default_workspace))
                {
                    (Some(team), _) => ProjectScope::Team(team),
                    (None, Some(workspace)) => ProjectScope::Workspace(workspace),
                    (None, None) => {
                        return Err(AsanaError::Config {
                            message: "Workspace or team is required. Set default workspace or use -w/-t option.".to_string(),
                        }
                        .into());
                    }
                };

                let projects = api.list_projects(&scope, archived).await?;
                if projects.is_empty() {
                    return Ok(empty_list_message("projects"));
                }
                format_output(&Record::new().serialized("projects", &projects)?.into_value(), output)
            }

            ProjectSubcommand::Get {
                gid,
            } => {
                let project = api.get_project(&gid).await?;
                let record = Record::new()
                    .field("gid", project.gid)
                    .maybe("name", project.name)
                    .maybe("archived", project.archived)
                    .maybe("color", project.color)
                    .maybe("notes", project.notes)
                    .maybe("public", project.public)
                    .maybe("permalink_url", project.permalink_url);
                format_output(&record.wrap("project"), output)
            }

            ProjectSubcommand::Update {
                gid,
                name,
                notes,
                color,
                archived,
                public,
            } => {
                let update = ProjectUpdate {
                    name,
                    notes,
                    color,
                    archived,
                    public,
                };
                let project = api.update_project(&gid, &update).await?;
                let record = Record::new()
                    .field("status", "success")
                    .field("gid", project.gid)
                    .maybe("name", project.name)
                    .maybe("archived", project.archived)
                    .maybe("color", project.color)
                    .maybe("public", project.public)
                    .maybe("permalink_url", project.permalink_url);
                format_output(&record.wrap("project"), output)
            }

            ProjectSubcommand::Delete {
                gid,
            } => {
                api.delete_project(&gid).await?;
                Ok(success_line(&format!("Project {gid} deleted")))
            }
        }
    }
}
