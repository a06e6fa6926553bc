//! `asana section`: manage sections within a project.

use super::common::{
    CommandContext, empty_list_message, success_line, validate_gid, validate_optional_gid,
};
use crate::api::{SectionApi, SectionCreate, SectionUpdate};
use crate::auth::Session;
use crate::core::AsanaError;
use crate::output::{OutputContext, Record, format_output};
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Args, Debug)]
pub struct SectionCommand {
    #[command(subcommand)]
    command: SectionSubcommand,
}

#[derive(Subcommand, Debug)]
enum SectionSubcommand {
    /// List sections in a project
    List {
        /// Project GID
        project: String,
    },
    /// Create a new section in a project
    Create {
        /// Project GID
        project: String,
        /// Section name
        #[arg(short, long)]
        name: String,
        /// Insert before this section
        #[arg(long, value_name = "SECTION_GID")]
        insert_before: Option<String>,
        /// Insert after this section
        #[arg(long, value_name = "SECTION_GID")]
        insert_after: Option<String>,
    },
    /// Rename a section
    Update {
        /// Section GID
        section: String,
        /// Update section name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Delete a section
    Delete {
        /// Section GID
        section: String,
    },
}

impl SectionCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        self.validate()?;
        let session = Session::establish(&ctx.store).await?;
        let output = self.run(session.client(), &ctx.output).await?;
        println!("{output}");
        Ok(())
    }

    fn validate(&self) -> Result<(), AsanaError> {
        match &self.command {
            SectionSubcommand::List {
                project,
            } => validate_gid(project, "project GID"),
            SectionSubcommand::Create {
                project,
                insert_before,
                insert_after,
                ..
            } => {
                validate_gid(project, "project GID")?;
                validate_optional_gid(insert_before.as_deref(), "insert-before section GID")?;
                validate_optional_gid(insert_after.as_deref(), "insert-after section GID")
            }
            SectionSubcommand::Update {
                section,
                name,
            } => {
                validate_gid(section, "section GID")?;
                if name.is_none() {
                    return Err(AsanaError::NoUpdateFields {
                        available: "--name".to_string(),
                    });
                }
                Ok(())
            }
            SectionSubcommand::Delete {
                section,
            } => validate_gid(section, "section GID"),
        }
    }

    pub async fn run<A: SectionApi>(self, api: &A, output: &OutputContext) -> Result<String> {
        self.validate()?;

        match self.command {
            SectionSubcommand::List {
                project,
            } => {
                let sections = api.list_sections(&project).await?;
                if sections.is_empty() {
                    return Ok(empty_list_message("sections"));
                }
                format_output(&Record::new().serialized("sections", &sections)?.into_value(), output)
            }

            SectionSubcommand::Create {
                project,
                name,
                insert_before,
                insert_after,
            } => {
                let payload = SectionCreate {
                    name,
                    insert_before,
                    insert_after,
                };
                let section = api.create_section(&project, &payload).await?;
                let record = Record::new()
                    .field("status", "success")
                    .field("gid", section.gid)
                    .maybe("name", section.name)
                    .field("project", project);
                format_output(&record.wrap("section"), output)
            }

            SectionSubcommand::Update {
                section,
                name,
            } => {
                let update = SectionUpdate {
                    name,
                };
                let updated = api.update_section(&section, &update).await?;
                let record = Record::new()
                    .field("status", "success")
                    .field("gid", updated.gid)
                    .maybe("name", updated.name);
                format_output(&record.wrap("section"), output)
            }

            SectionSubcommand::Delete {
                section,
            } => {
                api.delete_section(&section).await?;
                Ok(success_line(&format!("Section {section} deleted")))
            }
        }
    }
}
