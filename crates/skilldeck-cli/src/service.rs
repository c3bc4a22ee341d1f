use crate::args::{Commands, SummaryFormat};
use crate::config::Config;
use anyhow::{bail, Context, Result};
use skilldeck_skills::prelude::*;
use skilldeck_skills::{DiscoveryReport, ToolArguments};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Orchestrates one CLI invocation over a single skills session
pub struct SkillDeckService {
    controller: Arc<ActivationController>,
    tools: Arc<InMemoryToolTable>,
    session: String,
    report: DiscoveryReport,
}

impl SkillDeckService {
    /// Discover skills from the configured (or overridden) directories and open a session
    pub fn start(config: &Config, skills_dirs: Vec<PathBuf>) -> Result<Self> {
        let directories = if skills_dirs.is_empty() {
            config.skills.expanded_directories()
        } else {
            skills_dirs
        };

        let loader = directories
            .into_iter()
            .fold(SkillLoader::new(), SkillLoader::add_directory);
        let report = loader.discover();
        if !report.warnings.is_empty() {
            warn!("{} skill directories were skipped", report.warnings.len());
        }

        let controller = Arc::new(ActivationController::from_config(
            Arc::new(loader),
            &config.skills,
        ));
        let tools = Arc::new(InMemoryToolTable::new());
        let session = uuid::Uuid::new_v4().to_string();
        controller.open_session(&session, tools.clone())?;
        debug!("Session {} opened with {} skills", session, report.catalog.len());

        Ok(Self {
            controller,
            tools,
            session,
            report,
        })
    }

    /// Run a subcommand and return what should be printed
    pub async fn execute(&self, command: Commands) -> Result<String> {
        match command {
            Commands::List => Ok(self.list()),
            Commands::Summary { format } => {
                let summary = self.controller.catalog_summary();
                Ok(match format {
                    SummaryFormat::Prompt => summary.to_prompt(),
                    SummaryFormat::Xml => summary.to_xml(),
                    SummaryFormat::Json => summary.to_json()?,
                })
            }
            Commands::Suggest { query } => Ok(self.suggest(&query)),
            Commands::Info { name, activate } => {
                if activate {
                    self.controller.activate(&self.session, &name).await?;
                }
                Ok(self.controller.skill_info(&self.session, &name)?)
            }
            Commands::Auto { query } => {
                let activation = self
                    .controller
                    .activate_for_query(&self.session, &query)
                    .await?;
                Ok(activation.summary())
            }
            Commands::References { name } => {
                let content = self.controller.loader().load_full(&name)?;
                Ok(self.controller.executor().reference_text(&content)?)
            }
            Commands::Asset { name, asset } => {
                let content = self.controller.loader().load_full(&name)?;
                let path = self.controller.executor().asset_path(&content, &asset)?;
                Ok(path.display().to_string())
            }
            Commands::Run {
                skill,
                tool,
                params,
            } => self.run(&skill, &tool, &params).await,
        }
    }

    fn list(&self) -> String {
        let mut lines: Vec<String> = self
            .report
            .catalog
            .values()
            .map(|m| m.to_summary())
            .collect();
        if lines.is_empty() {
            lines.push("No skills available.".to_string());
        }
        for warning in &self.report.warnings {
            lines.push(format!("warning: {warning}"));
        }
        lines.join("\n")
    }

    fn suggest(&self, query: &str) -> String {
        let ranked = self.controller.suggest(query);
        if ranked.is_empty() {
            return format!("No skills match: {query}");
        }
        ranked
            .iter()
            .map(|r| format!("{:>8.2}  {}", r.score, r.name))
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn run(&self, skill: &str, tool: &str, params: &[String]) -> Result<String> {
        let activation = self.controller.activate(&self.session, skill).await?;

        let prefixed = format!("{}_{tool}", activation.skill);
        let name = if self.tools.contains(tool) {
            tool.to_string()
        } else if self.tools.contains(&prefixed) {
            prefixed
        } else {
            bail!(
                "Skill '{}' has no tool '{}'. Available: {}",
                activation.skill,
                tool,
                activation.tool_names().join(", ")
            );
        };

        let args = parse_params(params)?;
        info!("Invoking {} with {} arguments", name, args.len());
        let output = self
            .tools
            .invoke(&name, args)
            .await
            .with_context(|| format!("Tool '{name}' failed"))?;
        Ok(output)
    }

    /// Deregister everything this invocation registered
    pub async fn shutdown(self) -> Result<()> {
        let removed = self.controller.close_session(&self.session).await?;
        debug!("Session {} closed, {} tools removed", self.session, removed.len());
        Ok(())
    }
}

fn parse_params(params: &[String]) -> Result<ToolArguments> {
    params
        .iter()
        .map(|p| {
            p.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .with_context(|| format!("Argument '{p}' is not KEY=VALUE"))
        })
        .collect()
}
