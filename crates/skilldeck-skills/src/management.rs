//! Management tools exposed to the agent
//!
//! These let the agent list, inspect, suggest and (de)activate skills itself.
//! Handlers hold a [`Weak`] controller reference: the session's runtime owns them, and
//! the controller owns the session.

use async_trait::async_trait;
use std::sync::{Arc, Weak};

use crate::activation::ActivationController;
use crate::error::{InvocationError, SkillError};
use crate::executor::{ToolArguments, ToolDescriptor, ToolHandler, ToolResult};

#[derive(Debug, Clone, Copy)]
enum Operation {
    Activate,
    Deactivate,
    List,
    Info,
    Suggest,
}

#[derive(Debug)]
struct ManagementTool {
    operation: Operation,
    controller: Weak<ActivationController>,
    session: String,
}

#[async_trait]
impl ToolHandler for ManagementTool {
    async fn invoke(&self, args: ToolArguments) -> ToolResult {
        let controller = self
            .controller
            .upgrade()
            .ok_or_else(|| InvocationError::Resource("skill controller is gone".into()))?;
        let resource = |e: SkillError| InvocationError::Resource(e.to_string());

        match self.operation {
            Operation::Activate => controller
                .activate(&self.session, skill_name(&args)?)
                .await
                .map(|activation| activation.summary())
                .map_err(resource),
            Operation::Deactivate => {
                let name = skill_name(&args)?;
                let removed = controller
                    .deactivate(&self.session, name)
                    .await
                    .map_err(resource)?;
                Ok(format!("Deactivated skill: {name} ({} tools removed)", removed.len()))
            }
            Operation::List => controller.list_skills(&self.session).map_err(resource),
            Operation::Info => controller
                .skill_info(&self.session, skill_name(&args)?)
                .map_err(resource),
            Operation::Suggest => {
                let query = args
                    .get("query")
                    .filter(|q| !q.trim().is_empty())
                    .ok_or_else(|| InvocationError::InvalidArguments("missing 'query'".into()))?;
                Ok(suggestions(&controller, query))
            }
        }
    }
}

fn skill_name(args: &ToolArguments) -> Result<&str, InvocationError> {
    args.get("skill_name")
        .or_else(|| args.get("name"))
        .map(String::as_str)
        .ok_or_else(|| InvocationError::InvalidArguments("missing 'skill_name'".into()))
}

fn suggestions(controller: &ActivationController, query: &str) -> String {
    let ranked = controller.suggest(query);
    if ranked.is_empty() {
        return format!("No skills match: {query}");
    }

    let store = controller.store();
    let mut out = String::from("Suggested skills:");
    for candidate in ranked {
        let description = store
            .get(&candidate.name)
            .map(|m| m.description.clone())
            .unwrap_or_default();
        out.push_str(&format!(
            "\n- {} (score: {:.2}): {}",
            candidate.name, candidate.score, description
        ));
    }
    out
}

/// The management tool set bound to one session
pub(crate) fn management_tools(
    controller: &Arc<ActivationController>,
    session: &str,
) -> Vec<ToolDescriptor> {
    let tool = |name: &str, description: &str, operation| ToolDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        handler: Arc::new(ManagementTool {
            operation,
            controller: Arc::downgrade(controller),
            session: session.to_string(),
        }),
    };

    vec![
        tool(
            "activate_skill",
            "Activate a skill to load its instructions and tools. Provide 'skill_name'.",
            Operation::Activate,
        ),
        tool(
            "deactivate_skill",
            "Deactivate a skill and remove its tools. Provide 'skill_name'.",
            Operation::Deactivate,
        ),
        tool(
            "list_skills",
            "List all available skills and whether they are activated.",
            Operation::List,
        ),
        tool(
            "get_skill_info",
            "Show details of a skill. Provide 'skill_name'.",
            Operation::Info,
        ),
        tool(
            "suggest_skills",
            "Suggest skills relevant to a request. Provide 'query'.",
            Operation::Suggest,
        ),
    ]
}
