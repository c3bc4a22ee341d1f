//! Registration contract with the agent runtime
//!
//! The activation controller only ever calls [`ToolRuntime::register`] and
//! [`ToolRuntime::deregister`]; the tool table itself belongs to the runtime.
//! [`InMemoryToolTable`] is a ready-made runtime for hosts without their own.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{InvocationError, Result, SkillError};
use crate::executor::{ToolArguments, ToolHandler, ToolResult};

/// Callback surface of the external agent runtime
pub trait ToolRuntime: Send + Sync {
    /// Make a tool visible to the agent
    ///
    /// # Errors
    /// [`SkillError::Registration`] if the runtime refuses the tool.
    fn register(&self, name: &str, description: &str, handler: Arc<dyn ToolHandler>) -> Result<()>;

    /// Remove a tool. Returns whether it was registered.
    fn deregister(&self, name: &str) -> bool;
}

#[derive(Debug, Clone)]
struct RegisteredTool {
    description: String,
    handler: Arc<dyn ToolHandler>,
}

/// Tool table keyed by name. Duplicate names are refused.
#[derive(Debug, Default)]
pub struct InMemoryToolTable {
    tools: RwLock<BTreeMap<String, RegisteredTool>>,
}

impl InMemoryToolTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered tool names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// `(name, description)` pairs, sorted by name
    #[must_use]
    pub fn list(&self) -> Vec<(String, String)> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, tool)| (name.clone(), tool.description.clone()))
            .collect()
    }

    /// Check if a tool is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Number of registered tools
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke a registered tool. The table is not locked while the tool runs.
    ///
    /// # Errors
    /// [`InvocationError::Resource`] for unknown names, otherwise the tool's own failure.
    pub async fn invoke(&self, name: &str, args: ToolArguments) -> ToolResult {
        let handler = self
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|t| Arc::clone(&t.handler))
            .ok_or_else(|| InvocationError::Resource(format!("Tool '{name}' is not registered")))?;

        handler.invoke(args).await
    }
}

impl ToolRuntime for InMemoryToolTable {
    fn register(&self, name: &str, description: &str, handler: Arc<dyn ToolHandler>) -> Result<()> {
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        if tools.contains_key(name) {
            return Err(SkillError::Registration {
                tool: name.to_string(),
                reason: "a tool with this name is already registered".into(),
            });
        }
        tools.insert(
            name.to_string(),
            RegisteredTool {
                description: description.to_string(),
                handler,
            },
        );
        Ok(())
    }

    fn deregister(&self, name: &str) -> bool {
        self.tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }
}
