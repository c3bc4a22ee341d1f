//! Activation controller
//!
//! Per session, every skill is either Dormant or Activated. Dormant → Activated loads
//! the full content, materializes its tools and registers them with the session's
//! [`ToolRuntime`], all under a per-identifier gate, so the transition happens at most
//! once however many callers race for it. Registration is all-or-nothing.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::config::{AutoActivationPolicy, SkillsConfig};
use crate::error::{Result, SkillError};
use crate::executor::{SkillExecutor, ToolDescriptor};
use crate::loader::{DiscoveryReport, SkillLoader};
use crate::management::management_tools;
use crate::matcher::{RankedSkill, SkillMatcher};
use crate::runtime::ToolRuntime;
use crate::skill::SkillContent;
use crate::store::{CatalogSummary, DescriptorStore};

/// Characters of the instructions quoted in an activation summary
const INSTRUCTIONS_PREVIEW_CHARS: usize = 500;

/// Outcome of an activation request
#[derive(Debug, Clone)]
pub struct Activation {
    /// Skill identifier
    pub skill: String,
    /// Content the tools were built from
    pub content: Arc<SkillContent>,
    /// Tools registered for this skill
    pub tools: Arc<[ToolDescriptor]>,
    /// `false` when the skill was already active and nothing was registered
    pub newly_activated: bool,
}

impl Activation {
    /// Names of the registered tools
    #[must_use]
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Status text for the agent: description, tools and the start of the instructions
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = vec![
            if self.newly_activated {
                format!("Activated skill: {}", self.skill)
            } else {
                format!("Skill '{}' is already activated.", self.skill)
            },
            format!("Description: {}", self.content.description()),
            String::new(),
            format!("Available tools: {}", self.tools.len()),
        ];
        lines.extend(self.tools.iter().map(|t| format!("- {}", t.name)));

        let instructions = &self.content.instructions;
        let preview: String = instructions.chars().take(INSTRUCTIONS_PREVIEW_CHARS).collect();
        lines.push(String::new());
        lines.push("Instructions:".to_string());
        if preview.len() < instructions.len() {
            lines.push(format!("{preview}..."));
        } else {
            lines.push(preview);
        }
        lines.join("\n")
    }
}

#[derive(Debug)]
struct ActiveSkill {
    content: Arc<SkillContent>,
    tools: Arc<[ToolDescriptor]>,
}

/// Activated skills of one session. Absent means Dormant.
#[derive(Debug, Default)]
struct ActivationState {
    active: BTreeMap<String, ActiveSkill>,
}

struct Session {
    runtime: Arc<dyn ToolRuntime>,
    state: RwLock<ActivationState>,
    /// Serializes transitions per identifier
    gates: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    /// Management tools installed into this session
    management: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl Session {
    fn new(runtime: Arc<dyn ToolRuntime>) -> Self {
        Self {
            runtime,
            state: RwLock::new(ActivationState::default()),
            gates: Mutex::new(HashMap::new()),
            management: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn gate(&self, name: &str) -> Arc<AsyncMutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(name.to_string()).or_default())
    }

    fn active(&self, name: &str) -> Option<(Arc<SkillContent>, Arc<[ToolDescriptor]>)> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .get(name)
            .map(|a| (Arc::clone(&a.content), Arc::clone(&a.tools)))
    }

    /// Find an active identifier case-insensitively
    fn resolve_active(&self, name: &str) -> Option<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.active.contains_key(name) {
            return Some(name.to_string());
        }
        state
            .active
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name.trim()))
            .cloned()
    }

    fn is_active(&self, name: &str) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .contains_key(name)
    }

    /// Register every tool or none
    fn register_all(&self, skill: &str, tools: &[ToolDescriptor]) -> Result<()> {
        for (i, tool) in tools.iter().enumerate() {
            if let Err(e) = self
                .runtime
                .register(&tool.name, &tool.description, Arc::clone(&tool.handler))
            {
                warn!(
                    "Registration of '{}' failed, rolling back {} tools of skill '{}': {}",
                    tool.name, i, skill, e
                );
                for registered in &tools[..i] {
                    self.runtime.deregister(&registered.name);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Remove a skill from the state and deregister its tools
    fn retire(&self, name: &str) -> Option<Vec<String>> {
        let removed = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .remove(name)?;

        let names = removed
            .tools
            .iter()
            .map(|tool| {
                if !self.runtime.deregister(&tool.name) {
                    debug!("Tool '{}' was already gone from the runtime", tool.name);
                }
                tool.name.clone()
            })
            .collect();
        Some(names)
    }
}

/// Orchestrates loader, matcher and executor, and owns per-session activation state
pub struct ActivationController {
    loader: Arc<SkillLoader>,
    matcher: SkillMatcher,
    executor: SkillExecutor,
    policy: AutoActivationPolicy,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl ActivationController {
    /// Create a controller with default matcher, executor and policy
    #[must_use]
    pub fn new(loader: Arc<SkillLoader>) -> Self {
        Self {
            loader,
            matcher: SkillMatcher::new(),
            executor: SkillExecutor::default(),
            policy: AutoActivationPolicy::default(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a controller tuned by configuration
    #[must_use]
    pub fn from_config(loader: Arc<SkillLoader>, config: &SkillsConfig) -> Self {
        Self::new(loader)
            .with_matcher(SkillMatcher::from_config(&config.matcher))
            .with_executor(SkillExecutor::new(config.executor.clone()))
            .with_policy(config.auto_activation.clone())
    }

    /// Replace the matcher
    #[must_use]
    pub fn with_matcher(mut self, matcher: SkillMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Replace the executor
    #[must_use]
    pub fn with_executor(mut self, executor: SkillExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Replace the auto-activation policy
    #[must_use]
    pub fn with_policy(mut self, policy: AutoActivationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The loader
    #[must_use]
    pub fn loader(&self) -> &Arc<SkillLoader> {
        &self.loader
    }

    /// The descriptor store
    #[must_use]
    pub fn store(&self) -> &Arc<DescriptorStore> {
        self.loader.store()
    }

    /// The executor, for reference text and asset lookups
    #[must_use]
    pub fn executor(&self) -> &SkillExecutor {
        &self.executor
    }

    /// Identifiers and descriptions of every discovered skill
    #[must_use]
    pub fn catalog_summary(&self) -> CatalogSummary {
        self.store().summary()
    }

    /// Rescan the skill roots. Sessions keep the content they already activated.
    pub fn rediscover(&self) -> DiscoveryReport {
        self.loader.discover()
    }

    /// Start a session whose tools go to `runtime`
    ///
    /// # Errors
    /// [`SkillError::SessionExists`] if the id is taken.
    pub fn open_session(&self, session_id: &str, runtime: Arc<dyn ToolRuntime>) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if sessions.contains_key(session_id) {
            return Err(SkillError::SessionExists(session_id.to_string()));
        }
        sessions.insert(session_id.to_string(), Arc::new(Session::new(runtime)));
        debug!("Opened session '{}'", session_id);
        Ok(())
    }

    /// End a session, deregistering every tool it contributed
    ///
    /// # Errors
    /// [`SkillError::UnknownSession`] if the id is not open.
    pub async fn close_session(&self, session_id: &str) -> Result<Vec<String>> {
        let session = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .ok_or_else(|| SkillError::UnknownSession(session_id.to_string()))?;
        session.closed.store(true, Ordering::SeqCst);

        let gates: Vec<(String, Arc<AsyncMutex<()>>)> = session
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, g)| (k.clone(), Arc::clone(g)))
            .collect();

        let mut removed = Vec::new();
        for (name, gate) in gates {
            let _guard = gate.lock().await;
            if let Some(tools) = session.retire(&name) {
                removed.extend(tools);
            }
        }

        let management = std::mem::take(
            &mut *session.management.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for name in management {
            session.runtime.deregister(&name);
            removed.push(name);
        }
        info!("Closed session '{}' ({} tools removed)", session_id, removed.len());
        Ok(removed)
    }

    /// Register `activate_skill`, `deactivate_skill`, `list_skills`, `get_skill_info`
    /// and `suggest_skills` for a session, so the agent can drive activation itself.
    /// Installing twice is a no-op.
    ///
    /// # Errors
    /// [`SkillError::UnknownSession`], or [`SkillError::Registration`] with nothing
    /// left registered.
    pub fn install_management_tools(self: &Arc<Self>, session_id: &str) -> Result<Vec<String>> {
        let session = self.session(session_id)?;
        let mut installed = session.management.lock().unwrap_or_else(PoisonError::into_inner);
        if !installed.is_empty() {
            return Ok(installed.clone());
        }

        let tools = management_tools(self, session_id);
        session.register_all("management", &tools)?;
        *installed = tools.into_iter().map(|t| t.name).collect();
        debug!("Installed management tools in session '{}'", session_id);
        Ok(installed.clone())
    }

    fn session(&self, session_id: &str) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
            .ok_or_else(|| SkillError::UnknownSession(session_id.to_string()))
    }

    fn resolve(&self, name: &str) -> Result<String> {
        self.store().resolve(name).ok_or_else(|| SkillError::NotFound {
            name: name.to_string(),
        })
    }

    /// Dormant → Activated for one skill. Idempotent: an active skill is returned as is.
    ///
    /// # Errors
    /// [`SkillError::NotFound`] for unknown skills, loader errors for unreadable content,
    /// [`SkillError::Registration`] if the runtime refuses a tool. The skill stays
    /// Dormant and nothing stays registered on any error.
    pub async fn activate(&self, session_id: &str, name: &str) -> Result<Activation> {
        let session = self.session(session_id)?;
        let name = self.resolve(name)?;

        let gate = session.gate(&name);
        let _guard = gate.lock().await;

        if session.closed.load(Ordering::SeqCst) {
            return Err(SkillError::UnknownSession(session_id.to_string()));
        }

        if let Some((content, tools)) = session.active(&name) {
            debug!("Skill '{}' already active in session '{}'", name, session_id);
            return Ok(Activation {
                skill: name,
                content,
                tools,
                newly_activated: false,
            });
        }

        let content = self.load_off_thread(&name).await?;
        let tools: Arc<[ToolDescriptor]> = self.executor.materialize(&content).into();
        session.register_all(&name, &tools)?;

        session
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .insert(
                name.clone(),
                ActiveSkill {
                    content: Arc::clone(&content),
                    tools: Arc::clone(&tools),
                },
            );

        info!(
            "Activated skill '{}' in session '{}' with {} tools",
            name,
            session_id,
            tools.len()
        );
        Ok(Activation {
            skill: name,
            content,
            tools,
            newly_activated: true,
        })
    }

    /// Disk reads and the store's slot lock stay off the async workers
    async fn load_off_thread(&self, name: &str) -> Result<Arc<SkillContent>> {
        let loader = Arc::clone(&self.loader);
        let key = name.to_string();
        match tokio::task::spawn_blocking(move || loader.load_full(&key)).await {
            Ok(result) => result,
            Err(e) => match e.try_into_panic() {
                Ok(panic) => std::panic::resume_unwind(panic),
                Err(_) => Err(SkillError::LoadInterrupted {
                    name: name.to_string(),
                }),
            },
        }
    }

    /// Activated → Dormant, deregistering exactly this skill's tools
    ///
    /// # Errors
    /// [`SkillError::NotActivated`] if the skill is dormant in this session.
    pub async fn deactivate(&self, session_id: &str, name: &str) -> Result<Vec<String>> {
        let session = self.session(session_id)?;
        // Active skills stay addressable even after rediscovery dropped them
        let name = match session.resolve_active(name) {
            Some(active) => active,
            None => self.resolve(name)?,
        };

        let gate = session.gate(&name);
        let _guard = gate.lock().await;

        let removed = session
            .retire(&name)
            .ok_or_else(|| SkillError::NotActivated { name: name.clone() })?;
        info!(
            "Deactivated skill '{}' in session '{}' ({} tools removed)",
            name,
            session_id,
            removed.len()
        );
        Ok(removed)
    }

    /// Rank the catalog for a query
    #[must_use]
    pub fn suggest(&self, query: &str) -> Vec<RankedSkill> {
        self.matcher.rank(query, &self.store().catalog())
    }

    /// Activate the top match of `query` if the auto-activation policy allows it.
    ///
    /// At most one skill is activated per call.
    ///
    /// # Errors
    /// [`SkillError::NoCandidate`] when the policy is off or no match is confident
    /// enough, otherwise the errors of [`ActivationController::activate`].
    pub async fn activate_for_query(&self, session_id: &str, query: &str) -> Result<Activation> {
        let ranked = self.suggest(query);
        let no_candidate = || SkillError::NoCandidate {
            query: query.to_string(),
        };

        if !self.policy.enabled {
            return Err(no_candidate());
        }
        let top = ranked.first().ok_or_else(no_candidate)?;
        let margin = ranked.get(1).map_or(f64::INFINITY, |second| top.score - second.score);
        if top.score < self.policy.min_score || margin < self.policy.min_margin {
            debug!(
                "Top match '{}' ({:.2}, margin {:.2}) below auto-activation policy",
                top.name, top.score, margin
            );
            return Err(no_candidate());
        }

        info!("Auto-activating '{}' for query (score {:.2})", top.name, top.score);
        self.activate(session_id, &top.name).await
    }

    /// Identifiers active in a session, sorted
    ///
    /// # Errors
    /// [`SkillError::UnknownSession`] if the id is not open.
    pub fn activated(&self, session_id: &str) -> Result<Vec<String>> {
        let session = self.session(session_id)?;
        let state = session.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.active.keys().cloned().collect())
    }

    /// Tools a skill registered in a session, `None` while it is dormant
    ///
    /// # Errors
    /// [`SkillError::UnknownSession`] if the id is not open.
    pub fn active_tools(&self, session_id: &str, name: &str) -> Result<Option<Arc<[ToolDescriptor]>>> {
        let session = self.session(session_id)?;
        Ok(session.active(name).map(|(_, tools)| tools))
    }

    /// Every skill with its description, active ones marked
    ///
    /// # Errors
    /// [`SkillError::UnknownSession`] if the id is not open.
    pub fn list_skills(&self, session_id: &str) -> Result<String> {
        let session = self.session(session_id)?;
        let catalog = self.store().catalog();
        if catalog.is_empty() {
            return Ok("No skills available.".to_string());
        }

        let mut lines = vec!["Available skills:".to_string()];
        for metadata in catalog.values() {
            let marker = if session.is_active(&metadata.name) {
                " [ACTIVATED]"
            } else {
                ""
            };
            lines.push(format!("{}{marker}", metadata.to_summary()));
        }
        Ok(lines.join("\n"))
    }

    /// Details of one skill; instructions are only disclosed once it is active
    ///
    /// # Errors
    /// [`SkillError::UnknownSession`] or [`SkillError::NotFound`].
    pub fn skill_info(&self, session_id: &str, name: &str) -> Result<String> {
        let session = self.session(session_id)?;
        let name = self.resolve(name)?;
        let metadata = self
            .store()
            .get(&name)
            .ok_or_else(|| SkillError::NotFound { name: name.clone() })?;

        let mut info = vec![
            format!("# {}", metadata.name),
            format!("Description: {}", metadata.description),
        ];
        if let Some(license) = &metadata.license {
            info.push(format!("License: {license}"));
        }
        if let Some(compatibility) = &metadata.compatibility {
            info.push(format!("Compatibility: {compatibility}"));
        }

        match session.active(&name) {
            Some((content, tools)) => {
                info.push(String::new());
                info.push("Tools:".to_string());
                info.extend(tools.iter().map(|t| format!("- {}: {}", t.name, t.description)));
                info.push(String::new());
                info.push("## Instructions".to_string());
                info.push(content.instructions.clone());
            }
            None => {
                info.push(String::new());
                info.push(
                    "Skill not activated. Call activate_skill to access full instructions and tools."
                        .to_string(),
                );
            }
        }
        Ok(info.join("\n"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::runtime::InMemoryToolTable;
    use crate::skill::MANIFEST_FILE;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_skill(root: &Path, name: &str, description: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(MANIFEST_FILE),
            format!("---\nname: {name}\ndescription: {description}\n---\nSteps for {name}.\n"),
        )
        .unwrap();
    }

    fn controller(root: &Path) -> ActivationController {
        let loader = Arc::new(SkillLoader::new().add_directory(root));
        loader.discover();
        ActivationController::new(loader)
    }

    #[tokio::test]
    async fn test_activate_is_idempotent() {
        let td = TempDir::new().unwrap();
        write_skill(td.path(), "pdf", "Work with PDF documents");
        let controller = controller(td.path());
        let table = Arc::new(InMemoryToolTable::new());
        controller.open_session("s1", table.clone()).unwrap();

        let first = controller.activate("s1", "pdf").await.unwrap();
        assert!(first.newly_activated);
        assert_eq!(first.tool_names(), vec!["pdf_instructions"]);

        let second = controller.activate("s1", "PDF").await.unwrap();
        assert!(!second.newly_activated);
        assert!(Arc::ptr_eq(&first.tools, &second.tools));
        assert_eq!(table.len(), 1);
        assert_eq!(controller.activated("s1").unwrap(), vec!["pdf"]);
    }

    #[tokio::test]
    async fn test_unknown_skill_and_session() {
        let td = TempDir::new().unwrap();
        let controller = controller(td.path());
        controller
            .open_session("s1", Arc::new(InMemoryToolTable::new()))
            .unwrap();

        assert!(matches!(
            controller.activate("s1", "ghost").await,
            Err(SkillError::NotFound { .. })
        ));
        assert!(matches!(
            controller.activate("nope", "ghost").await,
            Err(SkillError::UnknownSession(_))
        ));
        assert!(matches!(
            controller.open_session("s1", Arc::new(InMemoryToolTable::new())),
            Err(SkillError::SessionExists(_))
        ));
    }

    #[tokio::test]
    async fn test_registration_conflict_rolls_back() {
        let td = TempDir::new().unwrap();
        write_skill(td.path(), "pdf", "Work with PDF documents");
        fs::create_dir_all(td.path().join("pdf/scripts")).unwrap();
        fs::write(td.path().join("pdf/scripts/split.sh"), "echo split\n").unwrap();
        let controller = controller(td.path());

        let table = Arc::new(InMemoryToolTable::new());
        // Squat on the second tool name so registration fails halfway
        let squatter = crate::executor::SkillExecutor::default()
            .materialize(&controller.loader().load_full("pdf").unwrap());
        table
            .register(&squatter[1].name, "squatter", Arc::clone(&squatter[1].handler))
            .unwrap();
        controller.open_session("s1", table.clone()).unwrap();

        let err = controller.activate("s1", "pdf").await.unwrap_err();
        assert!(matches!(err, SkillError::Registration { .. }));
        assert_eq!(table.names(), vec!["pdf_instructions"]);
        assert!(controller.activated("s1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skill_info_discloses_after_activation() {
        let td = TempDir::new().unwrap();
        write_skill(td.path(), "pdf", "Work with PDF documents");
        let controller = controller(td.path());
        controller
            .open_session("s1", Arc::new(InMemoryToolTable::new()))
            .unwrap();

        let before = controller.skill_info("s1", "pdf").unwrap();
        assert!(before.contains("Skill not activated"));
        assert!(!before.contains("Steps for pdf."));

        controller.activate("s1", "pdf").await.unwrap();
        let after = controller.skill_info("s1", "pdf").unwrap();
        assert!(after.contains("Steps for pdf."));
        assert!(controller.list_skills("s1").unwrap().contains("- pdf: Work with PDF documents [ACTIVATED]"));
    }

    #[tokio::test]
    async fn test_auto_activation_policy() {
        let td = TempDir::new().unwrap();
        write_skill(td.path(), "mcp-builder", "Creates MCP servers");
        write_skill(td.path(), "webapp-testing", "Tests web applications");
        let controller = controller(td.path());
        controller
            .open_session("s1", Arc::new(InMemoryToolTable::new()))
            .unwrap();

        // Disabled by default
        assert!(matches!(
            controller.activate_for_query("s1", "build me an MCP server").await,
            Err(SkillError::NoCandidate { .. })
        ));

        let controller = controller.with_policy(AutoActivationPolicy {
            enabled: true,
            min_score: 5.0,
            min_margin: 1.0,
        });
        let activation = controller
            .activate_for_query("s1", "build me an MCP server")
            .await
            .unwrap();
        assert_eq!(activation.skill, "mcp-builder");
        assert_eq!(controller.activated("s1").unwrap(), vec!["mcp-builder"]);

        assert!(matches!(
            controller.activate_for_query("s1", "bake bread").await,
            Err(SkillError::NoCandidate { .. })
        ));
    }

    #[tokio::test]
    async fn test_close_session_deregisters() {
        let td = TempDir::new().unwrap();
        write_skill(td.path(), "pdf", "Work with PDF documents");
        write_skill(td.path(), "xlsx", "Spreadsheets");
        let controller = controller(td.path());
        let table = Arc::new(InMemoryToolTable::new());
        controller.open_session("s1", table.clone()).unwrap();
        controller.activate("s1", "pdf").await.unwrap();
        controller.activate("s1", "xlsx").await.unwrap();

        let removed = controller.close_session("s1").await.unwrap();
        assert_eq!(removed.len(), 2);
        assert!(table.is_empty());
        assert!(matches!(
            controller.activated("s1"),
            Err(SkillError::UnknownSession(_))
        ));
    }

    #[tokio::test]
    async fn test_management_tools_drive_activation() {
        let td = TempDir::new().unwrap();
        write_skill(td.path(), "pdf", "Work with PDF documents");
        let controller = Arc::new(controller(td.path()));
        let table = Arc::new(InMemoryToolTable::new());
        controller.open_session("s1", table.clone()).unwrap();

        let installed = controller.install_management_tools("s1").unwrap();
        assert_eq!(installed.len(), 5);
        assert_eq!(controller.install_management_tools("s1").unwrap(), installed);

        let mut args = crate::executor::ToolArguments::new();
        args.insert("skill_name".into(), "pdf".into());
        let text = table.invoke("activate_skill", args.clone()).await.unwrap();
        assert!(text.starts_with("Activated skill: pdf"));
        assert!(table.contains("pdf_instructions"));

        let mut query = crate::executor::ToolArguments::new();
        query.insert("query".into(), "split a pdf document".into());
        let suggested = table.invoke("suggest_skills", query).await.unwrap();
        assert!(suggested.contains("- pdf (score:"));

        let missing = table
            .invoke("get_skill_info", crate::executor::ToolArguments::new())
            .await
            .unwrap_err();
        assert!(matches!(missing, crate::error::InvocationError::InvalidArguments(_)));

        table.invoke("deactivate_skill", args).await.unwrap();
        assert!(!table.contains("pdf_instructions"));

        controller.close_session("s1").await.unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_activation_summary_preview() {
        let td = TempDir::new().unwrap();
        write_skill(td.path(), "pdf", "Work with PDF documents");
        let loader = SkillLoader::new().add_directory(td.path());
        loader.discover();
        let content = loader.load_full("pdf").unwrap();
        let tools: Arc<[ToolDescriptor]> = SkillExecutor::default().materialize(&content).into();

        let activation = Activation {
            skill: "pdf".into(),
            content,
            tools,
            newly_activated: true,
        };
        let summary = activation.summary();
        assert!(summary.starts_with("Activated skill: pdf"));
        assert!(summary.contains("- pdf_instructions"));
        assert!(summary.ends_with("Steps for pdf."));
    }
}
