//! Skill executor - turns skill resources into callable tools
//!
//! Every script becomes a [`ToolDescriptor`] whose handler runs the script as a child
//! process with a wall-clock timeout. Nothing is imported in-process. Reference
//! documents and assets are exposed through accessor tools and helper functions; asset
//! bytes are never read here, only located.

use async_trait::async_trait;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::config::ExecutorConfig;
use crate::error::{InvocationError, Result, SkillError};
use crate::skill::{ScriptResource, ScriptRuntime, SkillContent};

/// Arguments passed to a tool. Keys are sorted, so the command line is stable.
pub type ToolArguments = BTreeMap<String, String>;

/// Outcome of a tool invocation: text on success, a typed failure otherwise
pub type ToolResult = std::result::Result<String, InvocationError>;

/// Argument key whose value is split on whitespace into positional arguments
pub const POSITIONAL_ARGS_KEY: &str = "args";

/// Invocation contract handed to the agent runtime
#[async_trait]
pub trait ToolHandler: Send + Sync + Debug {
    /// Run the tool
    async fn invoke(&self, args: ToolArguments) -> ToolResult;
}

/// A callable operation produced from a skill
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    /// Unique within an activation scope, `<skill>_<operation>`
    pub name: String,
    /// What the tool does, for the agent
    pub description: String,
    /// How to run it
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    /// Invoke the handler
    pub async fn invoke(&self, args: ToolArguments) -> ToolResult {
        self.handler.invoke(args).await
    }
}

/// Builds tools from [`SkillContent`]
#[derive(Debug, Clone, Default)]
pub struct SkillExecutor {
    config: ExecutorConfig,
}

impl SkillExecutor {
    /// Create an executor
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Invocation timeout applied to every script tool
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Produce the tool set for a skill.
    ///
    /// One tool per script, plus `<skill>_instructions` always, `<skill>_read_reference`
    /// when references exist and `<skill>_list_assets` when assets exist.
    #[must_use]
    pub fn materialize(&self, content: &Arc<SkillContent>) -> Vec<ToolDescriptor> {
        let skill = content.name();
        let mut used = BTreeSet::new();
        let mut tools = Vec::new();

        for script in &content.scripts {
            let name = unique_name(&mut used, skill, script);
            tools.push(ToolDescriptor {
                description: script_description(skill, script),
                handler: Arc::new(self.script_tool(&name, content, script)),
                name,
            });
        }

        let accessor = |op: &str, used: &mut BTreeSet<String>| {
            let mut name = tool_name(skill, op);
            while !used.insert(name.clone()) {
                name.push('_');
            }
            name
        };

        tools.push(ToolDescriptor {
            name: accessor("instructions", &mut used),
            description: format!("Return the full instructions of the {skill} skill."),
            handler: Arc::new(InstructionsTool {
                content: Arc::clone(content),
            }),
        });

        if !content.references.is_empty() {
            tools.push(ToolDescriptor {
                name: accessor("read_reference", &mut used),
                description: format!(
                    "Read reference documentation from the {skill} skill. Provide 'filename', one of: {}.",
                    join_paths(&content.references)
                ),
                handler: Arc::new(ReferenceTool {
                    content: Arc::clone(content),
                }),
            });
        }

        if !content.assets.is_empty() {
            tools.push(ToolDescriptor {
                name: accessor("list_assets", &mut used),
                description: format!(
                    "List asset files of the {skill} skill with absolute paths. Optional 'pattern' filters with * and ? wildcards."
                ),
                handler: Arc::new(AssetListTool {
                    content: Arc::clone(content),
                }),
            });
        }

        debug!("Materialized {} tools for skill '{}'", tools.len(), skill);
        tools
    }

    fn script_tool(&self, name: &str, content: &SkillContent, script: &ScriptResource) -> ScriptTool {
        let program = match script.runtime {
            ScriptRuntime::Python => Some(self.config.python.clone()),
            ScriptRuntime::Shell => Some(self.config.shell.clone()),
            ScriptRuntime::Node => Some(self.config.node.clone()),
            ScriptRuntime::Executable => None,
        };
        ScriptTool {
            name: name.to_string(),
            program,
            script: content.root().join(&script.relative_path),
            working_dir: content.scripts_dir(),
            timeout: self.config.timeout(),
            max_output_bytes: self.config.max_output_bytes,
        }
    }

    /// All reference documents concatenated, each under a `## <path>` header
    ///
    /// # Errors
    /// [`SkillError::Io`] if a listed reference cannot be read.
    pub fn reference_text(&self, content: &SkillContent) -> Result<String> {
        let mut parts = vec![format!("# References for {} skill\n", content.name())];
        for reference in &content.references {
            let path = content.references_dir().join(reference);
            let text = std::fs::read_to_string(&path).map_err(|e| SkillError::io(&path, e))?;
            parts.push(format!("## {}\n\n{}\n", reference.display(), text.trim_end()));
        }
        Ok(parts.join("\n"))
    }

    /// Absolute path of a named asset. The file is not opened.
    ///
    /// # Errors
    /// [`SkillError::InvalidPath`] for names that are absolute or climb out of
    /// `assets/`, [`SkillError::AssetNotFound`] if no such asset exists.
    pub fn asset_path(&self, content: &SkillContent, name: &str) -> Result<PathBuf> {
        let rel = normalize_relative_path(name)?;
        let not_found = || SkillError::AssetNotFound {
            skill: content.name().to_string(),
            name: name.to_string(),
        };

        if !content.assets.contains(&rel) {
            return Err(not_found());
        }

        let assets_dir = content.assets_dir().canonicalize().map_err(|_| not_found())?;
        let full = assets_dir.join(&rel).canonicalize().map_err(|_| not_found())?;
        if !full.starts_with(&assets_dir) || !full.is_file() {
            return Err(not_found());
        }
        Ok(full)
    }
}

/// Runs one script as an isolated child process
#[derive(Debug)]
struct ScriptTool {
    name: String,
    /// Interpreter, `None` to execute the script directly
    program: Option<String>,
    script: PathBuf,
    working_dir: PathBuf,
    timeout: Duration,
    max_output_bytes: usize,
}

#[async_trait]
impl ToolHandler for ScriptTool {
    async fn invoke(&self, args: ToolArguments) -> ToolResult {
        let argv = build_argv(&args)?;

        let mut cmd = match &self.program {
            Some(program) => {
                let mut cmd = Command::new(program);
                cmd.arg(&self.script);
                cmd
            }
            None => Command::new(&self.script),
        };
        cmd.args(&argv)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so everything the script starts can be killed with it
        #[cfg(unix)]
        cmd.process_group(0);

        debug!("Running tool '{}': {:?} {:?}", self.name, self.script, argv);
        let deadline = Instant::now() + self.timeout;
        let mut child = cmd.spawn().map_err(|source| InvocationError::Spawn {
            tool: self.name.clone(),
            source,
        })?;
        let group = child.id();

        let stdout = tokio::spawn(read_capped(child.stdout.take(), self.max_output_bytes));
        let stderr = tokio::spawn(read_capped(child.stderr.take(), self.max_output_bytes));
        let readers = [stdout.abort_handle(), stderr.abort_handle()];
        let timed_out = || InvocationError::Timeout {
            tool: self.name.clone(),
            timeout: self.timeout,
        };

        let waited = timeout_at(deadline, child.wait()).await;
        // Stragglers of the script die with it, whatever the outcome
        kill_process_group(group);

        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                readers.iter().for_each(tokio::task::AbortHandle::abort);
                return Err(wait_failed(&self.name, &e));
            }
            Err(_) => {
                warn!("Tool '{}' exceeded {:?}, killed it", self.name, self.timeout);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill tool '{}': {}", self.name, e);
                }
                readers.iter().for_each(tokio::task::AbortHandle::abort);
                return Err(timed_out());
            }
        };

        // Pipes are closed once the group is gone; the deadline still bounds the drain.
        let Ok((stdout, stderr)) = timeout_at(deadline, async {
            (
                stdout.await.unwrap_or_default(),
                stderr.await.unwrap_or_default(),
            )
        })
        .await
        else {
            readers.iter().for_each(tokio::task::AbortHandle::abort);
            return Err(timed_out());
        };

        if status.success() {
            Ok(stdout.into_text())
        } else {
            Err(InvocationError::Execution {
                tool: self.name.clone(),
                exit_code: status.code(),
                stderr: stderr.into_text(),
            })
        }
    }
}

/// Returns the instruction body
#[derive(Debug)]
struct InstructionsTool {
    content: Arc<SkillContent>,
}

#[async_trait]
impl ToolHandler for InstructionsTool {
    async fn invoke(&self, _args: ToolArguments) -> ToolResult {
        Ok(self.content.instructions.clone())
    }
}

/// Reads one reference document
#[derive(Debug)]
struct ReferenceTool {
    content: Arc<SkillContent>,
}

#[async_trait]
impl ToolHandler for ReferenceTool {
    async fn invoke(&self, args: ToolArguments) -> ToolResult {
        let filename = args
            .get("filename")
            .or_else(|| args.get("name"))
            .ok_or_else(|| InvocationError::InvalidArguments("missing 'filename'".into()))?;

        let rel = normalize_relative_path(filename)
            .map_err(|e| InvocationError::InvalidArguments(e.to_string()))?;
        if !self.content.references.contains(&rel) {
            return Err(InvocationError::Resource(format!(
                "Reference file '{filename}' not found. Available references: {}",
                join_paths(&self.content.references)
            )));
        }

        let path = self.content.references_dir().join(rel);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| InvocationError::Resource(format!("Error reading reference {path:?}: {e}")))
    }
}

/// Lists assets, optionally filtered by a wildcard pattern
#[derive(Debug)]
struct AssetListTool {
    content: Arc<SkillContent>,
}

#[async_trait]
impl ToolHandler for AssetListTool {
    async fn invoke(&self, args: ToolArguments) -> ToolResult {
        let pattern = args.get("pattern").map_or("*", String::as_str);
        let matcher = wildcard(pattern)?;

        let assets_dir = self.content.assets_dir();
        let matches: Vec<String> = self
            .content
            .assets
            .iter()
            .filter(|a| matcher.is_match(&a.to_string_lossy()))
            .map(|a| format!("- {} ({})", a.display(), assets_dir.join(a).display()))
            .collect();

        if matches.is_empty() {
            return Ok(format!("No assets found matching pattern '{pattern}'"));
        }
        Ok(format!(
            "Assets in {}:\n{}",
            self.content.name(),
            matches.join("\n")
        ))
    }
}

/// The child started but its exit status could not be collected
fn wait_failed(tool: &str, source: &std::io::Error) -> InvocationError {
    InvocationError::Execution {
        tool: tool.to_string(),
        exit_code: None,
        stderr: format!("failed to wait for process: {source}"),
    }
}

/// SIGKILL every process left in the group led by `pgid`. An empty group is fine.
#[cfg(unix)]
fn kill_process_group(pgid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = pgid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to kill process group {}: {}", pgid, e),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: Option<u32>) {}

/// Captured stream, cut at the configured size
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Captured {
    fn into_text(self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            text.push_str(&format!("\n[output truncated at {} bytes]", self.bytes.len()));
        }
        text
    }
}

/// Drain a pipe to the end, keeping at most `max` bytes
async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, max: usize) -> Captured {
    let mut captured = Captured::default();
    let Some(mut reader) = reader else {
        return captured;
    };

    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = max.saturating_sub(captured.bytes.len());
                if n > room {
                    captured.truncated = true;
                }
                captured.bytes.extend_from_slice(&buf[..n.min(room)]);
            }
        }
    }
    captured
}

/// Positional `args` first, then `--key=value` in key order
fn build_argv(args: &ToolArguments) -> std::result::Result<Vec<String>, InvocationError> {
    let mut argv: Vec<String> = args
        .get(POSITIONAL_ARGS_KEY)
        .map(|a| a.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    for (key, value) in args {
        if key == POSITIONAL_ARGS_KEY {
            continue;
        }
        if key.is_empty()
            || key.starts_with('-')
            || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(InvocationError::InvalidArguments(format!(
                "argument name '{key}' must be alphanumeric, '_' or '-'"
            )));
        }
        argv.push(format!("--{key}={value}"));
    }
    Ok(argv)
}

/// `<skill>_<operation>`. Identifiers never contain `_`, so the first one separates
/// the skill from the operation and names cannot collide across skills.
fn tool_name(skill: &str, operation: &str) -> String {
    format!("{skill}_{operation}")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn unique_name(used: &mut BTreeSet<String>, skill: &str, script: &ScriptResource) -> String {
    let base = tool_name(skill, script.stem());
    if used.insert(base.clone()) {
        return base;
    }

    let ext = script
        .relative_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("script");
    let mut name = tool_name(&base, ext);
    let mut n = 2;
    while !used.insert(name.clone()) {
        name = format!("{base}_{n}");
        n += 1;
    }
    name
}

fn script_description(skill: &str, script: &ScriptResource) -> String {
    let usage = format!(
        "Runs {} from the {skill} skill. Put positional arguments in '{POSITIONAL_ARGS_KEY}'; other keys are passed as --key=value.",
        script.relative_path.display()
    );
    match &script.help {
        Some(help) => format!("{}. {usage}", help.trim_end_matches('.')),
        None => format!(
            "Run {} script from {skill} skill. Pass {POSITIONAL_ARGS_KEY}=\"--help\" to see its usage. {usage}",
            script.stem()
        ),
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `*` and `?` wildcards over the whole string
fn wildcard(pattern: &str) -> std::result::Result<Regex, InvocationError> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*").replace(r"\?", ".");
    Regex::new(&format!("^{escaped}$"))
        .map_err(|e| InvocationError::InvalidArguments(format!("bad pattern '{pattern}': {e}")))
}

/// Reject empty, absolute and parent-climbing paths
fn normalize_relative_path(p: &str) -> Result<PathBuf> {
    let raw = Path::new(p.trim());
    let mut out = PathBuf::new();
    for c in raw.components() {
        match c {
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => {
                return Err(SkillError::InvalidPath(p.to_string()));
            }
            Component::CurDir => {}
            Component::Normal(seg) => out.push(seg),
        }
    }
    if out.as_os_str().is_empty() {
        return Err(SkillError::InvalidPath(p.to_string()));
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::skill::SkillMetadata;
    use std::fs;
    use tempfile::TempDir;

    fn content_in(root: &Path, scripts: Vec<ScriptResource>) -> Arc<SkillContent> {
        Arc::new(SkillContent {
            metadata: Arc::new(SkillMetadata {
                name: "demo".into(),
                description: "Demo skill".into(),
                license: None,
                compatibility: None,
                metadata: BTreeMap::new(),
                path: root.to_path_buf(),
            }),
            instructions: "Follow the steps.".into(),
            scripts,
            references: vec![PathBuf::from("guide.md")],
            assets: vec![PathBuf::from("logo.png"), PathBuf::from("fonts/main.ttf")],
        })
    }

    fn script(path: &str, runtime: ScriptRuntime) -> ScriptResource {
        ScriptResource {
            relative_path: PathBuf::from(path),
            runtime,
            help: None,
        }
    }

    #[test]
    fn test_materialize_names_and_accessors() {
        let td = TempDir::new().unwrap();
        let content = content_in(
            td.path(),
            vec![
                script("scripts/fill-form.py", ScriptRuntime::Python),
                script("scripts/fill-form.sh", ScriptRuntime::Shell),
            ],
        );

        let tools = SkillExecutor::default().materialize(&content);
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "demo_fill-form",
                "demo_fill-form_sh",
                "demo_instructions",
                "demo_read_reference",
                "demo_list_assets"
            ]
        );
        assert!(tools[0].description.contains("scripts/fill-form.py"));
    }

    #[test]
    fn test_wait_failure_is_execution_error() {
        let source = std::io::Error::new(std::io::ErrorKind::Interrupted, "wait interrupted");
        match wait_failed("demo_run", &source) {
            InvocationError::Execution {
                tool,
                exit_code,
                stderr,
            } => {
                assert_eq!(tool, "demo_run");
                assert_eq!(exit_code, None);
                assert!(stderr.contains("wait interrupted"));
            }
            other => panic!("expected execution failure, got {other:?}"),
        }
    }

    #[test]
    fn test_tool_names_keep_skill_boundary() {
        assert_eq!(tool_name("pdf", "tools_x"), "pdf_tools_x");
        assert_eq!(tool_name("pdf-tools", "x"), "pdf-tools_x");
        assert_eq!(tool_name("pdf", "fill form.v2"), "pdf_fill_form_v2");
    }

    #[test]
    fn test_build_argv() {
        let mut args = ToolArguments::new();
        args.insert("args".into(), "input.pdf  out.txt".into());
        args.insert("pages".into(), "1-3".into());
        args.insert("dpi".into(), "300".into());
        assert_eq!(
            build_argv(&args).unwrap(),
            vec!["input.pdf", "out.txt", "--dpi=300", "--pages=1-3"]
        );

        let mut bad = ToolArguments::new();
        bad.insert("--rm".into(), "x".into());
        assert!(matches!(
            build_argv(&bad),
            Err(InvocationError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_asset_path() {
        let td = TempDir::new().unwrap();
        fs::create_dir_all(td.path().join("assets/fonts")).unwrap();
        fs::write(td.path().join("assets/logo.png"), "png").unwrap();
        fs::write(td.path().join("assets/fonts/main.ttf"), "ttf").unwrap();
        let content = content_in(td.path(), Vec::new());
        let executor = SkillExecutor::default();

        let path = executor.asset_path(&content, "fonts/main.ttf").unwrap();
        assert!(path.is_absolute());
        assert!(path.exists());

        assert!(matches!(
            executor.asset_path(&content, "missing.png"),
            Err(SkillError::AssetNotFound { .. })
        ));
        assert!(matches!(
            executor.asset_path(&content, "../SKILL.md"),
            Err(SkillError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_reference_text() {
        let td = TempDir::new().unwrap();
        fs::create_dir_all(td.path().join("references")).unwrap();
        fs::write(td.path().join("references/guide.md"), "Use the API carefully.\n").unwrap();
        let content = content_in(td.path(), Vec::new());

        let text = SkillExecutor::default().reference_text(&content).unwrap();
        assert!(text.starts_with("# References for demo skill"));
        assert!(text.contains("## guide.md\n\nUse the API carefully."));
    }

    #[test]
    fn test_reference_text_unreadable() {
        let td = TempDir::new().unwrap();
        let content = content_in(td.path(), Vec::new());
        assert!(matches!(
            SkillExecutor::default().reference_text(&content),
            Err(SkillError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_accessor_tools() {
        let td = TempDir::new().unwrap();
        fs::create_dir_all(td.path().join("references")).unwrap();
        fs::write(td.path().join("references/guide.md"), "guide body").unwrap();
        let content = content_in(td.path(), Vec::new());
        let tools = SkillExecutor::default().materialize(&content);
        let tool = |name: &str| tools.iter().find(|t| t.name == name).unwrap();

        let out = tool("demo_instructions").invoke(ToolArguments::new()).await.unwrap();
        assert_eq!(out, "Follow the steps.");

        let mut args = ToolArguments::new();
        args.insert("filename".into(), "guide.md".into());
        let out = tool("demo_read_reference").invoke(args).await.unwrap();
        assert_eq!(out, "guide body");

        let mut args = ToolArguments::new();
        args.insert("filename".into(), "nope.md".into());
        let err = tool("demo_read_reference").invoke(args).await.unwrap_err();
        assert!(err.to_string().contains("Available references: guide.md"));

        let mut args = ToolArguments::new();
        args.insert("pattern".into(), "*.ttf".into());
        let out = tool("demo_list_assets").invoke(args).await.unwrap();
        assert!(out.contains("fonts/main.ttf"));
        assert!(!out.contains("logo.png"));
    }

    #[test]
    fn test_normalize_relative_path() {
        assert_eq!(
            normalize_relative_path("./a/b.md").unwrap(),
            PathBuf::from("a/b.md")
        );
        assert!(normalize_relative_path("/etc/passwd").is_err());
        assert!(normalize_relative_path("a/../../b").is_err());
        assert!(normalize_relative_path("  ").is_err());
    }
}
