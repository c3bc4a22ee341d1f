//! Skill definition and parsing
//!
//! Each skill is a folder containing SKILL.md with YAML frontmatter, plus optional
//! `scripts/`, `references/` and `assets/` directories.

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Result, SkillError};

/// Manifest file expected in every skill directory
pub const MANIFEST_FILE: &str = "SKILL.md";
/// Directory holding executable scripts
pub const SCRIPTS_DIR: &str = "scripts";
/// Directory holding reference documents
pub const REFERENCES_DIR: &str = "references";
/// Directory holding static assets
pub const ASSETS_DIR: &str = "assets";

/// Maximum allowed name length
const MAX_NAME_LENGTH: usize = 64;
/// Maximum allowed description length
const MAX_DESCRIPTION_LENGTH: usize = 1024;

/// Raw frontmatter. Every field is optional so a missing key can be reported by name.
#[derive(Debug, Default, Deserialize)]
struct Frontmatter {
    name: Option<String>,
    description: Option<String>,
    license: Option<String>,
    compatibility: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, serde_yaml::Value>,
}

/// Skill metadata extracted from YAML frontmatter (Phase 1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillMetadata {
    /// Skill identifier, equal to the directory name
    pub name: String,
    /// What the skill does and when to use it
    pub description: String,
    /// Optional license tag
    pub license: Option<String>,
    /// Optional compatibility note
    pub compatibility: Option<String>,
    /// Free-form extra metadata
    pub metadata: BTreeMap<String, String>,
    /// Skill directory
    pub path: PathBuf,
}

impl SkillMetadata {
    /// Load only metadata from a directory. The body is not kept.
    ///
    /// # Errors
    /// [`SkillError::Io`] if the manifest is unreadable, [`SkillError::Parse`] if the
    /// header is malformed, misses a required field, or its name differs from the
    /// directory name.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let skill_file = dir.join(MANIFEST_FILE);
        let content = fs::read_to_string(&skill_file).map_err(|e| SkillError::io(&skill_file, e))?;
        let (frontmatter, _) = split_manifest(&content, &skill_file)?;
        let frontmatter: Frontmatter = parse_frontmatter(frontmatter, &skill_file)?;

        let metadata = Self::from_frontmatter(frontmatter, dir, &skill_file)?;
        validate_metadata(&metadata, &skill_file)?;
        Ok(metadata)
    }

    fn from_frontmatter(frontmatter: Frontmatter, dir: &Path, skill_file: &Path) -> Result<Self> {
        let parse_error = |reason: String| SkillError::Parse {
            path: skill_file.to_path_buf(),
            reason,
        };

        let name = frontmatter
            .name
            .map(|n| n.trim().to_string())
            .ok_or_else(|| parse_error("missing required 'name' field".into()))?;
        let description = frontmatter
            .description
            .map(|d| d.trim().to_string())
            .ok_or_else(|| parse_error("missing required 'description' field".into()))?;

        let dir_name = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name != dir_name {
            return Err(parse_error(format!(
                "declared name '{name}' does not match directory name '{dir_name}'"
            )));
        }

        let metadata = frontmatter
            .metadata
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    serde_yaml::Value::String(s) => s,
                    other => serde_yaml::to_string(&other)
                        .map(|s| s.trim().to_string())
                        .unwrap_or_default(),
                };
                (k, v)
            })
            .collect();

        Ok(Self {
            name,
            description,
            license: frontmatter.license,
            compatibility: frontmatter.compatibility,
            metadata,
            path: dir.to_path_buf(),
        })
    }

    /// Path of the manifest file
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    /// Generate a concise summary for LLM system prompt
    /// Format: "- {name}: {description}"
    #[must_use]
    pub fn to_summary(&self) -> String {
        format!("- {}: {}", self.name, self.description)
    }
}

/// How a script is launched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptRuntime {
    /// `.py`, run with the configured Python interpreter
    Python,
    /// `.sh`, run with the configured shell
    Shell,
    /// `.js` / `.mjs`, run with the configured Node binary
    Node,
    /// Any other file with the executable bit set, run directly
    Executable,
}

impl ScriptRuntime {
    /// Infer the runtime from extension, then from the executable bit
    #[must_use]
    pub fn infer(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") => Some(Self::Python),
            Some("sh" | "bash") => Some(Self::Shell),
            Some("js" | "mjs") => Some(Self::Node),
            _ if is_executable(path) => Some(Self::Executable),
            _ => None,
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("exe")
}

/// A script found under `scripts/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptResource {
    /// Path relative to the skill directory, e.g. `scripts/convert.py`
    pub relative_path: PathBuf,
    /// Invocation signature
    pub runtime: ScriptRuntime,
    /// First line of the script's leading comment or docstring
    pub help: Option<String>,
}

impl ScriptResource {
    /// File stem, used to name the generated tool
    #[must_use]
    pub fn stem(&self) -> &str {
        self.relative_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }
}

/// Full skill content (Phase 2). Immutable once built.
#[derive(Debug, Clone)]
pub struct SkillContent {
    /// Metadata this content was built from
    pub metadata: Arc<SkillMetadata>,
    /// Manifest body, the agent-facing instructions
    pub instructions: String,
    /// Scripts, sorted by path
    pub scripts: Vec<ScriptResource>,
    /// Reference documents relative to `references/`, sorted
    pub references: Vec<PathBuf>,
    /// Assets relative to `assets/`, sorted, nested directories flattened
    pub assets: Vec<PathBuf>,
}

impl SkillContent {
    /// Read the manifest body and list the resource directories.
    ///
    /// Absent resource directories yield empty lists.
    ///
    /// # Errors
    /// [`SkillError::Io`] if anything present on disk cannot be read.
    pub fn load(metadata: Arc<SkillMetadata>) -> Result<Self> {
        let skill_file = metadata.manifest_path();
        let content = fs::read_to_string(&skill_file).map_err(|e| SkillError::io(&skill_file, e))?;
        let (_, body) = split_manifest(&content, &skill_file)?;
        let instructions = body.trim().to_string();

        let scripts = list_files(&metadata.path.join(SCRIPTS_DIR), false)?
            .into_iter()
            .filter(|rel| !rel.to_string_lossy().starts_with('_'))
            .filter_map(|rel| {
                let full = metadata.path.join(SCRIPTS_DIR).join(&rel);
                let Some(runtime) = ScriptRuntime::infer(&full) else {
                    debug!("Skipping non-script file {:?}", full);
                    return None;
                };
                Some(ScriptResource {
                    help: read_script_help(&full),
                    relative_path: Path::new(SCRIPTS_DIR).join(rel),
                    runtime,
                })
            })
            .collect();

        let references = list_files(&metadata.path.join(REFERENCES_DIR), false)?;
        let assets = list_files(&metadata.path.join(ASSETS_DIR), true)?;

        Ok(Self {
            metadata,
            instructions,
            scripts,
            references,
            assets,
        })
    }

    /// Skill identifier
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Skill description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.metadata.description
    }

    /// Skill directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.metadata.path
    }

    /// `scripts/` directory (may not exist)
    #[must_use]
    pub fn scripts_dir(&self) -> PathBuf {
        self.root().join(SCRIPTS_DIR)
    }

    /// `references/` directory (may not exist)
    #[must_use]
    pub fn references_dir(&self) -> PathBuf {
        self.root().join(REFERENCES_DIR)
    }

    /// `assets/` directory (may not exist)
    #[must_use]
    pub fn assets_dir(&self) -> PathBuf {
        self.root().join(ASSETS_DIR)
    }
}

/// Split a manifest into its frontmatter block and body
fn split_manifest<'a>(content: &'a str, path: &Path) -> Result<(&'a str, &'a str)> {
    let frontmatter_re = Regex::new(r"^\u{feff}?---[ \t]*\r?\n([\s\S]*?)\r?\n---[ \t]*(?:\r?\n|$)([\s\S]*)$")
        .map_err(|e| SkillError::Parse {
            path: path.to_path_buf(),
            reason: format!("failed to compile regex: {e}"),
        })?;

    let captures = frontmatter_re
        .captures(content)
        .ok_or_else(|| SkillError::Parse {
            path: path.to_path_buf(),
            reason: "no valid YAML frontmatter found".into(),
        })?;

    let frontmatter = captures.get(1).map_or("", |m| m.as_str());
    let body = captures.get(2).map_or("", |m| m.as_str());
    Ok((frontmatter, body))
}

fn parse_frontmatter(yaml: &str, path: &Path) -> Result<Frontmatter> {
    if yaml.trim().is_empty() {
        return Ok(Frontmatter::default());
    }
    serde_yaml::from_str(yaml).map_err(|e| SkillError::Parse {
        path: path.to_path_buf(),
        reason: format!("invalid YAML frontmatter: {e}"),
    })
}

/// Validate identifier and description rules
fn validate_metadata(metadata: &SkillMetadata, path: &Path) -> Result<()> {
    let invalid = |reason: String| SkillError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    if metadata.name.is_empty() {
        return Err(invalid("skill name cannot be empty".into()));
    }

    if metadata.name.len() > MAX_NAME_LENGTH {
        warn!(
            "Skill name '{}' exceeds {} characters (was {}), may be truncated",
            metadata.name,
            MAX_NAME_LENGTH,
            metadata.name.len()
        );
    }

    // Name should be lowercase letters, numbers, and hyphens only
    let name_re = Regex::new(r"^[a-z0-9-]+$")
        .map_err(|e| invalid(format!("failed to compile name validation regex: {e}")))?;

    if !name_re.is_match(&metadata.name) {
        return Err(invalid(format!(
            "skill name '{}' must contain only lowercase letters, numbers, and hyphens",
            metadata.name
        )));
    }

    if metadata.description.is_empty() {
        return Err(invalid("skill description cannot be empty".into()));
    }

    if metadata.description.len() > MAX_DESCRIPTION_LENGTH {
        warn!(
            "Skill '{}' description exceeds {} characters (was {}), may be truncated",
            metadata.name,
            MAX_DESCRIPTION_LENGTH,
            metadata.description.len()
        );
    }

    Ok(())
}

/// List files under `dir` as sorted paths relative to it. Dotfiles are ignored.
fn list_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if dir.is_dir() {
        collect_files(dir, Path::new(""), recursive, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, prefix: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| SkillError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| SkillError::io(dir, e))?;
        let file_name = entry.file_name();
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        let rel = prefix.join(&file_name);
        if path.is_dir() {
            if recursive {
                collect_files(&path, &rel, recursive, out)?;
            }
        } else {
            out.push(rel);
        }
    }
    Ok(())
}

/// Pull a one-line help text out of a script without running it.
///
/// Looks at a Python module docstring or the first comment line after the shebang.
fn read_script_help(path: &Path) -> Option<String> {
    let source = fs::read_to_string(path).ok()?;
    let mut lines = source.lines().map(str::trim).filter(|l| !l.is_empty());
    let mut line = lines.next()?;
    if line.starts_with("#!") {
        line = lines.next()?;
    }

    for quote in ["\"\"\"", "'''"] {
        if let Some(rest) = line.strip_prefix(quote) {
            let first = rest.trim_end_matches(quote).trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
            return lines
                .next()
                .map(|l| l.trim_end_matches(quote).trim().to_string())
                .filter(|l| !l.is_empty());
        }
    }

    for marker in ["#", "//"] {
        if let Some(rest) = line.strip_prefix(marker) {
            let text = rest.trim_start_matches(['#', '/']).trim();
            if !text.is_empty() && !text.starts_with("-*-") {
                return Some(text.to_string());
            }
        }
    }
    None
}
