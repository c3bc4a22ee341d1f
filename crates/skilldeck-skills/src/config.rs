//! Configuration types for the skills system

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Skills system configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SkillsConfig {
    /// Skill roots, scanned in order. A leading `~` is expanded to the home directory.
    #[serde(default)]
    pub directories: Vec<String>,

    /// Ranking knobs
    #[serde(default)]
    pub matcher: MatcherConfig,

    /// Script execution knobs
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// When a query may activate a skill without being asked to
    #[serde(default)]
    pub auto_activation: AutoActivationPolicy,
}

impl SkillsConfig {
    /// Configured directories with `~` expanded
    #[must_use]
    pub fn expanded_directories(&self) -> Vec<PathBuf> {
        self.directories.iter().map(|d| expand_tilde(d)).collect()
    }
}

/// Expand a leading `~` to the home directory
#[must_use]
pub fn expand_tilde(dir: &str) -> PathBuf {
    if let Some(rest) = dir.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches(['/', '\\']));
        }
    }
    PathBuf::from(dir)
}

/// Matcher configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MatcherConfig {
    /// Maximum number of candidates returned
    pub top_k: usize,
    /// Candidates scoring at or below this are dropped
    pub min_score: f64,
    /// Added when the identifier appears verbatim in the query
    pub name_bonus: f64,
    /// Added per action family shared by query and description
    pub action_bonus: f64,
    /// Added per domain indicator shared by query and skill
    pub indicator_bonus: f64,
    /// Domain indicator → trigger phrases
    pub indicators: BTreeMap<String, Vec<String>>,
    /// Action family → word variants
    pub actions: BTreeMap<String, Vec<String>>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_score: 0.0,
            name_bonus: 10.0,
            action_bonus: 5.0,
            indicator_bonus: 8.0,
            indicators: table(&[
                ("mcp", &["mcp", "model context protocol", "mcp server"]),
                ("pdf", &["pdf", "document"]),
                ("excel", &["excel", "xlsx", "spreadsheet"]),
                ("powerpoint", &["powerpoint", "pptx", "presentation", "slides"]),
                ("word", &["word", "docx", "document"]),
                ("web", &["web", "webapp", "website", "browser", "localhost"]),
                ("skill", &["skill", "create skill", "new skill"]),
                ("test", &["test", "testing", "playwright"]),
                ("brand", &["brand", "branding", "guidelines"]),
                ("design", &["design", "ui", "frontend"]),
                ("art", &["art", "artistic", "generative"]),
                ("gif", &["gif", "animation"]),
                ("slack", &["slack"]),
            ]),
            actions: table(&[
                ("create", &["creating", "create", "creates", "build", "generate"]),
                ("test", &["test", "testing", "tests", "verify", "check"]),
                ("analyze", &["analyze", "analysis", "examine"]),
                ("process", &["process", "processing", "handle"]),
                ("extract", &["extract", "extraction", "parse"]),
                ("convert", &["convert", "conversion", "transform"]),
                ("edit", &["edit", "editing", "modify", "update"]),
                ("search", &["search", "find", "look"]),
                ("design", &["design", "designing", "layout"]),
            ]),
        }
    }
}

fn table(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.iter().map(|s| (*s).to_string()).collect()))
        .collect()
}

/// Script execution configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Wall-clock budget per invocation in seconds
    pub timeout_secs: u64,
    /// Captured stdout/stderr beyond this many bytes is cut
    pub max_output_bytes: usize,
    /// Interpreter for `.py` scripts
    pub python: String,
    /// Interpreter for `.js` scripts
    pub node: String,
    /// Interpreter for `.sh` scripts
    pub shell: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            max_output_bytes: 32 * 1024,
            python: "python3".into(),
            node: "node".into(),
            shell: "bash".into(),
        }
    }
}

impl ExecutorConfig {
    /// Invocation timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Policy for activating the top match of a query without an explicit request
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AutoActivationPolicy {
    /// Off unless turned on
    pub enabled: bool,
    /// Top score must reach this
    pub min_score: f64,
    /// Top score must lead the runner-up by this much
    pub min_margin: f64,
}

impl Default for AutoActivationPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            min_score: 10.0,
            min_margin: 2.0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SkillsConfig::default();
        assert!(config.directories.is_empty());
        assert_eq!(config.matcher.top_k, 3);
        assert_eq!(config.executor.timeout(), Duration::from_secs(300));
        assert!(!config.auto_activation.enabled);
        assert!(config.matcher.indicators.contains_key("mcp"));
    }

    #[test]
    fn test_toml_partial_override() {
        let toml_str = r#"
            directories = ["./skills", "/opt/skills"]

            [matcher]
            top_k = 5

            [matcher.indicators]
            terraform = ["terraform", "hcl"]

            [executor]
            timeout_secs = 30
            python = "/usr/bin/python3.12"

            [auto_activation]
            enabled = true
        "#;

        let config: SkillsConfig = toml::from_str(toml_str).expect("Failed to parse TOML");
        assert_eq!(config.directories.len(), 2);
        assert_eq!(config.matcher.top_k, 5);
        assert!((config.matcher.name_bonus - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.matcher.indicators.len(), 1);
        assert_eq!(config.executor.timeout_secs, 30);
        assert_eq!(config.executor.shell, "bash");
        assert!(config.auto_activation.enabled);
        assert!((config.auto_activation.min_margin - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/opt/skills"), PathBuf::from("/opt/skills"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/.skilldeck/skills"), home.join(".skilldeck/skills"));
        }
    }
}
