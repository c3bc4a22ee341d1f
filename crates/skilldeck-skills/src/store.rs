//! Descriptor store: identifier → metadata, with full content materialized lazily
//!
//! The loader is the only writer of the catalog. Content slots are filled at most once
//! per identifier until explicitly invalidated; every reader gets the same `Arc`.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::{Result, SkillError};
use crate::skill::{SkillContent, SkillMetadata};

/// Snapshot of all discovered skills, keyed (and therefore ordered) by identifier
pub type Catalog = BTreeMap<String, Arc<SkillMetadata>>;

#[derive(Debug)]
struct StoreEntry {
    metadata: Arc<SkillMetadata>,
    content: Mutex<Option<Arc<SkillContent>>>,
}

/// In-memory mapping of skill identifier → lazily loaded descriptor
#[derive(Debug, Default)]
pub struct DescriptorStore {
    entries: RwLock<BTreeMap<String, Arc<StoreEntry>>>,
}

impl DescriptorStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly discovered catalog. All cached content is dropped.
    pub(crate) fn replace_catalog(&self, catalog: impl IntoIterator<Item = Arc<SkillMetadata>>) {
        let entries = catalog
            .into_iter()
            .map(|metadata| {
                let entry = StoreEntry {
                    metadata,
                    content: Mutex::new(None),
                };
                (entry.metadata.name.clone(), Arc::new(entry))
            })
            .collect();

        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = entries;
    }

    fn entry(&self, name: &str) -> Option<Arc<StoreEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Get metadata by identifier
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<SkillMetadata>> {
        self.entry(name).map(|e| Arc::clone(&e.metadata))
    }

    /// Check if an identifier is in the catalog
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Find an identifier case-insensitively
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(name) {
            return Some(name.to_string());
        }
        entries
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name.trim()))
            .cloned()
    }

    /// All identifiers, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Number of skills
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the catalog for matching
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, e)| (k.clone(), Arc::clone(&e.metadata)))
            .collect()
    }

    /// Return cached content, building it with `load` on first access.
    ///
    /// Only the slot of `name` is locked while `load` runs, so concurrent first
    /// accesses to one skill build it once and different skills do not wait on each other.
    ///
    /// # Errors
    /// [`SkillError::NotFound`] for unknown identifiers, otherwise whatever `load` returns.
    /// A failed load leaves the slot empty.
    pub fn content_or_load<F>(&self, name: &str, load: F) -> Result<Arc<SkillContent>>
    where
        F: FnOnce(Arc<SkillMetadata>) -> Result<SkillContent>,
    {
        let entry = self.entry(name).ok_or_else(|| SkillError::NotFound {
            name: name.to_string(),
        })?;

        let mut slot = entry.content.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(content) = slot.as_ref() {
            return Ok(Arc::clone(content));
        }

        let content = Arc::new(load(Arc::clone(&entry.metadata))?);
        *slot = Some(Arc::clone(&content));
        Ok(content)
    }

    /// Cached content, if it has been loaded
    #[must_use]
    pub fn cached(&self, name: &str) -> Option<Arc<SkillContent>> {
        self.entry(name)?
            .content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop cached content for one identifier. Returns whether anything was cached.
    pub fn invalidate(&self, name: &str) -> bool {
        self.entry(name).is_some_and(|e| {
            e.content
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .is_some()
        })
    }

    /// Listing of identifiers and descriptions, cheap enough for an initial prompt
    #[must_use]
    pub fn summary(&self) -> CatalogSummary {
        CatalogSummary::from_catalog(&self.catalog())
    }
}

/// One line of the catalog summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillSummary {
    /// Skill identifier
    pub name: String,
    /// Skill description
    pub description: String,
    /// License tag, if declared
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

/// Identifiers and descriptions only, no bodies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    /// Skills sorted by identifier
    pub skills: Vec<SkillSummary>,
}

impl CatalogSummary {
    /// Build from a catalog snapshot
    #[must_use]
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let skills = catalog
            .values()
            .map(|m| SkillSummary {
                name: m.name.clone(),
                description: m.description.clone(),
                license: m.license.clone(),
            })
            .collect();
        Self { skills }
    }

    /// Generate skills list for LLM system prompt
    /// Format:
    /// Available skills (call `activate_skill` with the skill name):
    /// - skill-name: Description of what this skill does and when to use it
    #[must_use]
    pub fn to_prompt(&self) -> String {
        if self.skills.is_empty() {
            return String::new();
        }

        let mut prompt = String::from("Available skills (call activate_skill with the skill name):\n");
        for skill in &self.skills {
            prompt.push_str(&format!("- {}: {}\n", skill.name, skill.description));
        }
        prompt
    }

    /// Tagged block for agents that expect structured skill listings
    #[must_use]
    pub fn to_xml(&self) -> String {
        if self.skills.is_empty() {
            return "<available_skills>\nNo skills available.\n</available_skills>".to_string();
        }

        let mut lines = vec![
            "<available_skills>".to_string(),
            "The following skills are available. To use a skill, call the activate_skill tool with the skill name.".to_string(),
            String::new(),
        ];
        for skill in &self.skills {
            lines.push("<skill>".to_string());
            lines.push(format!("  <name>{}</name>", skill.name));
            lines.push(format!("  <description>{}</description>", skill.description));
            if let Some(license) = &skill.license {
                lines.push(format!("  <license>{license}</license>"));
            }
            lines.push("</skill>".to_string());
            lines.push(String::new());
        }
        lines.push("</available_skills>".to_string());
        lines.join("\n")
    }

    /// JSON listing
    ///
    /// # Errors
    /// Propagates serialization failures from `serde_json`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn metadata(name: &str, description: &str) -> Arc<SkillMetadata> {
        Arc::new(SkillMetadata {
            name: name.to_string(),
            description: description.to_string(),
            license: None,
            compatibility: None,
            metadata: BTreeMap::new(),
            path: PathBuf::from(name),
        })
    }

    fn content(metadata: Arc<SkillMetadata>) -> SkillContent {
        SkillContent {
            metadata,
            instructions: "do it".into(),
            scripts: Vec::new(),
            references: Vec::new(),
            assets: Vec::new(),
        }
    }

    #[test]
    fn test_store_new() {
        let store = DescriptorStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(store.summary().to_prompt().is_empty());
    }

    #[test]
    fn test_content_is_loaded_once() {
        let store = DescriptorStore::new();
        store.replace_catalog([metadata("pdf", "PDF tools")]);
        let calls = AtomicUsize::new(0);

        let load = |m: Arc<SkillMetadata>| -> Result<SkillContent> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(content(m))
        };
        let first = store.content_or_load("pdf", load).unwrap();
        let second = store.content_or_load("pdf", load).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(store.invalidate("pdf"));
        let third = store.content_or_load("pdf", load).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_identifier() {
        let store = DescriptorStore::new();
        let err = store.content_or_load("nope", |m| Ok(content(m))).unwrap_err();
        assert!(matches!(err, SkillError::NotFound { .. }));
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let store = DescriptorStore::new();
        store.replace_catalog([metadata("mcp-builder", "MCP")]);
        assert_eq!(store.resolve("MCP-Builder").as_deref(), Some("mcp-builder"));
        assert_eq!(store.resolve("other"), None);
    }

    #[test]
    fn test_summary_formats() {
        let store = DescriptorStore::new();
        store.replace_catalog([metadata("b-skill", "Second"), metadata("a-skill", "First")]);
        let summary = store.summary();

        assert_eq!(summary.skills[0].name, "a-skill");
        let prompt = summary.to_prompt();
        assert!(prompt.contains("- a-skill: First\n- b-skill: Second"));
        assert!(summary.to_xml().contains("<name>b-skill</name>"));

        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["skills"][1]["description"], "Second");
        assert!(json["skills"][0].get("license").is_none());
    }
}
