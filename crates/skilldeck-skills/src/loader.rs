//! Skill loader
//!
//! Implements progressive disclosure architecture:
//! - Phase 1: Scan directories and load metadata only
//! - Phase 2: Load full skill content on demand, cached in the [`DescriptorStore`]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{DiscoveryWarning, Result, SkillError};
use crate::skill::{SkillContent, SkillMetadata, MANIFEST_FILE};
use crate::store::{Catalog, DescriptorStore};

/// Outcome of a discovery pass
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Valid skills, keyed by identifier
    pub catalog: Catalog,
    /// Everything that was skipped and why
    pub warnings: Vec<DiscoveryWarning>,
}

/// Walks skill roots and fills a [`DescriptorStore`]
#[derive(Debug)]
pub struct SkillLoader {
    /// Skills directories to scan, in priority order
    directories: Vec<PathBuf>,
    store: Arc<DescriptorStore>,
}

impl SkillLoader {
    /// Create a loader with its own empty store
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(Arc::new(DescriptorStore::new()))
    }

    /// Create a loader writing into an existing store
    #[must_use]
    pub fn with_store(store: Arc<DescriptorStore>) -> Self {
        Self {
            directories: Vec::new(),
            store,
        }
    }

    /// Add a skills directory to scan
    #[must_use]
    pub fn add_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directories.push(dir.into());
        self
    }

    /// Add personal skills directory: ~/.skilldeck/skills/
    #[must_use]
    pub fn with_personal_skills(self) -> Self {
        if let Some(home) = dirs::home_dir() {
            self.add_directory(home.join(".skilldeck").join("skills"))
        } else {
            warn!("Could not find home directory for personal skills");
            self
        }
    }

    /// Add project skills directory: ./.skilldeck/skills/
    #[must_use]
    pub fn with_project_skills(self) -> Self {
        self.add_directory(PathBuf::from(".skilldeck/skills"))
    }

    /// The store this loader writes into
    #[must_use]
    pub fn store(&self) -> &Arc<DescriptorStore> {
        &self.store
    }

    /// Configured directories
    #[must_use]
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Scan all configured directories and replace the catalog (Phase 1: Discovery).
    ///
    /// Never fails: unreadable roots and invalid skills end up as warnings.
    /// Any cached content is dropped.
    pub fn discover(&self) -> DiscoveryReport {
        info!(
            "Starting skills discovery in {} directories",
            self.directories.len()
        );

        let mut report = DiscoveryReport::default();
        let mut origins: BTreeMap<String, PathBuf> = BTreeMap::new();

        for dir in &self.directories {
            if !dir.exists() {
                debug!("Skills directory does not exist: {:?}", dir);
                continue;
            }

            if !dir.is_dir() {
                warn!("Skills path is not a directory: {:?}", dir);
                continue;
            }

            // Absolute roots keep script paths valid whatever the child's working directory
            let root = dir.canonicalize().unwrap_or_else(|_| dir.clone());
            scan_directory(&root, &mut report, &mut origins);
        }

        for warning in &report.warnings {
            warn!("{}", warning);
        }

        self.store.replace_catalog(report.catalog.values().cloned());
        info!("Discovered {} skills", report.catalog.len());
        report
    }

    /// Load full content for a skill (Phase 2: Activation). Cached after the first call.
    ///
    /// # Errors
    /// [`SkillError::NotFound`] for identifiers outside the catalog, [`SkillError::Io`]
    /// or [`SkillError::Parse`] when the manifest changed into something unreadable.
    pub fn load_full(&self, name: &str) -> Result<Arc<SkillContent>> {
        self.store.content_or_load(name, |metadata| {
            debug!("Loading full content for skill '{}'", metadata.name);
            SkillContent::load(metadata)
        })
    }

    /// Drop the cached content of one skill and read it from disk again
    ///
    /// # Errors
    /// Same as [`SkillLoader::load_full`].
    pub fn reload(&self, name: &str) -> Result<Arc<SkillContent>> {
        if !self.store.contains(name) {
            return Err(SkillError::NotFound {
                name: name.to_string(),
            });
        }
        self.store.invalidate(name);
        self.load_full(name)
    }
}

impl Default for SkillLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan a single root. Subdirectories are visited in lexicographic order so that
/// duplicate resolution is reproducible.
fn scan_directory(dir: &Path, report: &mut DiscoveryReport, origins: &mut BTreeMap<String, PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            report.warnings.push(DiscoveryWarning::Parse {
                path: dir.to_path_buf(),
                reason: format!("failed to read directory: {e}"),
            });
            return;
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    paths.sort();

    for path in paths {
        if !path.join(MANIFEST_FILE).is_file() {
            debug!("Skipping {:?}: no {}", path, MANIFEST_FILE);
            continue;
        }

        match SkillMetadata::from_dir(&path) {
            Ok(metadata) => {
                let name = metadata.name.clone();
                if let Some(kept) = origins.get(&name) {
                    report.warnings.push(DiscoveryWarning::DuplicateIdentifier {
                        name,
                        path,
                        kept: kept.clone(),
                    });
                    continue;
                }
                debug!("Discovered skill: {} at {:?}", name, path);
                origins.insert(name.clone(), path);
                report.catalog.insert(name, Arc::new(metadata));
            }
            Err(e) => {
                let reason = match e {
                    SkillError::Parse { reason, .. } => reason,
                    other => other.to_string(),
                };
                report.warnings.push(DiscoveryWarning::Parse { path, reason });
            }
        }
    }
}
