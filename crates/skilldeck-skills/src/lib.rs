//! `SkillDeck` Skills Registry
//!
//! Capability registry implementing progressive disclosure: an agent sees a compact
//! catalog of skills, and a skill's instructions and tools only enter the session
//! once it is activated.
//!
//! ## Features
//!
//! - YAML frontmatter manifests (`SKILL.md`) with `name`, `description` and optional extras
//! - Multiple skills directories, first-discovered-wins on duplicate identifiers
//! - Keyword ranking of skills against free-text requests, with pluggable strategies
//! - Script tools run as bounded subprocesses, plus instruction, reference and asset accessors
//! - Per-session activation with at-most-once, all-or-nothing tool registration
//!
//! ## Architecture
//!
//! Phase 1 (Discovery): scan roots, keep only name and description per skill
//! Phase 2 (Activation): load full content, materialize tools, register them
//! Phase 3 (Execution): the agent invokes tools, reads references and assets on demand

#![deny(unsafe_code, dead_code, unused_imports, unused_variables, missing_docs)]

pub mod activation;
pub mod config;
pub mod error;
pub mod executor;
pub mod loader;
mod management;
pub mod matcher;
pub mod runtime;
pub mod skill;
pub mod store;

pub use activation::{Activation, ActivationController};
pub use config::{AutoActivationPolicy, ExecutorConfig, MatcherConfig, SkillsConfig};
pub use error::{DiscoveryWarning, InvocationError, Result, SkillError};
pub use executor::{SkillExecutor, ToolArguments, ToolDescriptor, ToolHandler, ToolResult};
pub use loader::{DiscoveryReport, SkillLoader};
pub use matcher::{KeywordScorer, RankedSkill, ScoringStrategy, SkillMatcher};
pub use runtime::{InMemoryToolTable, ToolRuntime};
pub use skill::{SkillContent, SkillMetadata};
pub use store::{Catalog, CatalogSummary, DescriptorStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ActivationController, InMemoryToolTable, SkillExecutor, SkillLoader, SkillMatcher,
        SkillsConfig, ToolRuntime,
    };
}
