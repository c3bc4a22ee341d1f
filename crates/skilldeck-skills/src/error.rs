//! Error types for the skills system
//!
//! Three families, matching where a problem can surface:
//! - [`DiscoveryWarning`]: recorded while scanning, never fatal
//! - [`SkillError`]: loading, resolving and activating skills
//! - [`InvocationError`]: the failed *result* of a tool call

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Skill registry errors
#[derive(Debug, Error)]
pub enum SkillError {
    /// Identifier is not in the catalog
    #[error("Skill '{name}' not found")]
    NotFound {
        /// Requested identifier
        name: String,
    },

    /// Named asset does not exist under the skill's `assets/` directory
    #[error("Asset '{name}' not found in skill '{skill}'")]
    AssetNotFound {
        /// Skill identifier
        skill: String,
        /// Requested asset name
        name: String,
    },

    /// A file or directory could not be read
    #[error("I/O error at {path:?}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Manifest could not be parsed or is missing required fields
    #[error("Invalid manifest {path:?}: {reason}")]
    Parse {
        /// Manifest path
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },

    /// Relative path is absolute, empty or escapes its directory
    #[error("Invalid relative path '{0}'")]
    InvalidPath(String),

    /// The agent runtime refused a tool
    #[error("Failed to register tool '{tool}': {reason}")]
    Registration {
        /// Tool name
        tool: String,
        /// Reason given by the runtime
        reason: String,
    },

    /// Deactivation requested for a skill that is dormant
    #[error("Skill '{name}' is not activated")]
    NotActivated {
        /// Skill identifier
        name: String,
    },

    /// Session id was never opened (or already closed)
    #[error("Unknown session '{0}'")]
    UnknownSession(String),

    /// Session id is already open
    #[error("Session '{0}' already exists")]
    SessionExists(String),

    /// The background task reading a skill from disk was cancelled
    #[error("Loading skill '{name}' was interrupted")]
    LoadInterrupted {
        /// Skill identifier
        name: String,
    },

    /// Query did not produce a match confident enough to act on
    #[error("No skill matched '{query}' with enough confidence")]
    NoCandidate {
        /// The query that was ranked
        query: String,
    },
}

impl SkillError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, SkillError>;

/// Problems recorded during discovery. The catalog entry is skipped, discovery continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryWarning {
    /// Manifest malformed or missing required fields
    Parse {
        /// Skill directory
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },

    /// A later directory declared an identifier already in the catalog
    DuplicateIdentifier {
        /// The contested identifier
        name: String,
        /// Directory that was skipped
        path: PathBuf,
        /// Directory that keeps the identifier
        kept: PathBuf,
    },
}

impl std::fmt::Display for DiscoveryWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse { path, reason } => write!(f, "skipping {}: {reason}", path.display()),
            Self::DuplicateIdentifier { name, path, kept } => write!(
                f,
                "skipping {}: skill '{name}' already provided by {}",
                path.display(),
                kept.display()
            ),
        }
    }
}

/// Failure of a single tool invocation
#[derive(Debug, Error)]
pub enum InvocationError {
    /// Script ran past its wall-clock budget and was killed
    #[error("Tool '{tool}' timed out after {}s", timeout.as_secs())]
    Timeout {
        /// Tool name
        tool: String,
        /// Budget that was exceeded
        timeout: Duration,
    },

    /// Script exited unsuccessfully
    #[error("Tool '{tool}' failed with exit code {exit_code:?}: {stderr}")]
    Execution {
        /// Tool name
        tool: String,
        /// Exit code, `None` when killed by a signal
        exit_code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// Script could not be started
    #[error("Failed to spawn tool '{tool}': {source}")]
    Spawn {
        /// Tool name
        tool: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Arguments were rejected before anything ran
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// An accessor tool could not serve the requested resource
    #[error("{0}")]
    Resource(String),
}
