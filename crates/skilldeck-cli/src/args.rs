//! CLI argument definitions using clap
//!
//! - skilldeck list                       # Catalog with discovery warnings
//! - skilldeck summary --format xml       # Catalog block for a system prompt
//! - skilldeck suggest "fill a pdf form"  # Ranked skills for a request
//! - skilldeck run pdf split args=in.pdf  # Activate a skill and invoke one of its tools

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skilldeck")]
#[command(about = "SkillDeck - discover, match and run agent skills")]
#[command(version)]
pub struct Cli {
    /// Skills directory to scan, repeatable. Replaces the configured directories.
    #[arg(long = "skills-dir", short = 'd', global = true)]
    pub skills_dirs: Vec<PathBuf>,

    /// Log level, overrides the configured one
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List discovered skills
    List,

    /// Print the catalog summary
    Summary {
        /// Output format
        #[arg(long, value_enum, default_value = "prompt")]
        format: SummaryFormat,
    },

    /// Rank skills against a request
    Suggest {
        /// Free-text request
        query: String,
    },

    /// Show a skill's metadata, or its instructions and tools once activated
    Info {
        /// Skill identifier
        name: String,

        /// Activate the skill first
        #[arg(long)]
        activate: bool,
    },

    /// Activate the best match for a request, if the auto-activation policy allows it
    Auto {
        /// Free-text request
        query: String,
    },

    /// Print every reference document of a skill
    References {
        /// Skill identifier
        name: String,
    },

    /// Resolve an asset of a skill to its absolute path
    Asset {
        /// Skill identifier
        name: String,

        /// Asset path relative to the skill's assets directory
        asset: String,
    },

    /// Activate a skill and invoke one of its tools
    Run {
        /// Skill identifier
        skill: String,

        /// Tool name, with or without the `<skill>_` prefix
        tool: String,

        /// Tool arguments as key=value; `args=...` holds positional arguments
        #[arg(value_name = "KEY=VALUE")]
        params: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SummaryFormat {
    /// `- name: description` lines
    Prompt,
    /// `<available_skills>` block
    Xml,
    /// JSON document
    Json,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_run_parses_params() {
        let cli = Cli::try_parse_from([
            "skilldeck", "-d", "/srv/skills", "run", "pdf", "split", "args=in.pdf", "pages=1-3",
        ])
        .unwrap();
        assert_eq!(cli.skills_dirs, vec![PathBuf::from("/srv/skills")]);
        match cli.command {
            Commands::Run { skill, tool, params } => {
                assert_eq!(skill, "pdf");
                assert_eq!(tool, "split");
                assert_eq!(params, vec!["args=in.pdf", "pages=1-3"]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_summary_format() {
        let cli = Cli::try_parse_from(["skilldeck", "summary", "--format", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Summary {
                format: SummaryFormat::Json
            }
        ));
    }
}
