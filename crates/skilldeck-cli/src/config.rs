use serde::Deserialize;
use skilldeck_logging::LogFormat;
use skilldeck_skills::SkillsConfig;
use std::env;
use std::path::PathBuf;

/// Built-in defaults, the lowest configuration layer
const DEFAULT_CONFIG: &str = r#"
[skills]
directories = ["~/.skilldeck/skills", ".skilldeck/skills"]

[skills.executor]
timeout_secs = 300

[logging]
level = "warn"  # trace, debug, info, warn, error
format = "plain"  # or "json"
"#;

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub skills: SkillsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Get the global config path: ~/.skilldeck/skilldeck.toml
    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".skilldeck").join("skilldeck.toml"))
    }

    /// Load configuration with layered approach:
    /// 1. Built-in defaults
    /// 2. Global config: ~/.skilldeck/skilldeck.toml (optional)
    /// 3. Local override: ./skilldeck.toml (optional)
    /// 4. Environment variables (highest priority)
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file from current directory
        dotenvy::dotenv().ok();

        let mut config_builder = config::Config::builder().add_source(config::File::from_str(
            DEFAULT_CONFIG,
            config::FileFormat::Toml,
        ));

        if let Some(global) = Self::global_config_path() {
            config_builder = config_builder.add_source(config::File::from(global).required(false));
        }

        config_builder = config_builder
            .add_source(config::File::with_name("skilldeck").required(false))
            // Environment variables with SKILLDECK__ prefix, e.g. SKILLDECK__SKILLS__EXECUTOR__TIMEOUT_SECS
            .add_source(config::Environment::with_prefix("SKILLDECK").separator("__"));

        // Convenience override: a PATH-style list of skill roots
        if let Ok(dirs) = env::var("SKILLDECK_SKILLS_DIR") {
            let dirs: Vec<String> = env::split_paths(&dirs)
                .map(|p| p.display().to_string())
                .collect();
            config_builder = config_builder.set_override("skills.directories", dirs)?;
        }

        let config: Self = config_builder.build()?.try_deserialize()?;
        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn layered(local: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from_str(local, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_config_parses() {
        let config = layered("");
        assert_eq!(config.skills.directories.len(), 2);
        assert_eq!(config.skills.executor.timeout_secs, 300);
        assert_eq!(config.skills.matcher.top_k, 3);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Plain);
    }

    #[test]
    fn test_local_layer_overrides_defaults() {
        let config = layered(
            r#"
            [skills]
            directories = ["/srv/skills"]

            [skills.auto_activation]
            enabled = true

            [logging]
            format = "json"
            "#,
        );
        assert_eq!(config.skills.directories, vec!["/srv/skills"]);
        assert!(config.skills.auto_activation.enabled);
        assert_eq!(config.skills.executor.timeout_secs, 300);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Json);
    }
}
