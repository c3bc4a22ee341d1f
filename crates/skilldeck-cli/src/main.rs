mod args;
mod config;
mod service;

use anyhow::Result;
use args::Cli;
use clap::Parser;
use config::Config;
use service::SkillDeckService;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load()?;
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    skilldeck_logging::init_logging(level, config.logging.format)?;

    let service = SkillDeckService::start(&config, cli.skills_dirs)?;
    let result = service.execute(cli.command).await;
    service.shutdown().await?;

    println!("{}", result?);
    Ok(())
}
