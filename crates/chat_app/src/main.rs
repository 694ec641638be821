mod app;
mod cli;
mod config;
mod effects;
mod render;

use anyhow::Context;
use chat_logging::chat_info;
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let mut config = config::load_config(&cli.config)
        .with_context(|| format!("loading configuration from {:?}", cli.config))?;
    config.apply_cli(&cli);

    chat_logging::initialize(&config.log_settings()?);
    chat_info!(
        "chat_app starting: mode={} endpoint={}",
        config.mode,
        config.endpoint
    );

    app::run(&config)
}
