mod config;
mod journal;
mod server;
mod version;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::info;

use crate::{
    config::{open_config, write_default_config},
    server::AppState,
    version::{BUILD_INFO, short_version},
};

#[derive(Parser)]
#[command(version = short_version())]
struct Args {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    if args.init {
        write_default_config(&args.config)?;
        info!(path = ?args.config, "Created default configuration");
        return Ok(());
    }

    info!(
        version = BUILD_INFO.version,
        git_sha = BUILD_INFO.git_sha,
        build_date = BUILD_INFO.build_date,
        target = BUILD_INFO.target,
        "daybook version"
    );

    let mut config = open_config(&args.config).context("Failed to load configuration")?;
    config
        .apply_env_overrides(|key| std::env::var(key).ok())
        .context("Failed to apply environment overrides")?;
    config.validate().context("Invalid configuration")?;
    info!(
        authors = config.authors.len(),
        timezone = %config.site.timezone,
        sanity = config.sanity.is_configured(),
        cache_ttl = %humantime::format_duration(config.sanity.cache_ttl),
        "Configuration loaded"
    );

    let state = Arc::new(AppState::from_config(&config)?);
    info!(
        reads = state.reader.is_configured(),
        writes = state.writer.is_some(),
        "Content store ready"
    );
    server::serve(state, &config.server).await
}
