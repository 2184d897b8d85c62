//! feedwatch CLI
//!
//! Polls the configured listing feeds once and reports new entries to chat.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use feedwatch::{
    error::{AppError, Result},
    models::{Config, Topic},
    pipeline::Orchestrator,
    services::{HttpPageSource, TelegramTransport},
    storage::{IdStore, LocalStorage},
    utils::http,
};

/// feedwatch - Listing Feed Watcher
#[derive(Parser, Debug)]
#[command(
    name = "feedwatch",
    version,
    about = "Watch listing feeds and announce new entries"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "feedwatch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll every enabled topic once
    Run {
        /// Only poll the named topic (repeatable)
        #[arg(long = "topic")]
        topics: Vec<String>,
    },

    /// Validate the configuration file
    Validate,

    /// Show stored state per topic
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Load the configuration for `command`.
///
/// Only `info` tolerates a missing or broken file; polling or validating
/// defaults would silently do nothing.
fn load_config(path: &Path, command: &Command) -> Result<Config> {
    match command {
        Command::Info => Ok(Config::load_or_default(path)),
        _ => Config::load(path)
            .map_err(|e| AppError::config(format!("cannot load {}: {e}", path.display()))),
    }
}

/// Pick the topics to poll: all of them, or only the requested names.
fn select_topics(config: &Config, requested: &[String]) -> Result<Vec<Topic>> {
    if requested.is_empty() {
        return Ok(config.projects.clone());
    }

    let unknown: Vec<&str> = requested
        .iter()
        .filter(|name| !config.projects.iter().any(|t| &t.topic == *name))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(AppError::config(format!(
            "unknown topic(s): {}",
            unknown.join(", ")
        )));
    }

    Ok(config
        .projects
        .iter()
        .filter(|t| requested.contains(&t.topic))
        .cloned()
        .collect())
}

async fn run(config: &Config, requested: &[String]) -> Result<()> {
    let topics = select_topics(config, requested)?;
    if topics.iter().all(|t| t.disabled) {
        log::warn!("No enabled topics to poll");
        return Ok(());
    }

    let credentials = config.telegram.credentials()?;

    let page_client = http::create_async_client(&config.crawler)?;
    let api_client = http::create_api_client(&config.crawler)?;

    let source = Arc::new(HttpPageSource::new(page_client, config.extract.clone())?);
    let transport = Arc::new(TelegramTransport::new(
        api_client,
        &config.telegram.api_base,
        &credentials.bot_token,
    ));
    let store = Arc::new(LocalStorage::new(&config.storage.dir));

    let orchestrator =
        Orchestrator::from_config(config, source, store, transport, credentials.chat_id);

    let summary = orchestrator.run(&topics).await;
    summary.log();
    summary.into_result()?;
    Ok(())
}

async fn info(config: &Config) -> Result<()> {
    let store = LocalStorage::new(&config.storage.dir);
    log::info!("State directory: {}", store.root_dir().display());

    if config.projects.is_empty() {
        log::info!("No topics configured.");
    }

    for topic in &config.projects {
        let status = match store.load(&topic.topic).await {
            Ok(Some(ids)) => format!("{} stored id(s)", ids.len()),
            Ok(None) => "no state".to_string(),
            Err(e) => format!("unreadable state ({e})"),
        };
        let disabled = if topic.disabled { " [disabled]" } else { "" };
        log::info!(
            "{}{}: {} pages, {}",
            topic.topic,
            disabled,
            topic.pages_to_scan(config.default_pages),
            status
        );
    }
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("feedwatch starting...");

    let config = load_config(&cli.config, &cli.command)?;
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Run { topics } => {
            config.validate()?;
            run(&config, &topics).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} topic(s), {} enabled)",
                config.projects.len(),
                config.active_projects().count()
            );
        }

        Command::Info => info(&config).await?,
    }

    log::info!("Done!");

    Ok(())
}
