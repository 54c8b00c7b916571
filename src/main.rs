use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

use apns_dispatcher::apns::{ApnsClient, DryRunSender, PushSender};
use apns_dispatcher::cli::{Cli, Command};
use apns_dispatcher::config::DispatcherConfig;
use apns_dispatcher::crypto::TokenCipher;
use apns_dispatcher::dispatch::DispatchQueue;
use apns_dispatcher::news::HttpNewsSource;
use apns_dispatcher::pipeline::{AlertPolicy, EpisodeReport, NotificationPipeline};
use apns_dispatcher::registry::{RegistryClient, WatermarkStore};
use apns_dispatcher::ui;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let mut config = DispatcherConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }

    match cli.command {
        Command::Run { dry_run } => {
            config.validate()?;
            let show_progress = !cli.verbose && !cli.log_json && console::Term::stderr().is_term();
            let episode = uuid::Uuid::new_v4();

            let report = dispatch(&config, dry_run, show_progress)
                .instrument(tracing::info_span!("episode", id = %episode))
                .await?;

            ui::print_report(&report);
        }
        Command::Status => {
            let registry = RegistryClient::new(&config.registry_url, config.fetch_attempts, timeout(&config))?;
            let watermark = registry.get().await?;
            let at = chrono::DateTime::from_timestamp_millis((watermark * 1000.0) as i64)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| "out of range".to_string());
            println!("watermark: {watermark} ({at})");
        }
    }

    Ok(())
}

async fn dispatch(config: &DispatcherConfig, dry_run: bool, show_progress: bool) -> anyhow::Result<EpisodeReport> {
    tracing::info!(dry_run, concurrency = config.concurrency, "episode starting");
    if dry_run {
        return run_episode(config, DryRunSender, show_progress).await;
    }
    let credentials = config.require_apns()?;
    let client = ApnsClient::new(&credentials, config.apns.environment)?;
    run_episode(config, client, show_progress).await
}

async fn run_episode<S: PushSender + 'static>(
    config: &DispatcherConfig,
    sender: S,
    show_progress: bool,
) -> anyhow::Result<EpisodeReport> {
    let cipher = TokenCipher::new(config.require_token_secret()?)?;
    let registry = RegistryClient::new(&config.registry_url, config.fetch_attempts, timeout(config))?;
    let news = HttpNewsSource::new(config.news_url.clone(), config.fetch_attempts, timeout(config))?;
    let queue = DispatchQueue::new(config.concurrency)?;

    let pipeline = NotificationPipeline::new(
        registry,
        news,
        sender,
        cipher,
        queue,
        AlertPolicy::new(config.apns.topic.clone()),
    )
    .with_min_watermark(config.min_watermark)
    .with_progress(show_progress);

    Ok(pipeline.run().await?)
}

fn timeout(config: &DispatcherConfig) -> Duration {
    Duration::from_secs(config.request_timeout_secs)
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "apns_dispatcher=debug"
    } else {
        "apns_dispatcher=info"
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
