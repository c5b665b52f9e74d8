//! CLI entry point for the media relay.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use relay_core::{
    ContentSource, CycleRunner, DedupStore, DeliveryPipeline, DiscordSink, PayloadClient,
    RedditSource, RelayConfig, Scheduler, Sink, flush_on_exit, shutdown_signal,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let config = RelayConfig::load(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;
    debug!(?config, "config loaded");

    let source: Arc<dyn ContentSource> = Arc::new(
        RedditSource::new(config.reddit_credentials()).context("failed to build Reddit client")?,
    );
    let sink: Arc<dyn Sink> = Arc::new(
        DiscordSink::new(config.token.clone(), config.channel_id.clone())
            .context("failed to build Discord client")?,
    );
    let payloads = PayloadClient::new().context("failed to build download client")?;
    let store = DedupStore::new(config.sent_images_file.clone());

    let identity = sink
        .ready()
        .await
        .context("Discord rejected the bot token or is unreachable")?;
    info!(
        identity = %identity,
        subreddit = %config.subreddit,
        channel_id = %config.channel_id,
        "relay ready"
    );

    let pipeline = Arc::new(DeliveryPipeline::new(
        source,
        sink,
        payloads,
        store.clone(),
        config.delivery_settings(),
    ));
    let live = pipeline.subscribe();

    if args.once {
        let report = pipeline.run_cycle().await;
        info!(?report, "single cycle finished");
    } else {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        });

        let runner: Arc<dyn CycleRunner> = pipeline;
        let stats = Scheduler::new(config.poll_interval())
            .run(runner, shutdown_rx)
            .await;
        info!(started = stats.started, skipped = stats.skipped, "relay stopping");
    }

    if !flush_on_exit(&store, &live).await {
        warn!("sent list could not be flushed on exit");
    }

    Ok(())
}
