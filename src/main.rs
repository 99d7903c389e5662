use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;

use comicfeed::config::Config;
use comicfeed::lookup::GoComicsClient;
use comicfeed::sync::{self, BackfillOutcome, OutputPaths, RunOutcome, POLL_INTERVAL};
use comicfeed::util::{format_comic_date, parse_comic_date};

#[derive(Parser, Debug)]
#[command(name = "comicfeed", about = "Publish daily GoComics strips as an RSS feed")]
struct Args {
    /// Optional TOML config file (environment variables take precedence)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run a single fetch and exit instead of polling
    #[arg(long)]
    once: bool,

    /// Target date for --once (YYYY/MM/DD, default today)
    #[arg(long, value_name = "DATE", requires = "once")]
    date: Option<String>,

    /// Skip the initial backfill even when the history is empty
    #[arg(long)]
    no_backfill: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    tracing::info!(
        domain = %config.host_domain,
        authors = ?config.authors,
        max_age_days = config.max_age_days,
        output_dir = %config.output_dir.display(),
        "Configuration loaded"
    );

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory '{}'",
            config.output_dir.display()
        )
    })?;
    let paths = OutputPaths::in_dir(&config.output_dir);

    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let source = GoComicsClient::new(client);

    if args.once {
        let now = Local::now();
        let date = match args.date {
            Some(date) => {
                if parse_comic_date(&date).is_none() {
                    anyhow::bail!("Invalid --date {date:?}: expected YYYY/MM/DD");
                }
                date
            }
            None => format_comic_date(now.date_naive()),
        };

        let outcome = sync::run_for_date(&config, &source, &paths, &date, now)
            .await
            .with_context(|| format!("Run for {date} failed"))?;
        match outcome {
            RunOutcome::Published { changes, .. } => {
                println!("Published {changes} new comic(s) for {date}");
            }
            RunOutcome::Unchanged => println!("No new comics for {date}"),
        }
        return Ok(());
    }

    if !args.no_backfill {
        run_backfill(&config, &source, &paths).await;
    }

    tracing::info!(interval_secs = POLL_INTERVAL.as_secs(), "Starting poll loop");
    sync::poll(&config, &source, &paths, POLL_INTERVAL, shutdown_signal()).await;

    Ok(())
}

/// Backfill a fresh history. Failures here are logged; polling still starts.
async fn run_backfill(config: &Config, source: &GoComicsClient, paths: &OutputPaths) {
    let days = match config.backfill_days() {
        Ok(Some(days)) => days,
        Ok(None) => return,
        Err(e) => {
            tracing::error!(error = %e, "Invalid backfill depth, skipping backfill");
            return;
        }
    };

    match sync::backfill(config, source, paths, days, Local::now()).await {
        Ok(BackfillOutcome::NotNeeded) => {
            tracing::debug!("History already populated, no backfill needed");
        }
        Ok(BackfillOutcome::Completed { published, failed }) => {
            tracing::info!(days = days, published = published, failed = failed, "Backfill finished");
        }
        Err(e) => {
            tracing::error!(error = %e, "Backfill aborted");
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c_or_forever() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                ctrl_c_or_forever().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c_or_forever().await;
}

/// Resolves on Ctrl+C. Never resolves if the handler can't be installed.
async fn ctrl_c_or_forever() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to install Ctrl+C handler, polling until killed");
        std::future::pending::<()>().await;
    }
}
