//! Nickscan - Command-line username scanner.
//!
//! Scans one or more usernames across the configured sources and prints
//! every found profile as one JSON line on stdout. Progress and logs go to
//! stderr so stdout stays machine-readable.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use nickscan_core::AppConfig;
use nickscan_scanner::{ScanBatch, ScanContext, ScanEvent};
use nickscan_sources::{variations, SourceRegistry};
use tracing::info;

mod output;

/// Command-line arguments for nickscan
#[derive(Parser, Debug)]
#[command(name = "nickscan")]
#[command(about = "Look up usernames across public profile sources")]
#[command(version)]
struct Args {
    /// Usernames to scan
    #[arg(required = true)]
    usernames: Vec<String>,

    /// Also scan common variations of each username
    #[arg(long)]
    variations: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, env = "NICKSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Only scan these sources (repeatable)
    #[arg(short, long = "source", value_name = "NAME")]
    sources: Vec<String>,

    /// Do not print progress to stderr
    #[arg(short, long)]
    quiet: bool,
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,nickscan=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => {
            let config = AppConfig::load_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?
                .with_env_overrides();
            config.validate()?;
            config
        }
        None => AppConfig::load_with_env().context("failed to load config")?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    info!("Starting nickscan v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(args.config.as_ref())?;
    let context =
        Arc::new(ScanContext::from_config(&config).context("failed to build scan context")?);

    let mut registry = SourceRegistry::from_config(&config.sources, context.http())
        .context("failed to build sources")?;
    registry.retain_named(&args.sources)?;
    let disabled = registry.initialize_all().await;
    if !disabled.is_empty() {
        info!(sources = ?disabled, "some sources are unavailable this session");
    }
    if registry.is_empty() {
        anyhow::bail!("no sources available; check configuration and credentials");
    }

    let identifiers = if args.variations {
        variations::expand_all(&args.usernames, config.scanning.max_variations)
    } else {
        args.usernames.clone()
    };
    let batch = ScanBatch::new(&identifiers);
    info!(
        identifiers = batch.len(),
        sources = ?registry.names(),
        "scanning"
    );

    let orchestrator = Arc::new(registry.orchestrator(context));
    let mut handle = orchestrator.spawn(batch);

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    while let Some(event) = handle.next_event().await {
        match event {
            ScanEvent::Result(envelope) => {
                let line = output::result_line(&envelope)?;
                let mut out = stdout.lock();
                writeln!(out, "{line}")?;
                out.flush()?;
            }
            ScanEvent::Progress(update) => {
                if !args.quiet {
                    writeln!(stderr.lock(), "{}", output::progress_line(&update))?;
                }
            }
        }
    }

    let summary = handle.finish().await;
    registry.shutdown_all().await;
    let summary = summary?;

    if !args.quiet {
        writeln!(stderr.lock(), "{}", output::summary_line(&summary))?;
    }

    Ok(())
}
