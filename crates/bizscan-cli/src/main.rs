use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bizscan_core::ResultSet;
use bizscan_pipeline::{build_scheduler, run_scan_once, write_outputs, ScanConfig, ScanReport};
use bizscan_storage::OutputStore;
use bizscan_web::{format_money, load_result_set, render_dashboard, serve, AppState};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "bizscan")]
#[command(about = "Daily scan of retirement-motivated businesses for sale")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one scan and write results, dashboard and manifest.
    Scan,
    /// Render a dashboard from an existing results file.
    Render {
        #[arg(long)]
        input: PathBuf,
        /// Defaults to the input path with a `_dashboard.html` suffix.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Serve the newest report from the output directory.
    Serve {
        #[arg(long, env = "BIZSCAN_WEB_PORT", default_value_t = 8000)]
        port: u16,
    },
    /// Scan now, then on the configured cron schedule until Ctrl-C.
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let config = ScanConfig::from_env();

    match cli.command.unwrap_or(Commands::Scan) {
        Commands::Scan => {
            let report = scan_and_write(&config).await?;
            print_summary(&report);
        }
        Commands::Render { input, output } => {
            let set = load_result_set(&input).await?;
            let html = render_dashboard(&set)?;
            let output = output.unwrap_or_else(|| dashboard_path_for(&input));
            tokio::fs::write(&output, html)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            println!("dashboard written: {}", output.display());
        }
        Commands::Serve { port } => {
            serve(AppState::new(config.output_dir.clone()), port).await?;
        }
        Commands::Schedule => schedule(config).await?,
    }

    Ok(())
}

async fn scan_and_write(config: &ScanConfig) -> Result<ScanReport> {
    let report = run_scan_once(config).await?;
    let html = render_dashboard(&report.result_set)?;
    let store = OutputStore::new(config.output_dir.clone());
    let written = write_outputs(&store, &report.result_set, Some(&html)).await?;
    for failed in report.stats.failed_sources() {
        warn!(
            source_id = %failed.source_id,
            error = failed.error.as_deref().unwrap_or_default(),
            "source contributed no listings"
        );
    }
    info!(
        run_id = %report.stats.run_id,
        results = %written.results.absolute_path.display(),
        "scan complete"
    );
    Ok(report)
}

fn print_summary(report: &ScanReport) {
    let set: &ResultSet = &report.result_set;
    println!("scan complete: run_id={}", report.stats.run_id);
    println!("total listings found: {}", set.total_listings_found);
    println!("unique qualifying businesses: {}", set.unique_listings);
    if set.is_empty() {
        println!("{}", set.no_matches_reason);
        return;
    }
    println!("top 3 opportunities by price:");
    for (i, listing) in set.results.iter().take(3).enumerate() {
        let price = if listing.price_disclosed() {
            format_money(listing.price)
        } else {
            "Price on request".to_string()
        };
        println!("  {}. {} - {}", i + 1, listing.name, price);
    }
}

fn dashboard_path_for(input: &std::path::Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "business_listings".to_string());
    input.with_file_name(format!("{stem}_dashboard.html"))
}

async fn schedule(config: ScanConfig) -> Result<()> {
    let config = Arc::new(config);
    let cron = config.schedule_cron.clone();
    let job_config = Arc::clone(&config);
    let mut sched = build_scheduler(&cron, move || {
        let config = Arc::clone(&job_config);
        Box::pin(async move {
            if let Err(e) = scan_and_write(&config).await {
                error!(error = %e, "scheduled scan failed");
            }
        })
    })
    .await?;

    if let Err(e) = scan_and_write(&config).await {
        error!(error = %e, "initial scan failed");
    }

    sched.start().await.context("starting scheduler")?;
    info!(cron = %cron, "scheduler running; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    sched.shutdown().await.context("stopping scheduler")?;
    info!("scheduler stopped");
    Ok(())
}
