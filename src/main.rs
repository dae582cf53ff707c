//! Command line entry point: one acquisition run against the marketplace

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use price_tracker_lib::application::{Pipeline, RunOptions, RunReport};
use price_tracker_lib::infrastructure::config::{ConfigManager, defaults};
use price_tracker_lib::infrastructure::{
    HttpDriverLauncher, init_logging, init_logging_with_config, log_system_info,
};
use price_tracker_lib::services::DashboardService;
use price_tracker_lib::types::dashboard_types::DashboardView;

#[derive(Parser, Debug)]
#[command(name = "price-tracker")]
#[command(about = "Track catalog prices against competing marketplace sellers")]
#[command(version)]
struct Cli {
    /// Only acquire the catalog, skip product pages
    #[arg(long, conflicts_with = "only_process")]
    only_fetch: bool,

    /// Process the previously saved catalog instead of acquiring a new one
    #[arg(long)]
    only_process: bool,

    /// Listing URL to scan instead of the configured one
    #[arg(long)]
    shop_url: Option<String>,

    /// Maximum number of products to process (0 for no limit)
    #[arg(long)]
    limit: Option<usize>,

    /// Maximum number of listing pages to scan (0 for no limit)
    #[arg(long, default_value_t = defaults::PAGE_LIMIT)]
    page_limit: u32,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the comparison table after the run
    #[arg(long)]
    summary: bool,

    /// Exit with status 1 when the run fails
    #[arg(long)]
    strict_exit: bool,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            fetch_only: self.only_fetch,
            process_only: self.only_process,
            listing_url: self.shop_url.clone(),
            limit: self.limit,
            page_limit: Some(self.page_limit),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("price-tracker: {e:#}");
            if cli.strict_exit {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = match ConfigManager::new(cli.config.clone()).and_then(|manager| manager.load()) {
        Ok(config) => config,
        Err(e) => {
            init_logging()?;
            return Err(e.context("Failed to load configuration"));
        }
    };
    init_logging_with_config(&config.logging)?;
    log_system_info();

    let launcher = HttpDriverLauncher::new(config.http.clone(), config.pacing.page_settle());
    let pipeline = Arc::new(Pipeline::new(Arc::new(config), Arc::new(launcher))?);

    let report = pipeline.run(&cli.run_options()).await?;
    log_report(&report);

    if cli.summary {
        let view = DashboardService::new(Arc::clone(&pipeline)).load_view().await?;
        print_summary(&view);
    }
    Ok(())
}

fn log_report(report: &RunReport) {
    info!(
        "Run {}: {} page(s), {} product(s) acquired, {} processed, {} written",
        report.run_id,
        report.pages_scanned,
        report.stubs_acquired,
        report.products_processed,
        report.records_written
    );
    for warning in &report.warnings {
        warn!("{}", warning);
    }
}

fn print_summary(view: &DashboardView) {
    if view.is_empty() {
        println!("No products in the store.");
        return;
    }
    if let Some(last_update) = view.last_update {
        println!("Last update: {}", last_update.with_timezone(&chrono::Local).format("%d.%m.%Y %H:%M:%S"));
    }
    println!("{:<40} {:<30} {:>12}", "Product", "Seller", "Price");
    for row in &view.rows {
        let price = row
            .price
            .map_or_else(|| "-".to_string(), |price| format!("{price:.2}"));
        let marker = if row.cheapest { " *" } else { "" };
        println!(
            "{:<40} {:<30} {:>12}{}",
            truncate(&row.product_name, 40),
            truncate(row.seller.label(), 30),
            price,
            marker
        );
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let kept: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
