//! Command-line entry point for paper-harvest

use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use paper_harvest::{Config, Event, HarvestReport, Harvester, YearListing};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BAR_TEMPLATE: &str = "{prefix:>5} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.blue} {msg}";

/// Harvest paper metadata and PDFs from a conference archive
#[derive(Debug, Parser)]
#[command(name = "paper-harvest", version, about)]
struct Cli {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Archive origin, e.g. https://papers.nips.cc
    #[arg(long)]
    base_url: Option<String>,

    /// First year to harvest
    #[arg(long)]
    start_year: Option<u16>,

    /// Last year to harvest (inclusive)
    #[arg(long)]
    end_year: Option<u16>,

    /// Years processed at once
    #[arg(long)]
    year_concurrency: Option<usize>,

    /// Paper downloads at once within a year
    #[arg(long)]
    paper_concurrency: Option<usize>,

    /// Listing page timeout in seconds
    #[arg(long)]
    listing_timeout: Option<u64>,

    /// PDF timeout in seconds (headers and each chunk)
    #[arg(long)]
    download_timeout: Option<u64>,

    /// Root directory of the PDF mirror
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// CSV metadata output
    #[arg(long)]
    csv: Option<PathBuf>,

    /// JSON metadata output
    #[arg(long)]
    json: Option<PathBuf>,

    /// Retries for transient fetch failures
    #[arg(long)]
    retries: Option<u32>,

    /// Save metadata only, download no PDFs
    #[arg(long)]
    metadata_only: bool,

    /// Look up the PDF link on the abstract page when the derived link is 404
    #[arg(long)]
    resolve_from_abstract: bool,

    /// Keep one record per distinct link on a listing page
    #[arg(long)]
    dedupe_links: bool,

    /// Disable progress bars
    #[arg(long)]
    no_progress: bool,
}

impl Cli {
    fn into_config(self) -> paper_harvest::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(base_url) = self.base_url {
            config.crawl.base_url = base_url;
        }
        if let Some(year) = self.start_year {
            config.crawl.start_year = year;
        }
        if let Some(year) = self.end_year {
            config.crawl.end_year = year;
        }
        if let Some(limit) = self.year_concurrency {
            config.concurrency.year_concurrency = limit;
        }
        if let Some(limit) = self.paper_concurrency {
            config.concurrency.paper_concurrency = limit;
        }
        if let Some(secs) = self.listing_timeout {
            config.http.listing_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.download_timeout {
            config.http.download_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = self.download_dir {
            config.output.download_dir = dir;
        }
        if let Some(path) = self.csv {
            config.output.csv_path = path;
        }
        if let Some(path) = self.json {
            config.output.json_path = path;
        }
        if let Some(retries) = self.retries {
            config.retry.max_attempts = retries;
        }
        if self.metadata_only {
            config.output.download_pdfs = false;
        }
        if self.resolve_from_abstract {
            config.download.resolve_from_abstract = true;
        }
        if self.dedupe_links {
            config.crawl.dedupe_links = true;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paper_harvest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let show_progress = !cli.no_progress;

    let harvester = match cli.into_config().and_then(Harvester::new) {
        Ok(harvester) => harvester,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let progress = show_progress.then(|| tokio::spawn(render_progress(harvester.subscribe())));

    let result = harvester.run().await;
    // Closing the channel ends the progress task
    drop(harvester);
    if let Some(handle) = progress {
        handle.await.ok();
    }

    match result {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Harvest failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Draw a spinner for the metadata phase and one bar per year
async fn render_progress(mut events: broadcast::Receiver<Event>) {
    let bars = MultiProgress::new();
    let spinner = bars.add(ProgressBar::new_spinner());
    if let Ok(style) = ProgressStyle::with_template(SPINNER_TEMPLATE) {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Fetching listing pages");

    let bar_style = ProgressStyle::with_template(BAR_TEMPLATE).ok();
    let mut years: HashMap<u16, ProgressBar> = HashMap::new();
    let mut listed = 0usize;

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            Event::ListingFetched { papers, .. } => {
                listed += papers;
                spinner.set_message(format!("Fetching listing pages: {listed} papers found"));
            }
            Event::MetadataSaved { format, path, .. } => {
                spinner.set_message(format!("Saved {format} metadata to {}", path.display()));
            }
            Event::YearStarted { year, total } => {
                spinner.finish_and_clear();
                let bar = bars.add(ProgressBar::new(total as u64));
                if let Some(style) = &bar_style {
                    bar.set_style(style.clone());
                }
                bar.set_prefix(year.to_string());
                years.insert(year, bar);
            }
            Event::PaperFinished {
                year, completed, ..
            } => {
                if let Some(bar) = years.get(&year) {
                    bar.set_position(completed as u64);
                }
            }
            Event::YearFinished { year, tally } => {
                if let Some(bar) = years.get(&year) {
                    bar.finish_with_message(format!(
                        "{} new, {} skipped, {} failed",
                        tally.succeeded, tally.skipped, tally.failed
                    ));
                }
            }
            Event::HarvestFinished { .. } => spinner.finish_and_clear(),
            Event::ListingEmpty { .. }
            | Event::ListingFailed { .. }
            | Event::MetadataSaveFailed { .. } => {}
        }
    }
    spinner.finish_and_clear();
}

fn print_summary(report: &HarvestReport) {
    println!("Harvested {} records", report.records.len());
    for (year, listing) in &report.years {
        match listing {
            YearListing::Fetched { papers } => println!("  {year}: {papers} papers"),
            YearListing::Empty => println!("  {year}: listing had no paper links"),
            YearListing::Failed(e) => println!("  {year}: listing failed ({e})"),
        }
    }
    if let Ok(path) = &report.save.csv {
        println!("CSV:  {}", path.display());
    }
    if let Ok(path) = &report.save.json {
        println!("JSON: {}", path.display());
    }
    for format in report.save.failed_formats() {
        println!("{format} metadata could not be written");
    }

    if !report.downloads.is_empty() {
        let tally = report.tally();
        println!(
            "PDFs: {} downloaded, {} already present, {} failed",
            tally.succeeded, tally.skipped, tally.failed
        );
    }
    println!(
        "Finished in {:.1}s",
        report.elapsed().num_milliseconds() as f64 / 1000.0
    );
}
