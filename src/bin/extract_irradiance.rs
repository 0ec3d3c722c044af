use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use irradiance_extractor::config::Config;
use irradiance_extractor::export;
use irradiance_extractor::extractor::Extractor;
use irradiance_extractor::models::{ExtractionRequest, SampleTable};
use irradiance_extractor::page_source::{AnySource, RendererKind};
use irradiance_extractor::progress::Progress;
use tracing::info;

#[derive(Parser)]
#[command(name = "extract-irradiance")]
#[command(about = "Scrape hourly solar irradiance for a location and date range", long_about = None)]
struct Cli {
    /// Latitude in decimal degrees
    #[arg(long, default_value_t = 48.85826, allow_negative_numbers = true)]
    latitude: f64,

    /// Longitude in decimal degrees
    #[arg(long, default_value_t = 2.29451, allow_negative_numbers = true)]
    longitude: f64,

    /// First date (YYYY-MM-DD)
    #[arg(long, default_value = "2023-01-01")]
    start_date: NaiveDate,

    /// Last date, inclusive (YYYY-MM-DD)
    #[arg(long, default_value = "2023-01-07")]
    end_date: NaiveDate,

    /// First hour of day (0-23)
    #[arg(long, default_value_t = 6)]
    start_hour: u32,

    /// Last hour of day, inclusive (0-23)
    #[arg(long, default_value_t = 18)]
    end_hour: u32,

    /// Days fetched at once (defaults to EXTRACTOR_CONCURRENCY)
    #[arg(long)]
    parallel: Option<usize>,

    /// Page renderer: 'browser' or 'http'
    #[arg(long, env = "PAGE_RENDERER", default_value = "browser")]
    renderer: RendererKind,

    /// Write results to this file (.csv or .xlsx)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Only time one day and print the expected total
    #[arg(long)]
    estimate: bool,

    /// Fetch sequentially through a single tab
    #[arg(long)]
    sequential: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if it exists (ignore errors if not found)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let request = ExtractionRequest {
        latitude: cli.latitude,
        longitude: cli.longitude,
        start_date: cli.start_date,
        end_date: cli.end_date,
        start_hour: cli.start_hour,
        end_hour: cli.end_hour,
    };
    request.validate()?;

    let config = Config::from_env()?;
    let mut settings = config.extractor_settings()?;
    if let Some(parallel) = cli.parallel {
        settings.concurrency = parallel;
    }

    println!(
        "Selected Location: Latitude {:.5}, Longitude {:.5}",
        request.latitude, request.longitude
    );
    println!("Total data points to be extracted: {}", request.total_points());

    let source = AnySource::from_kind(cli.renderer, config.browser_options()).await?;
    let extractor = Extractor::new(source, settings)?;

    if cli.estimate {
        let estimate = extractor.estimate(&request).await?;
        println!(
            "Average call time measured: {:.2} seconds per day ({:.2} seconds per sample)",
            estimate.day_seconds, estimate.seconds_per_sample
        );
        println!(
            "Expected total time: {:.2} seconds ({} workers)",
            estimate.expected_seconds, estimate.concurrency
        );
        extractor.into_source().shutdown().await;
        return Ok(());
    }

    let start_time = Instant::now();
    if cli.sequential {
        info!("Fetching sequentially");
    }
    let table = run_with_progress_bar(&extractor, &request, cli.sequential).await?;
    let total_duration = start_time.elapsed();

    print_summary(&table, total_duration);

    if let Some(path) = &cli.output {
        export::write_to_path(&table, path)?;
        println!("Saved {}", path.display());
    } else {
        print_table(&table);
    }

    extractor.into_source().shutdown().await;
    Ok(())
}

/// Run the extraction while a ticker mirrors the shared counters
async fn run_with_progress_bar(
    extractor: &Extractor<AnySource>,
    request: &ExtractionRequest,
    sequential: bool,
) -> Result<SampleTable, Box<dyn std::error::Error>> {
    let progress = Arc::new(Progress::new(request.total_points()));

    let pb = ProgressBar::new(request.total_points() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} samples ({msg})")?
            .progress_chars("##-"),
    );

    let ticker = {
        let progress = progress.clone();
        let pb = pb.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(200));
            loop {
                interval.tick().await;
                let snapshot = progress.snapshot();
                pb.set_position(snapshot.completed as u64);
                pb.set_message(format!("{} failed", snapshot.failed));
                if snapshot.completed >= snapshot.total {
                    break;
                }
            }
        })
    };

    let table = if sequential {
        extractor.fetch_irradiance(request, &progress).await?
    } else {
        extractor.fetch_parallel(request, &progress).await?
    };
    ticker.abort();

    pb.finish_with_message(format!("{} failed", table.failed_count()));
    Ok(table)
}

fn print_summary(table: &SampleTable, total_duration: Duration) {
    println!("\n============================================================");
    println!("Irradiance Extraction Summary");
    println!("============================================================");
    println!("Samples:            {}", table.len());
    println!("Succeeded:          {}", table.succeeded_count());
    println!("Failed:             {}", table.failed_count());
    println!("------------------------------------------------------------");
    println!("Total Time:         {:.2}s", total_duration.as_secs_f64());
    if !table.is_empty() {
        println!(
            "Average per Sample: {:.2}s",
            total_duration.as_secs_f64() / table.len() as f64
        );
    }
    println!("============================================================");
}

fn print_table(table: &SampleTable) {
    println!("\n{:<12} {:<6} {:<16} error", "date", "hour", "irradiance");
    for sample in table.iter() {
        println!(
            "{:<12} {:<6} {:<16} {}",
            sample.date.format("%Y-%m-%d").to_string(),
            sample.hour,
            sample.irradiance.as_deref().unwrap_or_default(),
            sample.error.as_deref().unwrap_or_default(),
        );
    }
}
