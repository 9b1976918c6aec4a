use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use dext3r::{Dext3r, DownloadConfig, Endpoints, PacingPolicy, DEFAULT_MAX_DAYS};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

/// Bulk, resumable requests of station time series from ARPAE Dext3r.
#[derive(Debug, Parser)]
#[command(name = "dext3r", version, about)]
struct Cli {
    /// Workspace holding the catalog cache and the request logs
    /// (defaults to the user data directory).
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    #[arg(long, global = true, default_value = dext3r::DEFAULT_API_URL)]
    api_url: String,

    #[arg(long, global = true, default_value = dext3r::DEFAULT_STATIONS_URL)]
    stations_url: String,

    #[arg(long, global = true, default_value = dext3r::DEFAULT_SERIES_URL)]
    series_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the queue, pack it and submit every batch.
    Download(RunArgs),
    /// Show how the queue would be packed without submitting anything.
    Plan(RunArgs),
    /// Summarize the request logs of the workspace.
    Status,
    /// Fetch the station and series catalog again.
    RefreshCatalog,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Variable code, e.g. B12101. Repeatable.
    #[arg(long = "variable", required = true)]
    variables: Vec<String>,

    /// Aggregation code, e.g. 3 for averages. Repeatable.
    #[arg(long = "agg-code", required = true)]
    agg_codes: Vec<i32>,

    /// Aggregation span in seconds (86400, 3600 or 900).
    #[arg(long, default_value_t = 86400)]
    agg_span: i64,

    /// Earliest date of interest.
    #[arg(long)]
    from_date: NaiveDate,

    /// Last date of interest (defaults to today).
    #[arg(long)]
    to_date: Option<NaiveDate>,

    /// Longest timeline section, in days.
    #[arg(long, default_value_t = DEFAULT_MAX_DAYS)]
    max_days: i64,

    /// Address the results are sent to. Repeat to rotate between several.
    #[arg(long = "email", required = true)]
    emails: Vec<String>,

    /// Initial pause between attempts, in seconds.
    #[arg(long, default_value_t = 120)]
    pause: u64,

    /// Size ceiling of one request, in data points.
    #[arg(long, default_value_t = dext3r::DEFAULT_MAX_LINES)]
    max_lines: i64,

    #[arg(long, default_value_t = dext3r::DEFAULT_MAX_TRIES)]
    max_tries: u32,

    /// Request everything again, ignoring the submission log.
    #[arg(long)]
    no_resume: bool,

    /// Fetch the catalog again before building the queue.
    #[arg(long)]
    refresh_catalog: bool,
}

impl RunArgs {
    fn to_config(&self) -> Result<DownloadConfig, dext3r::ConfigError> {
        DownloadConfig::builder()
            .emails(self.emails.clone())
            .variables(self.variables.clone())
            .agg_codes(self.agg_codes.clone())
            .agg_span(self.agg_span)
            .from_date(self.from_date)
            .to_date(self.to_date.unwrap_or_else(|| Utc::now().date_naive()))
            .max_days(self.max_days)
            .max_lines(self.max_lines)
            .max_tries(self.max_tries)
            .resume(!self.no_resume)
            .force_catalog_refresh(self.refresh_catalog)
            .pacing(PacingPolicy {
                pause: Duration::from_secs(self.pause),
                ..PacingPolicy::default()
            })
            .build()
    }
}

fn progress_bar() -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let endpoints = Endpoints {
        api_url: cli.api_url.clone(),
        stations_url: cli.stations_url.clone(),
        series_url: cli.series_url.clone(),
    };
    let client = match &cli.workspace {
        Some(path) => Dext3r::with_endpoints(path.clone(), &endpoints).await?,
        None => {
            let path = dext3r::get_default_workspace().context("Could not determine a default workspace")?;
            Dext3r::with_endpoints(path, &endpoints).await?
        }
    };

    match &cli.command {
        Command::Download(args) => {
            let config = args.to_config()?;
            let report = client
                .download()
                .config(&config)
                .progress(progress_bar()?)
                .call()
                .await?;
            println!(
                "Submitted {} batch(es) covering {} unit(s); {} failed, {} blocked. Final pause {}s.",
                report.batches_submitted,
                report.units_submitted,
                report.batches_failed,
                report.batches_blocked,
                report.final_pause.as_secs()
            );
        }
        Command::Plan(args) => {
            let config = args.to_config()?;
            let plan = client.plan(&config).await?;
            println!(
                "{} unit(s) in {} batch(es)",
                plan.units,
                plan.batches.len()
            );
            if let Some(largest) = plan.largest_batch() {
                println!(
                    "Largest batch: {} station(s), {} point(s)",
                    largest.len(),
                    largest.total_size()
                );
            }
        }
        Command::Status => {
            let status = client.status().await?;
            println!("Workspace: {}", client.workspace().display());
            println!("Submitted tasks:  {}", status.tasks);
            println!("Logged units:     {}", status.logged_units);
            println!("Invalid tasks:    {}", status.invalid_tasks);
            println!("Units done:       {}", status.satisfied_units);
        }
        Command::RefreshCatalog => {
            let entries = client.refresh_catalog().await?;
            println!("Catalog refreshed: {} series", entries.len());
        }
    }
    Ok(())
}
