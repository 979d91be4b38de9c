mod cmd_breakdown;
mod cmd_budget;
mod cmd_cache;
mod cmd_history;
mod cmd_init;
mod cmd_status;
mod cmd_watch;
mod setup;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cloudspend", version, about = "GCP cost tracking from the BigQuery billing export")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the config file and prepare the local database
    Init {
        /// Project hosting the billing export dataset (also billed for queries)
        #[arg(long)]
        billing_project: String,
        /// Billing export dataset id (auto-discovered table if omitted)
        #[arg(long)]
        dataset: Option<String>,
        /// Billing export table id
        #[arg(long)]
        table: Option<String>,
        /// Project ids to track (repeatable)
        #[arg(long = "project", required = true)]
        projects: Vec<String>,
        /// Display currency
        #[arg(long, default_value = "USD")]
        currency: String,
        /// Monthly budget applied to every tracked project
        #[arg(long)]
        budget: Option<f64>,
        /// Budget warning threshold in percent
        #[arg(long)]
        warn_percent: Option<f64>,
        /// Watch-loop poll interval in seconds
        #[arg(long, default_value_t = 300)]
        poll_interval: u64,
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Show today/week/month spend, trend, and forecast
    Status {
        /// Narrow to one tracked project
        #[arg(long)]
        project: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Bypass the cache and refetch
        #[arg(long)]
        refresh: bool,
    },
    /// Cost breakdown by service, or by SKU within one service
    Breakdown {
        /// Service to expand into SKUs (e.g. "Compute Engine")
        #[arg(long)]
        service: Option<String>,
        /// Month to report, YYYY-MM (defaults to current)
        #[arg(long)]
        month: Option<String>,
        /// Narrow to one tracked project
        #[arg(long)]
        project: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Daily costs for the trailing N days
    History {
        /// Number of trailing days
        #[arg(long, default_value_t = 14)]
        days: u32,
        /// Narrow to one tracked project
        #[arg(long)]
        project: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Budget status and threshold alerts per tracked project
    Budget {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Poll status continuously, refreshing the cache each round
    Watch {
        /// Poll interval in seconds (defaults to config poll_interval)
        #[arg(long)]
        interval: Option<u64>,
        /// Narrow to one tracked project
        #[arg(long)]
        project: Option<String>,
    },
    /// Cache maintenance
    Cache {
        #[command(subcommand)]
        cmd: CacheCmd,
    },
}

#[derive(Subcommand)]
enum CacheCmd {
    /// Drop cached query results
    Clear {
        /// Only drop keys starting with this prefix (e.g. "status:")
        #[arg(long)]
        prefix: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Init {
            billing_project,
            dataset,
            table,
            projects,
            currency,
            budget,
            warn_percent,
            poll_interval,
            force,
        } => cmd_init::execute(cmd_init::InitParams {
            billing_project,
            dataset,
            table,
            projects,
            currency,
            budget,
            warn_percent,
            poll_interval,
            force,
        }),
        Command::Status {
            project,
            json,
            refresh,
        } => cmd_status::execute(project.as_deref(), json, refresh).await,
        Command::Breakdown {
            service,
            month,
            project,
            json,
        } => cmd_breakdown::execute(service.as_deref(), month.as_deref(), project.as_deref(), json)
            .await,
        Command::History {
            days,
            project,
            json,
        } => cmd_history::execute(days, project.as_deref(), json).await,
        Command::Budget { json } => cmd_budget::execute(json).await,
        Command::Watch { interval, project } => {
            cmd_watch::execute(interval, project.as_deref()).await
        }
        Command::Cache { cmd } => match cmd {
            CacheCmd::Clear { prefix } => cmd_cache::clear(prefix.as_deref()),
        },
    }
}
