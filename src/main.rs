use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pr_harvest::config::Config;
use pr_harvest::evaluate::{evaluate_repository, EvalContext};
use pr_harvest::github::GithubClient;
use pr_harvest::throttle::RateGovernor;
use pr_harvest::{discovery, harvest, output};

const EXIT_SUCCESS: i32 = 0;
const EXIT_CONFIG: i32 = 1;
const EXIT_OUTPUT: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "pr-harvest")]
#[command(about = "Collects review metrics for the largest pull requests of popular GitHub repositories", long_about = None)]
#[command(version)]
struct Cli {
    /// Evaluate a single repository ("owner/name") instead of running discovery
    #[arg(long)]
    repo: Option<String>,

    /// Cap the number of repositories taken from discovery
    #[arg(long)]
    limit: Option<usize>,

    /// Override the output file path (default: OUTPUT_PATH or pr_metrics.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // .env first so both the log filter and the config can come from it.
    let _ = dotenvy::dotenv();
    init_tracing(cli.verbose);

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("configuration error: {e}. Set GITHUB_TOKEN (e.g. export GITHUB_TOKEN=...)");
            std::process::exit(EXIT_CONFIG);
        }
    };

    let client = match GithubClient::new(&config.github_token) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to create GitHub client: {e:#}");
            std::process::exit(EXIT_CONFIG);
        }
    };

    let governor = Arc::new(RateGovernor::new(
        Arc::new(client.clone()),
        config.rate_min_remaining,
        config.safety_window(),
    ));
    let ctx = Arc::new(EvalContext {
        client,
        governor,
        policy: config.retry_policy(),
        filters: config.filter_policy(),
        limits: config.scan_limits(),
    });

    let records = if let Some(full_name) = cli.repo.as_deref() {
        if !full_name.contains('/') {
            error!("--repo expects owner/name, got {full_name:?}");
            std::process::exit(EXIT_CONFIG);
        }
        info!(repo = full_name, "evaluating single repository");
        evaluate_repository(&ctx, full_name).await.into_iter().collect()
    } else {
        let cap = cli.limit.map_or(config.top_n, |limit| limit.min(config.top_n));
        let repos = discovery::discover_repositories(&ctx, config.min_stars, cap).await;
        info!(candidates = repos.len(), workers = config.max_workers, "discovery complete");
        harvest::run(ctx.clone(), repos, config.max_workers).await
    };

    // Zero qualifying repositories is a normal outcome for a batch run;
    // only a broken output path is an error.
    if records.is_empty() {
        warn!("no repositories qualified; output file not written");
        std::process::exit(EXIT_SUCCESS);
    }

    let output_path = cli.output.unwrap_or_else(|| config.output_path.clone());
    if let Err(e) = output::write_csv(&output_path, &records) {
        error!("failed to write {}: {e:#}", output_path.display());
        std::process::exit(EXIT_OUTPUT);
    }

    info!(rows = records.len(), path = %output_path.display(), "collection complete");
    std::process::exit(EXIT_SUCCESS);
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "pr_harvest=debug"
    } else {
        "pr_harvest=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}
