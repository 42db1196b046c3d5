use std::io;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use search_rerank::cli;
use search_rerank::config::Config;
use search_rerank::metrics::RerankMetrics;
use search_rerank::rerank::Reranker;

fn main() -> anyhow::Result<()> {
    let args = std::env::args().collect::<Vec<_>>();
    if cli::wants_help(&args) {
        cli::print_help();
        return Ok(());
    }
    if cli::wants_version(&args) {
        cli::print_version();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting search-rerank");

    if let Err(err) = run(&args) {
        error!(error = %err, "search-rerank exited with error");
        return Err(err);
    }
    Ok(())
}

fn run(args: &[String]) -> anyhow::Result<()> {
    let query = cli::query_from_args(args)?;
    let config = Config::from_env()?;

    info!(
        model = %config.model_name,
        device = %config.device,
        backend = ?config.backend,
        model_dir = %config.model_dir,
        "Loaded configuration"
    );

    let metrics = Arc::new(RerankMetrics::new()?);
    let reranker = Reranker::from_config(&config, None).with_metrics(metrics.clone());

    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();
    let outcome = cli::run(&config, &reranker, &query, stdin, stdout)?;
    info!(?outcome, "Done");

    if cli::wants_metrics(args) {
        eprint!("{}", metrics.encode_text()?);
    }
    Ok(())
}
