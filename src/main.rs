use queue_archiver::{Config, Pipeline, clients, wait_for_signal};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match std::env::args_os().nth(1) {
        Some(path) => Config::from_json_file(path.as_ref()),
        None => Config::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let (queue, store) = clients::aws::connect(&config.aws).await;
    let pipeline = Pipeline::new(Arc::new(queue), Arc::new(store), config);

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_token.cancel();
    });

    match pipeline.run_until_cancelled(token).await {
        Ok(summary) => {
            tracing::info!(
                runs = summary.runs,
                published = summary.published,
                received = summary.received,
                "Archiver stopped"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Archiver could not start");
            ExitCode::FAILURE
        }
    }
}
