//! Video motion analysis worker binary.
//!
//! Usage: `vmotion-worker <video>...`
//!
//! Prints one JSON video record per input on stdout and exits non-zero if
//! any analysis failed.

use std::io::Write;
use std::path::PathBuf;

use tracing::{error, info};

use vmotion_worker::metrics::{init_metrics, write_metrics};
use vmotion_worker::{init_tracing, JobExecutor, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let inputs: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if inputs.is_empty() {
        eprintln!("usage: vmotion-worker <video>...");
        std::process::exit(2);
    }

    info!("Starting vmotion-worker");

    // Load configuration
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let metrics_handle = match &config.metrics_file {
        Some(_) => Some(init_metrics()?),
        None => None,
    };
    let metrics_file = config.metrics_file.clone();

    let executor = JobExecutor::new(config);
    let outcomes = executor.run(inputs).await;

    let mut stdout = std::io::stdout().lock();
    for outcome in &outcomes {
        serde_json::to_writer(&mut stdout, &outcome.record)?;
        writeln!(stdout)?;
    }
    stdout.flush()?;

    if let (Some(handle), Some(path)) = (metrics_handle, metrics_file) {
        if let Err(e) = write_metrics(&handle, &path) {
            error!("Failed to write metrics to {}: {}", path.display(), e);
        }
    }

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    info!(total = outcomes.len(), failed, "Worker shutdown complete");

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
