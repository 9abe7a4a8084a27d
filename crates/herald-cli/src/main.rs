use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use herald_core::app::{DispatchLoop, LoopExit, MessagePublisher};
use herald_core::config::ConfigLoader;
use herald_core::impls::{InMemoryTaskStore, InMemoryTransport};
use herald_core::logging::init_tracing;
use herald_core::ports::{EXIT_LIVENESS_FAILURE, SystemClock, UlidGenerator, WatchLivenessSink};

/// タスクストアの未処理タスクを送信キューへ流す dispatcher
#[derive(Debug, Parser)]
#[command(name = "herald", version, about)]
struct Args {
    /// YAML config file (environment variables override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON array of tasks to load into the in-memory store
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let config = ConfigLoader::new().load(args.config.as_deref())?;
    init_tracing(&config.log_level);
    info!(
        region = %config.region,
        queue_url = config.queue_url.as_deref().unwrap_or("in-memory"),
        token_type = %config.token_type,
        "starting herald"
    );

    let store = match &args.seed {
        Some(path) => InMemoryTaskStore::from_json_file(path).await?,
        None => InMemoryTaskStore::new(),
    };
    let transport = Arc::new(InMemoryTransport::new());
    let publisher = MessagePublisher::new(transport, Arc::new(UlidGenerator::new(SystemClock)))
        .with_max_batch_entries(config.max_batch_entries);
    let (sink, liveness_rx) = WatchLivenessSink::channel();
    let dispatch = DispatchLoop::new(
        Arc::new(store),
        publisher,
        Arc::new(sink),
        config.dispatch_settings(),
    );

    if args.once {
        if let Some(report) = dispatch.run_once().await {
            info!(
                fetched = report.fetched,
                published = report.published,
                claimed = report.claimed,
                claim_failures = report.claim_failures.len(),
                "cycle finished"
            );
            if let Some(err) = report.error {
                return Err(err.into());
            }
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut running = tokio::spawn(dispatch.run(shutdown_rx));

    let exit = tokio::select! {
        exit = &mut running => exit?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("ctrl-c received, shutting down");
            // loop がすでに終わっていれば受信側はいない
            let _ = shutdown_tx.send(true);
            running.await?
        }
    };
    info!(?exit, "dispatch loop exited");

    if let Some(failure) = *liveness_rx.borrow() {
        error!(
            skipped = failure.skipped,
            exit_code = EXIT_LIVENESS_FAILURE,
            "dispatcher is wedged, exiting so the supervisor restarts it"
        );
        std::process::exit(EXIT_LIVENESS_FAILURE);
    }
    if exit == LoopExit::DrainTimedOut {
        error!(
            exit_code = EXIT_LIVENESS_FAILURE,
            "in-flight cycle never finished, exiting so the supervisor restarts it"
        );
        std::process::exit(EXIT_LIVENESS_FAILURE);
    }
    Ok(())
}
