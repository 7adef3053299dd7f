use std::error::Error;

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use bidfeed_core::Pipeline;
use bidfeed_core::checkpoint::memstore::InMemoryCheckpointStore;
use bidfeed_core::config::config;
use bidfeed_core::source::generator::GeneratorConnector;

mod setup_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_tracing::register();

    if let Err(e) = run().await {
        error!("{e:?}");
        return Err(e.into());
    }
    info!("Exiting...");

    Ok(())
}

async fn run() -> bidfeed_core::Result<()> {
    let cln_token = CancellationToken::new();
    let shutdown_cln_token = cln_token.clone();

    // wait for SIG{INT,TERM} and invoke the cancellation token.
    let shutdown_handle: JoinHandle<()> = tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_cln_token.cancel();
    });

    let settings = config();
    let store = InMemoryCheckpointStore::new();
    let connector = GeneratorConnector::new(settings.generator.clone());
    let pipeline = Pipeline::new(store, settings.subscription.clone());

    let (mut events, session_handle) = pipeline.stream(connector, cln_token).await?;
    while let Some(bid) = events.next().await {
        match serde_json::to_string(&bid) {
            Ok(event) => info!(%event, "winning bid"),
            Err(e) => error!(%e, "Serializing winning bid"),
        }
    }

    session_handle
        .await
        .map_err(|e| bidfeed_core::Error::Forwarder(format!("Joining stream session: {e:?}")))??;

    if !shutdown_handle.is_finished() {
        shutdown_handle.abort();
    }
    info!("Gracefully Exiting...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("Received Ctrl+C signal");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
        info!("Received terminate signal");
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
