//! Daemon runtime: bus acquisition, signal handling, teardown.

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};

use crate::{
    config::Config,
    engine::Engine,
    error::Error,
    service::{GameMode, GAMEMODE_BUS_NAME, GAMEMODE_BUS_PATH},
    tuned::{ProfileClient, TunedClient},
};

/// Brings up both bus connections, publishes the GameMode object and parks
/// until SIGINT or SIGTERM. The initial profile is restored on the way out
/// no matter how serving ended.
pub async fn run(config: Config) -> Result<(), Error> {
    let system_bus = zbus::Connection::system().await?;
    let tuned: Arc<dyn ProfileClient> = Arc::new(TunedClient::new(&system_bus).await?);
    let engine = Arc::new(Engine::new(tuned, config.gaming_profile).await?);

    let result = serve(&engine).await;
    engine.shutdown().await;
    if let Err(err) = system_bus.close().await {
        tracing::warn!("Closing the system bus connection failed: {err}");
    }
    result
}

async fn serve(engine: &Arc<Engine>) -> Result<(), Error> {
    let connection = zbus::connection::Builder::session()?
        .name(GAMEMODE_BUS_NAME)?
        .serve_at(GAMEMODE_BUS_PATH, GameMode::new(Arc::clone(engine)))?
        .build()
        .await?;
    tracing::info!("Serving interface `{GAMEMODE_BUS_NAME}` at {GAMEMODE_BUS_PATH}");

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => tracing::info!("SIGINT received, shutting down"),
        _ = sigterm.recv() => tracing::info!("SIGTERM received, shutting down"),
    }

    if let Err(err) = connection.close().await {
        tracing::warn!("Closing the session bus connection failed: {err}");
    }
    Ok(())
}
