use tracing_subscriber::EnvFilter;

mod camera;
mod config;
mod display;
mod pose;

use config::Config;
use pose::Shutdown;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("repcount=debug".parse()?))
        .init();

    let config = Config::load()?;
    tracing::info!(
        model = %config.model.path,
        display = config.display.enabled,
        "starting rep counter"
    );

    let shutdown = Shutdown::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal.trigger();
        }
    });

    let summary = pose::spawn_session(config, shutdown).await??;
    tracing::info!(reps = summary.reps, frames = summary.frames, "shutdown complete");

    Ok(())
}
