mod app;
mod audio;
mod clip;
mod config;
mod console;
mod error;
mod messages;
mod services;
mod session;
mod store;

#[cfg(test)]
mod testing;

use app::App;
use config::Config;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout belongs to the console
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    tracing::info!("Starting clipdeck");

    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // Create LocalSet for !Send futures (the Recorder holds cpal::Stream,
    // the player holds rodio::OutputStream)
    let local = tokio::task::LocalSet::new();

    local.run_until(async move { run_app(config).await }).await?;

    tracing::info!("clipdeck shutdown complete");
    Ok(())
}

async fn run_app(config: Config) -> Result<()> {
    let app = App::new(config).await?;
    app.run().await
}
