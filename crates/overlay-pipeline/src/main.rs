//! AR Overlay - Main Entry Point
//!
//! Usage: `ar-overlay [config.toml]`

use anyhow::Context;
use overlay_pipeline::{demo_collaborators, init_logging, CancelToken, Pipeline, PipelineConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let config = PipelineConfig::load(config_path.as_deref()).context("loading configuration")?;
    init_logging(&config.logging)?;

    info!("=== AR Overlay v{} ===", env!("CARGO_PKG_VERSION"));

    let collaborators = demo_collaborators(&config);
    let mut pipeline = Pipeline::start(collaborators, config).context("starting pipeline")?;

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping");
                on_signal.cancel();
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    let summary = pipeline.run(cancel).await?;
    pipeline.shutdown();

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
