use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use aibridge_core::{BridgeConfig, Paths};

use crate::supervisor::{Supervisor, SupervisorSettings};

/// Start the bridge: spawn one adapter per configured assistant and
/// supervise them until a shutdown signal arrives.
pub async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => BridgeConfig::load(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => BridgeConfig::load_or_default(&Paths::new())?,
    };

    if config.adapters.is_empty() {
        anyhow::bail!("no adapters configured; run `aibridge init` to write a starter config");
    }

    let supervisor = Arc::new(Supervisor::new(SupervisorSettings::from_config(&config)));
    supervisor.start_all(config.adapters.clone()).await?;
    info!(
        adapters = config.adapters.len(),
        "Bridge up, press ctrl-c to stop"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping adapters");
    supervisor.stop_all().await;
    Ok(())
}
