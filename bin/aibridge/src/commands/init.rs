use std::collections::HashMap;

use aibridge_core::config::{AdapterConfig, BridgeConfig};
use aibridge_core::Paths;

/// Write a starter config with two example adapters.
pub fn run(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    let path = paths.config_file();
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let mut config = BridgeConfig::default();
    config.adapters = vec![
        AdapterConfig {
            name: "claude".to_string(),
            command: String::new(),
            args: vec![],
            profile: "project".to_string(),
            env: HashMap::new(),
        },
        AdapterConfig {
            name: "copilot".to_string(),
            command: String::new(),
            args: vec![],
            profile: "general".to_string(),
            env: HashMap::new(),
        },
    ];
    config.save(&path)?;
    println!("Wrote {}", path.display());
    println!("Edit the backend/broker URLs and adapter list, then run `aibridge up`.");
    Ok(())
}
