use url::Url;

use aibridge_core::{BridgeConfig, Paths};

/// Environment diagnostics: config sanity plus backend reachability.
pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config_path = paths.config_file();

    if config_path.exists() {
        println!("ok    config file: {}", config_path.display());
    } else {
        println!("warn  config file missing ({}), defaults in effect", config_path.display());
    }

    let config = BridgeConfig::load_or_default(&paths)?;

    match Url::parse(&config.backend.url) {
        Ok(_) => println!("ok    backend url: {}", config.backend.url),
        Err(e) => println!("fail  backend url '{}': {e}", config.backend.url),
    }
    match Url::parse(&config.broker.url) {
        Ok(url) if matches!(url.scheme(), "ws" | "wss") => {
            println!("ok    broker url: {}", config.broker.url)
        }
        Ok(url) => println!("fail  broker url: scheme '{}' is not ws/wss", url.scheme()),
        Err(e) => println!("fail  broker url '{}': {e}", config.broker.url),
    }

    if config.adapters.is_empty() {
        println!("warn  no adapters configured");
    } else {
        for adapter in &config.adapters {
            println!("ok    adapter '{}' (profile {})", adapter.name, adapter.profile);
        }
    }

    // A refused connection is a finding, not a diagnostic failure.
    let client = reqwest::Client::new();
    match client.get(&config.backend.url).send().await {
        Ok(resp) => println!("ok    backend reachable (status {})", resp.status()),
        Err(e) => println!("warn  backend unreachable: {e}"),
    }

    Ok(())
}
