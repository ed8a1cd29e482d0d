//! Smart order router server

use std::path::Path;

use anyhow::Context;
use balancer::JsonFilePoolSource;
use sor_api::AppState;
use sor_core::AppConfig;
use tracing_subscriber::EnvFilter;

/// Environment variable naming the JSON config file
pub const CONFIG_ENV: &str = "SOR_CONFIG";

/// Install the global subscriber. `RUST_LOG` directives come first.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("sor=debug".parse()?)
        .add_directive("balancer=debug".parse()?)
        .add_directive("info".parse()?);
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Config from `SOR_CONFIG` when set, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

/// Load config, build the router and serve until the listener fails.
pub async fn run() -> anyhow::Result<()> {
    init_tracing()?;

    let config_path = std::env::var_os(CONFIG_ENV).map(std::path::PathBuf::from);
    let config = load_config(config_path.as_deref())?;
    tracing::info!(
        port = config.api_port,
        data_dir = %config.data_dir.display(),
        "Starting smart order router"
    );

    let source = JsonFilePoolSource::new(config.data_dir.clone());
    let state = AppState::new(config, source);

    sor_api::start_server(state)
        .await
        .context("API server stopped")?;
    Ok(())
}
