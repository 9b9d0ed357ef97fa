//! `structureone [config-path]`

use std::sync::Arc;

use anyhow::Context;
use structureone::config::{ConfigLoader, DEFAULT_TOKEN_SECRET};
use structureone::server::Server;

const DEFAULT_CONFIG_PATH: &str = "structureone.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = ConfigLoader::new()
        .with_defaults()
        .with_optional_file(&path)
        .with_context(|| format!("failed to read {path}"))?
        .with_dotenv()
        .with_env_prefix("STRUCTUREONE")
        .with_legacy_env()
        .load()
        .context("invalid configuration")?;

    structureone::telemetry::init_telemetry(
        &structureone::log_config(&config),
        &structureone::metrics_config(&config),
    )
    .context("failed to initialize telemetry")?;

    if config.token.secret == DEFAULT_TOKEN_SECRET {
        tracing::warn!("token.secret is the built-in default; set API_TOKEN_SECRET before deploying");
    }

    let dispatcher = structureone::build_dispatcher(&config).context("failed to build dispatcher")?;
    tracing::info!(
        app = %config.app.name,
        addr = %config.server.bind_addr(),
        debug = config.app.debug,
        "starting"
    );

    Server::new(structureone::server_config(&config), Arc::new(dispatcher))
        .run()
        .await
        .context("server error")?;
    Ok(())
}
