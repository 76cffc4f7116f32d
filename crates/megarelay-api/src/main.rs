use std::sync::Arc;

use anyhow::Context;
use megarelay_api::setup;
use megarelay_api::state::AppState;
use megarelay_core::Config;
use megarelay_storage::MegaApiGateway;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    setup::init_tracing();

    if !config.is_storage_configured() {
        tracing::error!(
            "MEGA_EMAIL and MEGA_PASSWORD are not set; uploads will fail until they are configured"
        );
    }

    std::fs::create_dir_all(&config.upload_dir).with_context(|| {
        format!(
            "failed to create temporary directory {}",
            config.upload_dir.display()
        )
    })?;

    let gateway = MegaApiGateway::new(config.mega_api_origin.clone())
        .map_err(|e| anyhow::anyhow!("failed to initialize storage gateway: {e}"))?;
    let state = Arc::new(AppState::new(config.clone(), Arc::new(gateway)));

    let router = setup::routes::setup_routes(&config, state);
    setup::server::start_server(&config, router).await?;

    Ok(())
}
