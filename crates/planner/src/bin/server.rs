use std::sync::Arc;

use anyhow::Context;
use planner::config::PlannerConfig;
use planner::server::create_router;
use planner::types::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = PlannerConfig::from_env().context("failed to load planner config")?;
    let address = config.listen_address();
    let idle = config.session_idle();
    info!(
        "Starting planner server on {} (generator at {})",
        address, config.generator_base_url
    );

    let state = Arc::new(AppState::new(config).context("failed to create app state")?);

    let pruner = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            pruner.prune_idle(idle);
            pruner.client.cache().cleanup_expired();
        }
    });

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
