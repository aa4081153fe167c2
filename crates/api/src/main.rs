use anyhow::Context;

use stockalloc_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockalloc_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        store = %config.store,
        max_attempts = config.service.max_attempts,
        timeout_ms = config.service.timeout.as_millis() as u64,
        "configuration loaded"
    );

    let services = stockalloc_api::app::services::build_services(&config)
        .await
        .context("failed to initialise services")?;
    let app = stockalloc_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
