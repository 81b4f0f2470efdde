use anyhow::Result;
use dockmon::config::AppConfig;
use dockmon::{logging, routes, storage};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let app_config = AppConfig::load()?;
    let store = Arc::new(storage::connect(&app_config.storage).await?);

    let app = routes::app(store);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        build = %dockmon::version::BUILD,
        backend = ?app_config.storage.backend,
        "Listening on http://{}{}",
        addr,
        routes::METRICS_PATH
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(logging::shutdown_signal())
    .await?;

    Ok(())
}
