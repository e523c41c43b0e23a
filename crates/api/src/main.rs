use anyhow::Context;

use stockledger_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    stockledger_observability::init();

    let config = AppConfig::load().context("failed to load configuration")?;
    tracing::info!(environment = %config.environment, ledger = ?config.ledger, "configuration loaded");

    let app = stockledger_api::app::build_app(config.ledger);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
