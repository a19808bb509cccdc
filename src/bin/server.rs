use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use spendsync::{
    config::AppConfig, db, routes::create_router, scheduler::HttpSchedulerClient,
    spend::HttpSpendConnector, state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        database_url = %config.redacted_database_url(),
        source_base_url = %config.source_base_url,
        jobs_service_url = %config.jobs_service_url,
        "loaded configuration"
    );

    let pool = db::init_pool(&config.database_url, config.database_max_pool_size)?;
    let spend = Arc::new(HttpSpendConnector::new(
        config.source_base_url.clone(),
        config.source_client_id.clone(),
        config.source_client_secret.clone(),
    ));
    let scheduler = Arc::new(HttpSchedulerClient::new(config.jobs_service_url.clone()));

    let address = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(pool, config, spend, scheduler);
    let router = create_router(state);

    let listener = TcpListener::bind(&address).await?;
    tracing::info!(%address, "listening");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
