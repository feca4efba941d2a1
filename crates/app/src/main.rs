mod employees;
mod mailer;
mod router;
mod telemetry;

use std::net::SocketAddr;

use tracing::info;

use staffdir_storage::Database;
use staffdir_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let storage = Database::connect(&config.database_url).await?;
    storage.run_migrations().await?;

    let (mailer, worker) = mailer::mailer_channel();
    worker.spawn();

    let state = router::AppState::new(metrics, storage, mailer, config.debug);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), debug = config.debug, "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
