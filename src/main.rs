use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;

use weather_station::{
    api::{self, AppState},
    auth::{PasswordHasher, SessionStore},
    config::Config,
    db::{self, Store},
    logging, shutdown,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();
    logging::init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    let store = Store::new(pool);
    store.create_schema().await?;
    info!("Database ready");

    let state = AppState::new(
        store,
        SessionStore::new(),
        PasswordHasher::new(config.password.clone()),
    );

    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown::signal())
        .await?;

    Ok(())
}
