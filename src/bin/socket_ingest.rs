//! Accepts one relay client over TCP and stores its samples in the remote
//! table until the peer disconnects.

use anyhow::Result;
use tracing::info;

use weather_station::{
    config::Config,
    db::{self, models::Source, Store},
    logging,
    sensors::{IngestService, SocketListener},
    shutdown,
};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    logging::init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    let store = Store::new(pool);
    store.create_schema().await?;

    let addr = config.ingest_addr();
    let listener = SocketListener::bind(&addr).await?;
    info!(addr = %addr, "Listening for sensor data");

    let service = IngestService::new(store, Source::Remote);
    tokio::select! {
        result = async {
            let mut source = listener.accept_one().await?;
            anyhow::Ok(service.run(&mut source).await)
        } => {
            let stored = result?;
            info!(stored, "Ingest peer disconnected");
        }
        _ = shutdown::signal() => {}
    }

    info!("Socket ingester stopped");
    Ok(())
}
