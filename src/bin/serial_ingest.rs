//! Reads the locally attached sensor and stores its samples in the local
//! table. The device prints Latin-1. A missing device is reported and the
//! process exits cleanly.

use anyhow::Result;
use tracing::{info, warn};

use weather_station::{
    config::Config,
    db::{self, models::Source, Store},
    logging,
    sensors::{IngestService, SerialSource, TextEncoding},
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

    let mut source = match SerialSource::open(
        &config.serial_port,
        config.serial_baud_rate,
        config.serial_timeout,
        TextEncoding::Latin1,
    ) {
        Ok(source) => source,
        Err(e) => {
            warn!(error = %e, "Serial device unavailable, nothing to ingest");
            return Ok(());
        }
    };

    let service = IngestService::new(store, Source::Local);
    tokio::select! {
        stored = service.run(&mut source) => info!(stored, "Serial device closed"),
        _ = shutdown::signal() => {}
    }

    info!("Serial ingester stopped");
    Ok(())
}
