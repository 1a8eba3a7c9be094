//! Runs next to a remote sensor: reads its serial device and forwards each
//! sample to the socket ingester. The remote device prints UTF-8.

use anyhow::{Context, Result};
use tokio::net::TcpStream;
use tracing::{info, warn};

use weather_station::{
    config::Config,
    logging, relay,
    sensors::{SerialSource, TextEncoding},
    shutdown,
};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    logging::init();

    let config = Config::from_env()?;

    let mut source = match SerialSource::open(
        &config.serial_port,
        config.serial_baud_rate,
        config.serial_timeout,
        TextEncoding::Utf8,
    ) {
        Ok(source) => source,
        Err(e) => {
            warn!(error = %e, "Serial device unavailable, nothing to relay");
            return Ok(());
        }
    };

    let addr = config.ingest_addr();
    let mut stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("could not connect to ingest listener at {addr}"))?;
    info!(addr = %addr, "Connected to ingest listener");

    tokio::select! {
        result = relay::forward(&mut source, &mut stream) => { result?; }
        _ = shutdown::signal() => {}
    }

    info!("Relay client stopped");
    Ok(())
}
