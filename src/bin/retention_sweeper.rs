use anyhow::Result;
use tracing::info;

use weather_station::{
    config::Config,
    db::{self, Store},
    logging,
    retention::RetentionSweeper,
    shutdown,
};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    logging::init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    Store::new(pool.clone()).create_schema().await?;

    let sweeper = RetentionSweeper::new(
        pool,
        config.retention_batch_size,
        config.retention_interval,
    );

    tokio::select! {
        _ = sweeper.run() => {}
        _ = shutdown::signal() => {}
    }

    info!("Retention sweeper stopped");
    Ok(())
}
