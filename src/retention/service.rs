use std::time::Duration;

use sqlx::{Connection, SqlitePool};
use tokio::time;
use tracing::{error, info};

use crate::db::{self, models::Source, StoreError};

/// Rows removed from one table during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSweep {
    pub source: Source,
    pub deleted: u64,
}

/// Periodically trims every tracked table by its oldest rows.
pub struct RetentionSweeper {
    pool: SqlitePool,
    sources: Vec<Source>,
    batch_size: u32,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(pool: SqlitePool, batch_size: u32, interval: Duration) -> Self {
        Self {
            pool,
            sources: Source::ALL.to_vec(),
            batch_size,
            interval,
        }
    }

    /// Runs the sweep loop indefinitely.
    /// Spawn this via `tokio::spawn` or await it as the process body.
    ///
    /// The pause starts when a sweep finishes, so sweep time adds to the
    /// period instead of being absorbed by it.
    pub async fn run(self) {
        info!(
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            "Retention sweeper started"
        );

        loop {
            match self.sweep_once().await {
                Ok(report) => {
                    for TableSweep { source, deleted } in report {
                        info!(table = source.table(), deleted, "Deleted oldest records");
                    }
                    info!("Oldest records deleted successfully");
                }
                Err(e) => error!(error = %e, "Retention sweep failed"),
            }
            time::sleep(self.interval).await;
        }
    }

    /// One sweep: a single connection and transaction covering every table.
    ///
    /// The connection is detached from the pool and closed afterwards, so
    /// nothing stays open across the sleep.
    pub async fn sweep_once(&self) -> Result<Vec<TableSweep>, StoreError> {
        let mut conn = self.pool.acquire().await?.detach();
        let mut tx = conn.begin().await?;
        let mut report = Vec::with_capacity(self.sources.len());

        for &source in &self.sources {
            let deleted = db::delete_oldest(&mut *tx, source, self.batch_size).await?;
            report.push(TableSweep { source, deleted });
        }

        tx.commit().await?;
        conn.close().await?;
        Ok(report)
    }
}
