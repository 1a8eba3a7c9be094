//! Read-only views over the store for the presentation layer.

use crate::db::{
    models::{Averages, Reading, Source},
    Store, StoreError,
};

/// Every reading of one source together with both flavours of mean.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    pub source: Source,
    pub readings: Vec<Reading>,
    /// Mean over the rows currently in the table, computed on read.
    pub current_window_average: Option<Averages>,
    /// Trigger-maintained snapshot. Only refreshed on insert, so it still
    /// includes rows the retention sweeper removed since the last insert.
    pub lifetime_average: Option<Averages>,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    store: Store,
}

impl Dashboard {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Newest reading of the local and the remote source.
    pub async fn latest_pair(&self) -> Result<(Option<Reading>, Option<Reading>), StoreError> {
        let local = self.store.latest(Source::Local).await?;
        let remote = self.store.latest(Source::Remote).await?;
        Ok((local, remote))
    }

    pub async fn history(&self, source: Source) -> Result<History, StoreError> {
        let readings = self.store.all_readings(source).await?;
        let current_window_average = Averages::of(&readings);
        let lifetime_average = self.store.snapshot(source).await?;
        Ok(History {
            source,
            readings,
            current_window_average,
            lifetime_average,
        })
    }
}
