//! Data access seam between the batch pipeline and storage.
//!
//! The engines only see this trait, so tests can feed them synthetic
//! series without a database.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::domain::{ReturnMatrix, Timeframe, VolumeStats};
use crate::error::Result;
use crate::persistence::Store;

#[async_trait]
pub trait ReturnDataProvider: Send + Sync {
    /// Aligned return matrix for one timeframe
    async fn load_returns(&self, timeframe: Timeframe) -> Result<ReturnMatrix>;

    /// Latest observation date and the returns on it
    async fn latest_returns(
        &self,
        timeframe: Timeframe,
    ) -> Result<(Option<NaiveDate>, BTreeMap<String, f64>)>;

    /// Volume statistics for the trigger gate
    async fn load_volume_stats(&self) -> Result<BTreeMap<String, VolumeStats>>;
}

/// Database-backed provider
#[derive(Clone)]
pub struct DbReturnProvider {
    store: Store,
}

impl DbReturnProvider {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReturnDataProvider for DbReturnProvider {
    async fn load_returns(&self, timeframe: Timeframe) -> Result<ReturnMatrix> {
        self.store.load_return_matrix(timeframe).await
    }

    async fn latest_returns(
        &self,
        timeframe: Timeframe,
    ) -> Result<(Option<NaiveDate>, BTreeMap<String, f64>)> {
        self.store.latest_returns(timeframe).await
    }

    async fn load_volume_stats(&self) -> Result<BTreeMap<String, VolumeStats>> {
        self.store.volume_stats().await
    }
}
