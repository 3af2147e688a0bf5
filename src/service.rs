//! Read-side service: trigger listings, candidate rankings, hit-rate
//! scans and pair profiles, with result caching where it pays off.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

use crate::analysis::{BacktestEngine, CorrelationEngine, HitRateEngine, TriggerDetector};
use crate::cache::CacheManager;
use crate::config::AppConfig;
use crate::domain::{
    CandidateScore, CircularPair, Direction, HitRateOutcome, LagPoint, SignalRecord, Timeframe,
    TriggerEvent,
};
use crate::error::{LagError, Result};
use crate::persistence::Store;

pub struct AnalysisService {
    store: Store,
    cache: Arc<CacheManager>,
    config: AppConfig,
}

impl AnalysisService {
    pub fn new(store: Store, cache: Arc<CacheManager>, config: AppConfig) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Triggers for a date, served from cache when the daily update
    /// already produced them
    pub async fn triggers(
        &self,
        date: Option<NaiveDate>,
        timeframe: Timeframe,
    ) -> Result<Vec<TriggerEvent>> {
        let date = match date {
            Some(d) => d,
            None => self
                .store
                .latest_trigger_date(timeframe)
                .await?
                .ok_or_else(|| {
                    LagError::NotFound(format!("No triggers recorded for {}", timeframe))
                })?,
        };

        let key = CacheManager::trigger_key(date, timeframe);
        if let Some(cached) = self.cache.triggers.get(&key) {
            debug!(%date, %timeframe, "Trigger cache hit");
            return Ok(cached);
        }

        let triggers = self.store.load_triggers(date, timeframe).await?;
        self.cache.triggers.set(key, triggers.clone());
        Ok(triggers)
    }

    /// Ranked response candidates for a triggered asset
    pub async fn candidates(
        &self,
        asset: &str,
        timeframe: Timeframe,
        top_n: usize,
    ) -> Result<Vec<CandidateScore>> {
        let key = CacheManager::candidate_key(asset, timeframe, top_n);
        if let Some(cached) = self.cache.candidates.get(&key) {
            debug!(asset, %timeframe, "Candidate cache hit");
            return Ok(cached);
        }

        let correlations = self.store.load_correlations_for(asset, timeframe).await?;
        if correlations.is_empty() {
            return Err(LagError::NotFound(format!(
                "No stored correlations lead from {}",
                asset
            )));
        }
        let backtests = self.store.load_backtests_for(asset, timeframe).await?;

        let a = &self.config.analysis;
        let detector = TriggerDetector::new(a.return_threshold, a.volume_threshold);
        let ranked = detector.find_candidate_pairs(asset, &correlations, &backtests, top_n);

        self.cache.candidates.set(key, ranked.clone());
        Ok(ranked)
    }

    /// Lag profile for one ordered pair, computed fresh from the stored
    /// return series
    pub async fn pair_profile(
        &self,
        asset_a: &str,
        asset_b: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<LagPoint>> {
        let a = &self.config.analysis;
        let matrix = self.store.load_return_matrix(timeframe).await?;
        let engine = CorrelationEngine::new(a.min_correlation, a.significance_level, a.use_correction);
        engine.calculate_single_pair(&matrix, asset_a, asset_b, a.max_lag(timeframe))
    }

    /// Reciprocal lead/lag pairs in the stored correlation set
    pub async fn circular_pairs(&self, timeframe: Timeframe) -> Result<Vec<CircularPair>> {
        let a = &self.config.analysis;
        let correlations = self.store.load_all_correlations(timeframe).await?;
        let engine = CorrelationEngine::new(a.min_correlation, a.significance_level, a.use_correction);
        Ok(engine.detect_circular(&correlations, a.min_correlation))
    }

    /// Big-move hit-rate scan over the stored returns
    pub async fn hit_rates(&self, timeframe: Timeframe, top_n: usize) -> Result<Vec<HitRateOutcome>> {
        let a = &self.config.analysis;
        let matrix = self.store.load_return_matrix(timeframe).await?;
        let engine = HitRateEngine::new(a.move_threshold, a.min_hit_rate, a.min_samples);
        let outcomes = engine.analyze_all_pairs(&matrix, timeframe, a.max_lag(timeframe));
        Ok(engine.top_pairs(&outcomes, top_n))
    }

    /// Recent signal history for one relationship
    pub async fn recent_signals(
        &self,
        asset_a: &str,
        asset_b: &str,
        timeframe: Timeframe,
        lag: usize,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<SignalRecord>> {
        let a = &self.config.analysis;
        let matrix = self.store.load_return_matrix(timeframe).await?;
        let engine = BacktestEngine::new(a.return_threshold, a.return_threshold);
        engine.recent_signals(&matrix, asset_a, asset_b, lag, direction, limit)
    }
}
