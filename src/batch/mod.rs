//! Batch pipelines: full ingest, periodic recalculation and the daily
//! post-close update.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::{BacktestEngine, CorrelationEngine, TriggerDetector};
use crate::cache::CacheManager;
use crate::config::AppConfig;
use crate::data::returns as ret;
use crate::data::{PriceFetcher, ReturnDataProvider};
use crate::domain::{JobKind, JobTracker, Timeframe};
use crate::error::{LagError, Result};
use crate::persistence::Store;

pub struct BatchRunner<P: ReturnDataProvider> {
    store: Store,
    provider: P,
    cache: Arc<CacheManager>,
    jobs: JobTracker,
    config: AppConfig,
}

impl<P: ReturnDataProvider> BatchRunner<P> {
    pub fn new(store: Store, provider: P, cache: Arc<CacheManager>, config: AppConfig) -> Self {
        Self {
            store,
            provider,
            cache,
            jobs: JobTracker::new(),
            config,
        }
    }

    pub fn jobs(&self) -> &JobTracker {
        &self.jobs
    }

    /// Download the full price history for every known asset plus the
    /// market index, then rebuild the return tables at all timeframes.
    pub async fn run_ingest(&self, tickers: &[String]) -> Result<()> {
        let fetcher = PriceFetcher::new(&self.config.fetcher);

        info!(tickers = tickers.len(), "Starting price ingest");
        let bars = fetcher.fetch_universe(tickers).await;
        for (asset, bars) in &bars {
            self.store.upsert_prices(asset, bars).await?;
        }

        let market_bars = fetcher
            .fetch_daily(crate::data::fetcher::MARKET_SYMBOL)
            .await?;
        self.store
            .upsert_prices(crate::data::fetcher::MARKET_SYMBOL, &market_bars)
            .await?;

        self.rebuild_returns().await
    }

    /// Recompute market-adjusted returns from stored prices at every
    /// timeframe
    pub async fn rebuild_returns(&self) -> Result<()> {
        let market_prices = self
            .store
            .load_prices(crate::data::fetcher::MARKET_SYMBOL)
            .await?;
        if market_prices.is_empty() {
            return Err(LagError::PriceDataUnavailable(
                "No market index prices stored".into(),
            ));
        }
        let market_returns = ret::log_returns(&market_prices);

        let assets = self.store.list_assets().await?;
        let mut saved = 0usize;
        for asset in &assets {
            if asset == crate::data::fetcher::MARKET_SYMBOL {
                continue;
            }
            let prices = self.store.load_prices(asset).await?;
            for timeframe in Timeframe::all() {
                let series = ret::prepare_series(asset, &prices, &market_returns, timeframe);
                saved += self.store.upsert_returns(&series, timeframe).await?;
            }
        }
        info!(assets = assets.len(), rows = saved, "Return tables rebuilt");
        Ok(())
    }

    /// Full recalculation: correlation scan and backtests at every
    /// timeframe, results upserted and the caches flushed.
    pub async fn run_recalculation(&self) -> Result<Uuid> {
        let job_id = self.jobs.submit(JobKind::Recalculation)?;
        self.jobs.mark_running(job_id);

        match self.recalculate_all().await {
            Ok(summary) => {
                self.jobs.mark_completed(job_id, &summary);
                info!(%job_id, "{}", summary);
                Ok(job_id)
            }
            Err(e) => {
                self.jobs.mark_failed(job_id, e.to_string());
                Err(e)
            }
        }
    }

    async fn recalculate_all(&self) -> Result<String> {
        let a = &self.config.analysis;
        let correlation_engine =
            CorrelationEngine::new(a.min_correlation, a.significance_level, a.use_correction);
        let backtest_engine = BacktestEngine::new(a.return_threshold, a.return_threshold);

        let mut total_correlations = 0usize;
        let mut total_backtests = 0usize;

        for timeframe in Timeframe::all() {
            let matrix = self.provider.load_returns(timeframe).await?;
            if matrix.n_assets() == 0 {
                warn!(%timeframe, "No return data, skipping timeframe");
                continue;
            }

            let correlations =
                correlation_engine.analyze_all_pairs(&matrix, timeframe, a.max_lag(timeframe))?;
            if correlations.is_empty() {
                info!(%timeframe, "No significant correlations");
                continue;
            }
            self.store.upsert_correlations(&correlations).await?;
            total_correlations += correlations.len();

            let backtests = backtest_engine.backtest_all(&matrix, &correlations);
            self.store.upsert_backtests(&backtests).await?;
            total_backtests += backtests.len();
        }

        self.cache.invalidate_all();
        Ok(format!(
            "Recalculation finished: {} correlations, {} backtests",
            total_correlations, total_backtests
        ))
    }

    /// Daily update: detect triggers on the latest returns per timeframe
    /// and persist them
    pub async fn run_daily_update(&self) -> Result<Uuid> {
        let job_id = self.jobs.submit(JobKind::DailyUpdate)?;
        self.jobs.mark_running(job_id);

        match self.detect_daily_triggers().await {
            Ok(summary) => {
                self.jobs.mark_completed(job_id, &summary);
                info!(%job_id, "{}", summary);
                Ok(job_id)
            }
            Err(e) => {
                self.jobs.mark_failed(job_id, e.to_string());
                Err(e)
            }
        }
    }

    async fn detect_daily_triggers(&self) -> Result<String> {
        let a = &self.config.analysis;
        let detector = TriggerDetector::new(a.return_threshold, a.volume_threshold);
        let volume_data = self.provider.load_volume_stats().await?;

        let mut total = 0usize;
        for timeframe in Timeframe::all() {
            let (date, latest) = self.provider.latest_returns(timeframe).await?;
            let Some(date) = date else {
                warn!(%timeframe, "No return data, skipping timeframe");
                continue;
            };

            // The volume gate only makes sense at daily resolution
            let empty = BTreeMap::new();
            let volumes = if timeframe == Timeframe::Daily {
                &volume_data
            } else {
                &empty
            };

            let triggers = detector.detect_triggers(&latest, volumes, date, timeframe);
            if !triggers.is_empty() {
                self.store.upsert_triggers(&triggers).await?;
                self.cache
                    .triggers
                    .set(CacheManager::trigger_key(date, timeframe), triggers.clone());
            }
            total += triggers.len();
        }

        Ok(format!("Daily update finished: {} triggers", total))
    }
}
