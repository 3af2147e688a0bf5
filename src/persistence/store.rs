//! PostgreSQL persistence for prices, returns and analysis results.
//!
//! All result writes are upserts on the table's natural key so repeated
//! recalculation runs converge instead of accumulating duplicates.

use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::data::fetcher::DailyBar;
use crate::domain::{
    BacktestOutcome, Direction, LaggedCorrelation, ReturnMatrix, ReturnSeries, Timeframe,
    TriggerEvent, VolumeStats,
};
use crate::error::{LagError, Result};

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        info!("Connected to database");
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Migrations applied");
        Ok(())
    }

    // ---- prices ----

    pub async fn upsert_prices(&self, asset: &str, bars: &[DailyBar]) -> Result<usize> {
        let mut count = 0;
        for bar in bars {
            sqlx::query(
                r#"
                INSERT INTO daily_prices (asset, date, adj_close, volume)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (asset, date)
                DO UPDATE SET adj_close = EXCLUDED.adj_close, volume = EXCLUDED.volume
                "#,
            )
            .bind(asset)
            .bind(bar.date)
            .bind(bar.close)
            .bind(bar.volume)
            .execute(&self.pool)
            .await?;
            count += 1;
        }
        debug!(asset, rows = count, "Prices upserted");
        Ok(count)
    }

    pub async fn load_prices(&self, asset: &str) -> Result<BTreeMap<NaiveDate, f64>> {
        let rows = sqlx::query(
            "SELECT date, adj_close FROM daily_prices WHERE asset = $1 ORDER BY date",
        )
        .bind(asset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("date"), row.get("adj_close")))
            .collect())
    }

    pub async fn list_assets(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT asset FROM daily_prices ORDER BY asset")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|row| row.get("asset")).collect())
    }

    // ---- returns ----

    pub async fn upsert_returns(&self, series: &ReturnSeries, timeframe: Timeframe) -> Result<usize> {
        let mut count = 0;
        for (&date, &value) in &series.points {
            if !value.is_finite() {
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO returns (asset, date, timeframe, return_value)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (asset, date, timeframe)
                DO UPDATE SET return_value = EXCLUDED.return_value
                "#,
            )
            .bind(&series.asset)
            .bind(date)
            .bind(timeframe.as_str())
            .bind(value)
            .execute(&self.pool)
            .await?;
            count += 1;
        }
        Ok(count)
    }

    /// Load every asset's return series at one timeframe, aligned on the
    /// union of dates
    pub async fn load_return_matrix(&self, timeframe: Timeframe) -> Result<ReturnMatrix> {
        let rows = sqlx::query(
            "SELECT asset, date, return_value FROM returns WHERE timeframe = $1 ORDER BY asset, date",
        )
        .bind(timeframe.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut by_asset: BTreeMap<String, ReturnSeries> = BTreeMap::new();
        for row in rows {
            let asset: String = row.get("asset");
            let date: NaiveDate = row.get("date");
            let value: f64 = row.get("return_value");
            by_asset
                .entry(asset.clone())
                .or_insert_with(|| ReturnSeries::new(asset))
                .points
                .insert(date, value);
        }
        Ok(ReturnMatrix::from_series(by_asset.into_values().collect()))
    }

    /// Returns for the most recent date at a timeframe
    pub async fn latest_returns(&self, timeframe: Timeframe) -> Result<(Option<NaiveDate>, BTreeMap<String, f64>)> {
        let rows = sqlx::query(
            r#"
            SELECT asset, date, return_value FROM returns
            WHERE timeframe = $1
              AND date = (SELECT MAX(date) FROM returns WHERE timeframe = $1)
            "#,
        )
        .bind(timeframe.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut date = None;
        let mut out = BTreeMap::new();
        for row in rows {
            date = Some(row.get("date"));
            out.insert(row.get("asset"), row.get("return_value"));
        }
        Ok((date, out))
    }

    /// Today's volume and trailing 20-day average per asset. Assets with
    /// fewer than two observations are omitted.
    pub async fn volume_stats(&self) -> Result<BTreeMap<String, VolumeStats>> {
        let rows = sqlx::query(
            r#"
            SELECT asset, date, volume FROM (
                SELECT asset, date, volume,
                       ROW_NUMBER() OVER (PARTITION BY asset ORDER BY date DESC) AS rn
                FROM daily_prices
                WHERE volume IS NOT NULL
            ) t
            WHERE rn <= 21
            ORDER BY asset, date DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut volumes: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for row in rows {
            let asset: String = row.get("asset");
            let volume: f64 = row.get("volume");
            volumes.entry(asset).or_default().push(volume);
        }

        let mut out = BTreeMap::new();
        for (asset, vols) in volumes {
            if vols.len() < 2 {
                continue;
            }
            let today = vols[0];
            let past = &vols[1..];
            let avg = past.iter().sum::<f64>() / past.len() as f64;
            out.insert(
                asset,
                VolumeStats {
                    today_volume: today,
                    avg_20d_volume: avg,
                },
            );
        }
        Ok(out)
    }

    // ---- correlations ----

    pub async fn upsert_correlations(&self, correlations: &[LaggedCorrelation]) -> Result<usize> {
        for c in correlations {
            sqlx::query(
                r#"
                INSERT INTO correlations (asset_a, asset_b, timeframe, lag, correlation, p_value, direction, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, now())
                ON CONFLICT (asset_a, asset_b, timeframe, lag)
                DO UPDATE SET correlation = EXCLUDED.correlation,
                              p_value = EXCLUDED.p_value,
                              direction = EXCLUDED.direction,
                              updated_at = now()
                "#,
            )
            .bind(&c.asset_a)
            .bind(&c.asset_b)
            .bind(c.timeframe.as_str())
            .bind(c.lag as i32)
            .bind(c.correlation)
            .bind(c.p_value)
            .bind(c.direction.as_str())
            .execute(&self.pool)
            .await?;
        }
        Ok(correlations.len())
    }

    /// Significant correlations with `asset_a` on the leading side
    pub async fn load_correlations_for(
        &self,
        asset_a: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<LaggedCorrelation>> {
        let rows = sqlx::query(
            r#"
            SELECT asset_a, asset_b, timeframe, lag, correlation, p_value, direction
            FROM correlations
            WHERE asset_a = $1 AND timeframe = $2
            ORDER BY asset_b, lag
            "#,
        )
        .bind(asset_a)
        .bind(timeframe.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_correlation).collect()
    }

    pub async fn load_all_correlations(&self, timeframe: Timeframe) -> Result<Vec<LaggedCorrelation>> {
        let rows = sqlx::query(
            r#"
            SELECT asset_a, asset_b, timeframe, lag, correlation, p_value, direction
            FROM correlations
            WHERE timeframe = $1
            ORDER BY asset_a, asset_b, lag
            "#,
        )
        .bind(timeframe.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_correlation).collect()
    }

    // ---- backtests ----

    pub async fn upsert_backtests(&self, outcomes: &[BacktestOutcome]) -> Result<usize> {
        for b in outcomes {
            sqlx::query(
                r#"
                INSERT INTO backtest_results
                    (asset_a, asset_b, timeframe, lag, hit_rate, total_signals,
                     successful_signals, period_start, period_end, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
                ON CONFLICT (asset_a, asset_b, timeframe, lag)
                DO UPDATE SET hit_rate = EXCLUDED.hit_rate,
                              total_signals = EXCLUDED.total_signals,
                              successful_signals = EXCLUDED.successful_signals,
                              period_start = EXCLUDED.period_start,
                              period_end = EXCLUDED.period_end,
                              updated_at = now()
                "#,
            )
            .bind(&b.asset_a)
            .bind(&b.asset_b)
            .bind(b.timeframe.as_str())
            .bind(b.lag as i32)
            .bind(b.hit_rate)
            .bind(b.total_signals as i32)
            .bind(b.successful_signals as i32)
            .bind(b.period_start)
            .bind(b.period_end)
            .execute(&self.pool)
            .await?;
        }
        Ok(outcomes.len())
    }

    pub async fn load_backtests_for(
        &self,
        asset_a: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<BacktestOutcome>> {
        let rows = sqlx::query(
            r#"
            SELECT asset_a, asset_b, timeframe, lag, hit_rate, total_signals,
                   successful_signals, period_start, period_end
            FROM backtest_results
            WHERE asset_a = $1 AND timeframe = $2
            ORDER BY asset_b, lag
            "#,
        )
        .bind(asset_a)
        .bind(timeframe.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let timeframe: String = row.get("timeframe");
                Ok(BacktestOutcome {
                    asset_a: row.get("asset_a"),
                    asset_b: row.get("asset_b"),
                    timeframe: Timeframe::try_from(timeframe.as_str())
                        .map_err(LagError::Internal)?,
                    lag: row.get::<i32, _>("lag") as usize,
                    hit_rate: row.get("hit_rate"),
                    total_signals: row.get::<i32, _>("total_signals") as usize,
                    successful_signals: row.get::<i32, _>("successful_signals") as usize,
                    period_start: row.get("period_start"),
                    period_end: row.get("period_end"),
                })
            })
            .collect()
    }

    // ---- triggers ----

    pub async fn upsert_triggers(&self, triggers: &[TriggerEvent]) -> Result<usize> {
        for t in triggers {
            sqlx::query(
                r#"
                INSERT INTO daily_triggers (asset, date, timeframe, return_value, volume_ratio)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (asset, date, timeframe)
                DO UPDATE SET return_value = EXCLUDED.return_value,
                              volume_ratio = EXCLUDED.volume_ratio
                "#,
            )
            .bind(&t.asset)
            .bind(t.date)
            .bind(t.timeframe.as_str())
            .bind(t.return_value)
            .bind(t.volume_ratio)
            .execute(&self.pool)
            .await?;
        }
        Ok(triggers.len())
    }

    pub async fn load_triggers(
        &self,
        date: NaiveDate,
        timeframe: Timeframe,
    ) -> Result<Vec<TriggerEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT asset, date, timeframe, return_value, volume_ratio
            FROM daily_triggers
            WHERE date = $1 AND timeframe = $2
            ORDER BY asset
            "#,
        )
        .bind(date)
        .bind(timeframe.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let timeframe: String = row.get("timeframe");
                Ok(TriggerEvent {
                    asset: row.get("asset"),
                    date: row.get("date"),
                    timeframe: Timeframe::try_from(timeframe.as_str())
                        .map_err(LagError::Internal)?,
                    return_value: row.get("return_value"),
                    volume_ratio: row.get("volume_ratio"),
                })
            })
            .collect()
    }

    pub async fn latest_trigger_date(&self, timeframe: Timeframe) -> Result<Option<NaiveDate>> {
        let row = sqlx::query("SELECT MAX(date) AS date FROM daily_triggers WHERE timeframe = $1")
            .bind(timeframe.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("date"))
    }
}

fn row_to_correlation(row: sqlx::postgres::PgRow) -> Result<LaggedCorrelation> {
    let timeframe: String = row.get("timeframe");
    let direction: String = row.get("direction");
    Ok(LaggedCorrelation {
        asset_a: row.get("asset_a"),
        asset_b: row.get("asset_b"),
        timeframe: Timeframe::try_from(timeframe.as_str()).map_err(LagError::Internal)?,
        lag: row.get::<i32, _>("lag") as usize,
        correlation: row.get("correlation"),
        p_value: row.get("p_value"),
        direction: Direction::try_from(direction.as_str()).map_err(LagError::Internal)?,
    })
}
