//! Lagged correlation kernel.
//!
//! Scans every ordered asset pair across lags 1..=max_lag and keeps the
//! results that clear the minimum-correlation and corrected-significance
//! thresholds. `(A, B, lag)` reads as "A leads B by lag periods".

use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::analysis::stats::{self, MIN_OBSERVATIONS};
use crate::domain::{CircularPair, Direction, LagPoint, LaggedCorrelation, ReturnMatrix, Timeframe};
use crate::error::{LagError, Result};

#[derive(Debug, Clone)]
pub struct CorrelationEngine {
    min_correlation: f64,
    significance_level: f64,
    use_correction: bool,
}

impl CorrelationEngine {
    pub fn new(min_correlation: f64, significance_level: f64, use_correction: bool) -> Self {
        Self {
            min_correlation,
            significance_level,
            use_correction,
        }
    }

    /// Significance threshold after Bonferroni correction for the whole
    /// pair/lag scan
    fn alpha(&self, n_assets: usize, max_lag: usize) -> f64 {
        if !self.use_correction || n_assets < 2 {
            return self.significance_level;
        }
        let tests = (n_assets * (n_assets - 1) * max_lag) as f64;
        self.significance_level / tests
    }

    /// Scan all ordered pairs of the matrix and return the significant
    /// lagged correlations, sorted by `(asset_a, asset_b, lag)`.
    pub fn analyze_all_pairs(
        &self,
        matrix: &ReturnMatrix,
        timeframe: Timeframe,
        max_lag: usize,
    ) -> Result<Vec<LaggedCorrelation>> {
        if max_lag == 0 {
            return Err(LagError::Validation("max_lag must be at least 1".into()));
        }
        let n = matrix.n_assets();
        if n < 2 {
            debug!(assets = n, "Not enough assets for pairwise analysis");
            return Ok(Vec::new());
        }

        let alpha = self.alpha(n, max_lag);
        debug!(
            %timeframe,
            assets = n,
            max_lag,
            alpha,
            "Starting pairwise correlation scan"
        );

        let mut results: Vec<LaggedCorrelation> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                let mut found = Vec::new();
                let col_a = matrix.column(i);
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let col_b = matrix.column(j);
                    for lag in 1..=max_lag {
                        let (xs, ys) = stats::lagged_pairs(col_a, col_b, lag);
                        if xs.len() < MIN_OBSERVATIONS {
                            continue;
                        }
                        let r = stats::pearson(&xs, &ys);
                        if r.abs() < self.min_correlation {
                            continue;
                        }
                        let p = stats::p_value(r, xs.len());
                        if p >= alpha {
                            continue;
                        }
                        found.push(LaggedCorrelation {
                            asset_a: matrix.assets()[i].clone(),
                            asset_b: matrix.assets()[j].clone(),
                            timeframe,
                            lag,
                            correlation: r,
                            p_value: p,
                            direction: Direction::from_correlation(r),
                        });
                    }
                }
                found
            })
            .collect();

        results.sort_by(|a, b| {
            (&a.asset_a, &a.asset_b, a.lag).cmp(&(&b.asset_a, &b.asset_b, b.lag))
        });

        info!(
            %timeframe,
            significant = results.len(),
            "Pairwise correlation scan complete"
        );
        Ok(results)
    }

    /// Full lag profile for one ordered pair, with no significance filter.
    /// Errors if either asset is missing from the matrix.
    pub fn calculate_single_pair(
        &self,
        matrix: &ReturnMatrix,
        asset_a: &str,
        asset_b: &str,
        max_lag: usize,
    ) -> Result<Vec<LagPoint>> {
        if max_lag == 0 {
            return Err(LagError::Validation("max_lag must be at least 1".into()));
        }
        let col_a = matrix
            .column_for(asset_a)
            .ok_or_else(|| LagError::NotFound(format!("Asset not in universe: {}", asset_a)))?;
        let col_b = matrix
            .column_for(asset_b)
            .ok_or_else(|| LagError::NotFound(format!("Asset not in universe: {}", asset_b)))?;

        let mut points = Vec::with_capacity(max_lag);
        for lag in 1..=max_lag {
            let (xs, ys) = stats::lagged_pairs(col_a, col_b, lag);
            let (r, p) = if xs.len() < MIN_OBSERVATIONS {
                (0.0, 1.0)
            } else {
                let r = stats::pearson(&xs, &ys);
                (r, stats::p_value(r, xs.len()))
            };
            points.push(LagPoint {
                lag,
                correlation: r,
                p_value: p,
                direction: Direction::from_correlation(r),
            });
        }
        Ok(points)
    }

    /// Find reciprocal pairs in a result set: A leads B at some lag and
    /// B also leads A at some lag, both above `min_strength` in absolute
    /// value. Each unordered pair is reported once, using the strongest
    /// lag in each direction.
    pub fn detect_circular(
        &self,
        correlations: &[LaggedCorrelation],
        min_strength: f64,
    ) -> Vec<CircularPair> {
        // Strongest lag per ordered pair
        let mut strongest: HashMap<(&str, &str), &LaggedCorrelation> = HashMap::new();
        for c in correlations {
            let key = (c.asset_a.as_str(), c.asset_b.as_str());
            let replace = strongest
                .get(&key)
                .map(|best| c.correlation.abs() > best.correlation.abs())
                .unwrap_or(true);
            if replace {
                strongest.insert(key, c);
            }
        }

        let mut pairs = Vec::new();
        for (&(a, b), &forward) in &strongest {
            if a >= b {
                continue;
            }
            let Some(&reverse) = strongest.get(&(b, a)) else {
                continue;
            };
            if forward.correlation.abs() >= min_strength
                && reverse.correlation.abs() >= min_strength
            {
                pairs.push(CircularPair {
                    asset_a: a.to_string(),
                    asset_b: b.to_string(),
                    lag_ab: forward.lag,
                    lag_ba: reverse.lag,
                    corr_ab: forward.correlation,
                    corr_ba: reverse.correlation,
                });
            }
        }
        pairs.sort_by(|x, y| (&x.asset_a, &x.asset_b).cmp(&(&y.asset_a, &y.asset_b)));
        pairs
    }
}
