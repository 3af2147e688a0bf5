//! Big-move hit-rate engine.
//!
//! Unlike the backtest engine, which replays previously found correlations,
//! this scans every pair directly: on each date where A moved strictly past
//! the move threshold, it checks whether B's lagged response went the
//! hypothesized way. Both the same-direction and opposite-direction
//! hypotheses are tracked per pair and lag.

use tracing::info;

use crate::domain::{Direction, HitRateOutcome, HitRateStats, ReturnMatrix, Timeframe};

/// Both hypotheses for one pair and lag. A side is `None` when it never
/// accumulated enough signals.
#[derive(Debug, Clone, Default)]
pub struct PairHitRates {
    pub positive: Option<HitRateStats>,
    pub negative: Option<HitRateStats>,
}

#[derive(Debug, Clone)]
pub struct HitRateEngine {
    move_threshold: f64,
    min_hit_rate: f64,
    min_samples: usize,
}

impl HitRateEngine {
    pub fn new(move_threshold: f64, min_hit_rate: f64, min_samples: usize) -> Self {
        Self {
            move_threshold,
            min_hit_rate,
            min_samples,
        }
    }

    /// Hit-rate of both direction hypotheses for aligned return slices.
    ///
    /// A trigger with a missing response still counts toward the signal
    /// total; it just cannot score a hit. A response of exactly zero is a
    /// miss that contributes nothing to the average.
    pub fn analyze_pair(&self, returns_a: &[f64], returns_b: &[f64], lag: usize) -> PairHitRates {
        PairHitRates {
            positive: self.scan(returns_a, returns_b, lag, Direction::Positive),
            negative: self.scan(returns_a, returns_b, lag, Direction::Negative),
        }
    }

    fn scan(
        &self,
        returns_a: &[f64],
        returns_b: &[f64],
        lag: usize,
        direction: Direction,
    ) -> Option<HitRateStats> {
        let len = returns_a.len().min(returns_b.len());
        if lag >= len {
            return None;
        }

        let mut total = 0usize;
        let mut hits = 0usize;
        let mut returns = Vec::new();

        for t in 0..len - lag {
            let ret_a = returns_a[t];
            if !ret_a.is_finite() || ret_a.abs() <= self.move_threshold {
                continue;
            }
            total += 1;

            let ret_b = returns_b[t + lag];
            if !ret_b.is_finite() {
                continue;
            }

            let expected_up = match direction {
                Direction::Positive => ret_a > 0.0,
                Direction::Negative => ret_a < 0.0,
            };
            if (expected_up && ret_b > 0.0) || (!expected_up && ret_b < 0.0) {
                hits += 1;
                returns.push(ret_b.abs());
            } else if ret_b != 0.0 {
                returns.push(-ret_b.abs());
            }
        }

        if total < self.min_samples {
            return None;
        }
        let avg_return = if returns.is_empty() {
            0.0
        } else {
            returns.iter().sum::<f64>() / returns.len() as f64
        };
        Some(HitRateStats {
            direction,
            hit_rate: hits as f64 / total as f64,
            total_signals: total,
            hits,
            avg_return,
        })
    }

    /// Scan every ordered pair of the matrix across lags 1..=max_lag and
    /// keep outcomes that clear the minimum hit-rate, sorted by hit-rate
    /// descending.
    pub fn analyze_all_pairs(
        &self,
        matrix: &ReturnMatrix,
        timeframe: Timeframe,
        max_lag: usize,
    ) -> Vec<HitRateOutcome> {
        let n = matrix.n_assets();
        info!(
            %timeframe,
            assets = n,
            max_lag,
            move_threshold = self.move_threshold,
            "Starting hit-rate scan"
        );

        let mut outcomes = Vec::new();
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                // Restrict both series to the dates where both are observed
                let col_a = matrix.column(i);
                let col_b = matrix.column(j);
                let mut common_a = Vec::new();
                let mut common_b = Vec::new();
                for t in 0..col_a.len() {
                    if col_a[t].is_finite() && col_b[t].is_finite() {
                        common_a.push(col_a[t]);
                        common_b.push(col_b[t]);
                    }
                }
                if common_a.len() < self.min_samples + max_lag {
                    continue;
                }

                for lag in 1..=max_lag {
                    let pair = self.analyze_pair(&common_a, &common_b, lag);
                    for stats in [pair.positive, pair.negative].into_iter().flatten() {
                        if stats.hit_rate >= self.min_hit_rate {
                            outcomes.push(HitRateOutcome {
                                asset_a: matrix.assets()[i].clone(),
                                asset_b: matrix.assets()[j].clone(),
                                timeframe,
                                lag,
                                direction: stats.direction,
                                hit_rate: stats.hit_rate,
                                total_signals: stats.total_signals,
                                hits: stats.hits,
                                avg_return: stats.avg_return,
                            });
                        }
                    }
                }
            }
        }

        outcomes.sort_by(|a, b| {
            b.hit_rate
                .partial_cmp(&a.hit_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    (&a.asset_a, &a.asset_b, a.lag, a.direction.as_str()).cmp(&(
                        &b.asset_a,
                        &b.asset_b,
                        b.lag,
                        b.direction.as_str(),
                    ))
                })
        });

        info!(retained = outcomes.len(), "Hit-rate scan complete");
        outcomes
    }

    /// Best `top_n` outcomes of a sorted result set
    pub fn top_pairs(&self, outcomes: &[HitRateOutcome], top_n: usize) -> Vec<HitRateOutcome> {
        outcomes.iter().take(top_n).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReturnSeries;
    use chrono::NaiveDate;

    fn engine(min_samples: usize) -> HitRateEngine {
        HitRateEngine::new(0.02, 0.55, min_samples)
    }

    #[test]
    fn test_positive_hypothesis_counts() {
        // Three big up-moves in A; B responds up twice and down once.
        let a = vec![0.03, 0.0, 0.025, 0.0, 0.021, 0.0];
        let b = vec![0.0, 0.01, 0.0, -0.02, 0.0, 0.015];

        let pair = engine(3).analyze_pair(&a, &b, 1);
        let pos = pair.positive.unwrap();
        assert_eq!(pos.total_signals, 3);
        assert_eq!(pos.hits, 2);
        assert!((pos.hit_rate - 2.0 / 3.0).abs() < 1e-12);
        // Hits contribute their magnitude, the miss is negated:
        // (0.01 + 0.015 - 0.02) / 3
        assert!((pos.avg_return - 0.005 / 3.0).abs() < 1e-12);

        let neg = pair.negative.unwrap();
        assert_eq!(neg.hits, 1);
    }

    #[test]
    fn test_down_move_with_down_response_is_positive_hit() {
        let a = vec![-0.03, 0.0, -0.025, 0.0];
        let b = vec![0.0, -0.01, 0.0, 0.02];

        let pair = engine(2).analyze_pair(&a, &b, 1);
        let pos = pair.positive.unwrap();
        assert_eq!(pos.total_signals, 2);
        assert_eq!(pos.hits, 1);
        // Hit magnitude 0.01, miss negated 0.02
        assert!((pos.avg_return - (0.01 - 0.02) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_response_counts_toward_total_only() {
        let a = vec![0.03, 0.0, 0.025, 0.0];
        let b = vec![0.0, f64::NAN, 0.0, 0.01];

        let pos = engine(2).analyze_pair(&a, &b, 1).positive.unwrap();
        assert_eq!(pos.total_signals, 2);
        assert_eq!(pos.hits, 1);
        assert_eq!(pos.hit_rate, 0.5);
    }

    #[test]
    fn test_zero_response_is_silent_miss() {
        let a = vec![0.03, 0.0, 0.025, 0.0];
        let b = vec![0.0, 0.0, 0.0, 0.01];

        let pos = engine(2).analyze_pair(&a, &b, 1).positive.unwrap();
        assert_eq!(pos.total_signals, 2);
        assert_eq!(pos.hits, 1);
        // The zero response added nothing to the average
        assert!((pos.avg_return - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_exact_threshold_is_not_a_big_move() {
        let a = vec![0.02, 0.0, 0.0];
        let b = vec![0.0, 0.01, 0.0];
        assert!(engine(1).analyze_pair(&a, &b, 1).positive.is_none());
    }

    #[test]
    fn test_insufficient_samples_yields_none() {
        let a = vec![0.03, 0.0, 0.0];
        let b = vec![0.0, 0.01, 0.0];
        let pair = engine(5).analyze_pair(&a, &b, 1);
        assert!(pair.positive.is_none());
        assert!(pair.negative.is_none());
    }

    #[test]
    fn test_all_pairs_retains_and_sorts_by_hit_rate() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut a = Vec::new();
        let mut b = Vec::new();
        // 40 alternating big moves; B always follows A one period later
        for i in 0..80 {
            if i % 2 == 0 {
                a.push(0.03);
                b.push(if i == 0 { 0.0 } else { 0.005 });
            } else {
                a.push(0.0);
                b.push(0.01);
            }
        }
        let series = vec![
            ReturnSeries::from_points(
                "AAA",
                a.iter()
                    .enumerate()
                    .map(|(i, v)| (start + chrono::Days::new(i as u64), *v)),
            ),
            ReturnSeries::from_points(
                "BBB",
                b.iter()
                    .enumerate()
                    .map(|(i, v)| (start + chrono::Days::new(i as u64), *v)),
            ),
        ];
        let matrix = ReturnMatrix::from_series(series);

        let outcomes = engine(30).analyze_all_pairs(&matrix, Timeframe::Daily, 2);
        assert!(!outcomes.is_empty());
        let top = &outcomes[0];
        assert_eq!(top.asset_a, "AAA");
        assert_eq!(top.asset_b, "BBB");
        assert_eq!(top.direction, Direction::Positive);
        assert_eq!(top.hit_rate, 1.0);
        for w in outcomes.windows(2) {
            assert!(w[0].hit_rate >= w[1].hit_rate);
        }
    }

    #[test]
    fn test_short_common_history_skipped() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = vec![
            ReturnSeries::from_points(
                "AAA",
                (0..20).map(|i| (start + chrono::Days::new(i), 0.03)),
            ),
            ReturnSeries::from_points(
                "BBB",
                (0..20).map(|i| (start + chrono::Days::new(i), 0.01)),
            ),
        ];
        let matrix = ReturnMatrix::from_series(series);
        let outcomes = engine(30).analyze_all_pairs(&matrix, Timeframe::Daily, 2);
        assert!(outcomes.is_empty());
    }
}
