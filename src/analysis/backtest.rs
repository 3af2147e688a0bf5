//! Signal backtest engine.
//!
//! Replays a lag relationship over history: every date where the leading
//! asset moved past the trigger threshold is a signal, and the lagged
//! response of the following asset decides hit or miss.

use tracing::{info, warn};

use crate::analysis::stats::sign;
use crate::domain::{
    BacktestOutcome, Direction, LaggedCorrelation, ReturnMatrix, SignalRecord, Timeframe,
};
use crate::error::{LagError, Result};

#[derive(Debug, Clone)]
pub struct BacktestEngine {
    trigger_threshold: f64,
    response_threshold: f64,
}

impl BacktestEngine {
    pub fn new(trigger_threshold: f64, response_threshold: f64) -> Self {
        Self {
            trigger_threshold,
            response_threshold,
        }
    }

    /// Hit-rate of the rule "when A moves past the trigger threshold, B moves
    /// `direction`-consistently `lag` periods later".
    ///
    /// Signal dates whose response falls outside the series or on a missing
    /// observation are skipped, not counted as misses.
    pub fn calculate_hit_rate(
        &self,
        matrix: &ReturnMatrix,
        asset_a: &str,
        asset_b: &str,
        timeframe: Timeframe,
        lag: usize,
        direction: Direction,
    ) -> Result<BacktestOutcome> {
        let signals = self.replay(matrix, asset_a, asset_b, lag, direction)?;

        let total = signals.len();
        let hits = signals.iter().filter(|s| s.success).count();
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };

        Ok(BacktestOutcome {
            asset_a: asset_a.to_string(),
            asset_b: asset_b.to_string(),
            timeframe,
            lag,
            hit_rate,
            total_signals: total,
            successful_signals: hits,
            // Test window is the full date axis, not the signal span
            period_start: matrix.dates().first().copied(),
            period_end: matrix.dates().last().copied(),
        })
    }

    /// Most recent signals for a relationship, newest first, capped at `limit`
    pub fn recent_signals(
        &self,
        matrix: &ReturnMatrix,
        asset_a: &str,
        asset_b: &str,
        lag: usize,
        direction: Direction,
        limit: usize,
    ) -> Result<Vec<SignalRecord>> {
        let mut signals = self.replay(matrix, asset_a, asset_b, lag, direction)?;
        signals.reverse();
        signals.truncate(limit);
        Ok(signals)
    }

    /// Backtest every correlation in a result set. Rows whose assets have
    /// dropped out of the matrix are skipped with a warning; rows that never
    /// produced a signal are dropped.
    pub fn backtest_all(
        &self,
        matrix: &ReturnMatrix,
        correlations: &[LaggedCorrelation],
    ) -> Vec<BacktestOutcome> {
        let mut outcomes = Vec::new();
        for c in correlations {
            match self.calculate_hit_rate(
                matrix,
                &c.asset_a,
                &c.asset_b,
                c.timeframe,
                c.lag,
                c.direction,
            ) {
                Ok(outcome) if outcome.total_signals > 0 => outcomes.push(outcome),
                Ok(_) => {}
                Err(LagError::NotFound(msg)) => {
                    warn!(asset_a = %c.asset_a, asset_b = %c.asset_b, "Skipping backtest: {}", msg);
                }
                Err(e) => {
                    warn!(asset_a = %c.asset_a, asset_b = %c.asset_b, "Backtest failed: {}", e);
                }
            }
        }
        info!(
            requested = correlations.len(),
            produced = outcomes.len(),
            "Backtest pass complete"
        );
        outcomes
    }

    fn replay(
        &self,
        matrix: &ReturnMatrix,
        asset_a: &str,
        asset_b: &str,
        lag: usize,
        direction: Direction,
    ) -> Result<Vec<SignalRecord>> {
        if lag == 0 {
            return Err(LagError::Validation("lag must be at least 1".into()));
        }
        let col_a = matrix
            .column_for(asset_a)
            .ok_or_else(|| LagError::NotFound(format!("Asset not in universe: {}", asset_a)))?;
        let col_b = matrix
            .column_for(asset_b)
            .ok_or_else(|| LagError::NotFound(format!("Asset not in universe: {}", asset_b)))?;
        let dates = matrix.dates();

        let mut signals = Vec::new();
        for t in 0..col_a.len() {
            let ret_a = col_a[t];
            if !ret_a.is_finite() || ret_a.abs() < self.trigger_threshold {
                continue;
            }
            let Some(ret_b) = col_b.get(t + lag).copied() else {
                continue;
            };
            if !ret_b.is_finite() {
                continue;
            }

            let direction_ok = match direction {
                Direction::Positive => sign(ret_b) == sign(ret_a),
                Direction::Negative => sign(ret_b) == -sign(ret_a),
            };
            let success = direction_ok && ret_b.abs() >= self.response_threshold;

            signals.push(SignalRecord {
                date: dates[t],
                return_a: ret_a,
                return_b: ret_b,
                success,
            });
        }

        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReturnSeries;
    use chrono::NaiveDate;

    fn matrix_from(values: Vec<(&str, Vec<f64>)>) -> ReturnMatrix {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = values
            .into_iter()
            .map(|(asset, vs)| {
                ReturnSeries::from_points(
                    asset,
                    vs.into_iter()
                        .enumerate()
                        .map(|(i, v)| (start + chrono::Days::new(i as u64), v)),
                )
            })
            .collect();
        ReturnMatrix::from_series(series)
    }

    fn engine() -> BacktestEngine {
        BacktestEngine::new(0.02, 0.01)
    }

    #[test]
    fn test_positive_direction_replay() {
        let matrix = matrix_from(vec![
            ("AAA", vec![0.03, -0.01, 0.025, 0.00, -0.03]),
            ("BBB", vec![0.00, 0.028, -0.01, 0.024, 0.00]),
        ]);

        let outcome = engine()
            .calculate_hit_rate(&matrix, "AAA", "BBB", Timeframe::Daily, 1, Direction::Positive)
            .unwrap();

        // Triggers at t=0 and t=2 both hit; the t=4 trigger has no t=5
        // response and is skipped.
        assert_eq!(outcome.total_signals, 2);
        assert_eq!(outcome.successful_signals, 2);
        assert_eq!(outcome.hit_rate, 1.0);
        assert_eq!(
            outcome.period_start,
            Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
        assert_eq!(
            outcome.period_end,
            Some(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap())
        );
    }

    #[test]
    fn test_negative_direction_flips_hit_condition() {
        let matrix = matrix_from(vec![
            ("AAA", vec![0.03, 0.00, -0.025, 0.00]),
            ("BBB", vec![0.00, -0.02, 0.00, 0.015]),
        ]);

        let outcome = engine()
            .calculate_hit_rate(&matrix, "AAA", "BBB", Timeframe::Daily, 1, Direction::Negative)
            .unwrap();

        // t=0: +0.03 then -0.02, opposite sign and past threshold, hit.
        // t=2: -0.025 then +0.015, opposite sign, hit.
        assert_eq!(outcome.total_signals, 2);
        assert_eq!(outcome.successful_signals, 2);
    }

    #[test]
    fn test_small_response_is_miss_not_skip() {
        let matrix = matrix_from(vec![
            ("AAA", vec![0.03, 0.00]),
            ("BBB", vec![0.00, 0.005]),
        ]);

        let outcome = engine()
            .calculate_hit_rate(&matrix, "AAA", "BBB", Timeframe::Daily, 1, Direction::Positive)
            .unwrap();

        assert_eq!(outcome.total_signals, 1);
        assert_eq!(outcome.successful_signals, 0);
        assert_eq!(outcome.hit_rate, 0.0);
    }

    #[test]
    fn test_zero_response_counts_as_miss() {
        // sign(0.0) is 0, never equal to sign of a trigger move
        let matrix = matrix_from(vec![
            ("AAA", vec![0.03, 0.00]),
            ("BBB", vec![0.00, 0.00]),
        ]);

        let outcome = engine()
            .calculate_hit_rate(&matrix, "AAA", "BBB", Timeframe::Daily, 1, Direction::Positive)
            .unwrap();
        assert_eq!(outcome.total_signals, 1);
        assert_eq!(outcome.successful_signals, 0);
    }

    #[test]
    fn test_missing_response_skipped() {
        let matrix = matrix_from(vec![
            ("AAA", vec![0.03, 0.00, 0.03]),
            ("BBB", vec![0.00, f64::NAN, 0.00]),
        ]);

        let outcome = engine()
            .calculate_hit_rate(&matrix, "AAA", "BBB", Timeframe::Daily, 1, Direction::Positive)
            .unwrap();
        // t=0 response is NaN (skipped), t=2 response out of range (skipped)
        assert_eq!(outcome.total_signals, 0);
        assert_eq!(outcome.hit_rate, 0.0);
        // The test window still covers the whole date axis
        assert_eq!(
            outcome.period_start,
            Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_negated_follower_mirrors_classification() {
        // Negating every B return and asking for the opposite direction
        // must reproduce the exact same hit/miss sequence: the sign test
        // flips branches while |ret_b| is unchanged.
        // Mix of hits, a wrong-direction miss and a too-small miss
        let a = vec![0.03, -0.01, 0.025, -0.022, 0.00, 0.04, -0.03];
        let b = vec![0.00, -0.028, -0.008, 0.024, -0.03, 0.00, 0.005];
        let neg_b: Vec<f64> = b.iter().map(|v| -v).collect();

        let matrix = matrix_from(vec![("AAA", a.clone()), ("BBB", b)]);
        let mirrored = matrix_from(vec![("AAA", a), ("BBB", neg_b)]);
        let e = engine();

        let positive = e
            .calculate_hit_rate(&matrix, "AAA", "BBB", Timeframe::Daily, 1, Direction::Positive)
            .unwrap();
        let negative = e
            .calculate_hit_rate(&mirrored, "AAA", "BBB", Timeframe::Daily, 1, Direction::Negative)
            .unwrap();

        assert_eq!(positive.total_signals, negative.total_signals);
        assert_eq!(positive.successful_signals, negative.successful_signals);
        assert_eq!(positive.hit_rate, negative.hit_rate);

        // Signal-by-signal, same dates and same outcomes
        let sig_pos = e
            .recent_signals(&matrix, "AAA", "BBB", 1, Direction::Positive, usize::MAX)
            .unwrap();
        let sig_neg = e
            .recent_signals(&mirrored, "AAA", "BBB", 1, Direction::Negative, usize::MAX)
            .unwrap();
        assert_eq!(sig_pos.len(), sig_neg.len());
        for (p, n) in sig_pos.iter().zip(&sig_neg) {
            assert_eq!(p.date, n.date);
            assert_eq!(p.success, n.success);
            assert_eq!(p.return_b, -n.return_b);
        }
    }

    #[test]
    fn test_replay_is_idempotent() {
        let matrix = matrix_from(vec![
            ("AAA", vec![0.03, -0.01, 0.025, 0.00, -0.03, 0.021]),
            ("BBB", vec![0.00, 0.028, -0.01, 0.024, 0.00, -0.005]),
        ]);
        let e = engine();
        let first = e
            .calculate_hit_rate(&matrix, "AAA", "BBB", Timeframe::Daily, 1, Direction::Positive)
            .unwrap();
        let second = e
            .calculate_hit_rate(&matrix, "AAA", "BBB", Timeframe::Daily, 1, Direction::Positive)
            .unwrap();
        assert_eq!(first.total_signals, second.total_signals);
        assert_eq!(first.successful_signals, second.successful_signals);
        assert_eq!(first.hit_rate, second.hit_rate);
    }

    #[test]
    fn test_recent_signals_newest_first_and_capped() {
        let matrix = matrix_from(vec![
            ("AAA", vec![0.03, 0.025, 0.021, 0.04, 0.00]),
            ("BBB", vec![0.00, 0.02, 0.02, -0.005, 0.02]),
        ]);

        let signals = engine()
            .recent_signals(&matrix, "AAA", "BBB", 1, Direction::Positive, 2)
            .unwrap();
        assert_eq!(signals.len(), 2);
        assert!(signals[0].date > signals[1].date);
        assert_eq!(signals[0].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
    }

    #[test]
    fn test_backtest_all_skips_missing_assets_and_empty_rows() {
        let matrix = matrix_from(vec![
            ("AAA", vec![0.03, 0.00, 0.025, 0.00]),
            ("BBB", vec![0.00, 0.028, 0.00, 0.024]),
        ]);
        let make = |a: &str, b: &str| LaggedCorrelation {
            asset_a: a.to_string(),
            asset_b: b.to_string(),
            timeframe: Timeframe::Daily,
            lag: 1,
            correlation: 0.5,
            p_value: 0.001,
            direction: Direction::Positive,
        };
        let correlations = vec![make("AAA", "BBB"), make("AAA", "GONE")];

        let outcomes = engine().backtest_all(&matrix, &correlations);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].asset_b, "BBB");
    }
}
