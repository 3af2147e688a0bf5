//! Trigger detection and candidate ranking.
//!
//! Detection flags assets whose latest return crossed the return threshold
//! with unusual volume. Ranking then scores the stored lag relationships
//! that have the triggered asset on the leading side.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::info;

use crate::domain::{
    BacktestOutcome, CandidateScore, LaggedCorrelation, Timeframe, TriggerEvent, VolumeStats,
};

const SCORE_WEIGHT_CORRELATION: f64 = 0.4;
const SCORE_WEIGHT_HIT_RATE: f64 = 0.4;
const SCORE_WEIGHT_P_VALUE: f64 = 0.2;

/// Hit-rate assumed for a candidate with no backtest history
const DEFAULT_HIT_RATE: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct TriggerDetector {
    return_threshold: f64,
    volume_threshold: f64,
}

impl TriggerDetector {
    pub fn new(return_threshold: f64, volume_threshold: f64) -> Self {
        Self {
            return_threshold,
            volume_threshold,
        }
    }

    /// Flag assets whose latest return crossed the threshold.
    ///
    /// The volume gate only applies when volume statistics exist for the
    /// asset and the trailing average is positive; otherwise the asset
    /// passes on return alone with a ratio of 1.0.
    pub fn detect_triggers(
        &self,
        latest_returns: &BTreeMap<String, f64>,
        volume_data: &BTreeMap<String, VolumeStats>,
        date: NaiveDate,
        timeframe: Timeframe,
    ) -> Vec<TriggerEvent> {
        let mut triggered = Vec::new();

        for (asset, &ret) in latest_returns {
            if !ret.is_finite() || ret.abs() < self.return_threshold {
                continue;
            }

            let mut volume_ratio = 1.0;
            if let Some(vol) = volume_data.get(asset) {
                if vol.avg_20d_volume > 0.0 {
                    volume_ratio = vol.today_volume / vol.avg_20d_volume;
                    if volume_ratio < self.volume_threshold {
                        continue;
                    }
                }
            }

            triggered.push(TriggerEvent {
                asset: asset.clone(),
                date,
                timeframe,
                return_value: ret,
                volume_ratio,
            });
        }

        info!(
            %timeframe,
            %date,
            triggered = triggered.len(),
            "Trigger detection complete"
        );
        triggered
    }

    /// Rank the response candidates for a triggered asset.
    ///
    /// Correlations with the trigger on the leading side are joined with
    /// their backtest hit-rates (0.5 when absent) and scored
    /// `0.4 * |corr| + 0.4 * hit_rate + 0.2 * p_norm` where p-values are
    /// normalized against the largest one in the candidate set.
    pub fn find_candidate_pairs(
        &self,
        trigger_asset: &str,
        correlations: &[LaggedCorrelation],
        backtests: &[BacktestOutcome],
        top_n: usize,
    ) -> Vec<CandidateScore> {
        let candidates: Vec<&LaggedCorrelation> = correlations
            .iter()
            .filter(|c| c.asset_a == trigger_asset)
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }

        let max_p = candidates
            .iter()
            .map(|c| c.p_value)
            .fold(0.0_f64, f64::max);

        let mut scored: Vec<CandidateScore> = candidates
            .into_iter()
            .map(|c| {
                let hit_rate = backtests
                    .iter()
                    .find(|b| {
                        b.asset_a == c.asset_a
                            && b.asset_b == c.asset_b
                            && b.timeframe == c.timeframe
                            && b.lag == c.lag
                    })
                    .map(|b| b.hit_rate)
                    .unwrap_or(DEFAULT_HIT_RATE);

                let p_norm = if max_p > 0.0 {
                    1.0 - c.p_value / max_p
                } else {
                    0.5
                };
                let score = SCORE_WEIGHT_CORRELATION * c.correlation.abs()
                    + SCORE_WEIGHT_HIT_RATE * hit_rate
                    + SCORE_WEIGHT_P_VALUE * p_norm;

                CandidateScore {
                    asset_b: c.asset_b.clone(),
                    lag: c.lag,
                    correlation: c.correlation,
                    p_value: c.p_value,
                    hit_rate,
                    direction: c.direction,
                    score,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (&a.asset_b, a.lag).cmp(&(&b.asset_b, b.lag)))
        });
        scored.truncate(top_n);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;

    fn detector() -> TriggerDetector {
        TriggerDetector::new(0.02, 1.5)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn corr(b: &str, lag: usize, r: f64, p: f64) -> LaggedCorrelation {
        LaggedCorrelation {
            asset_a: "AAA".to_string(),
            asset_b: b.to_string(),
            timeframe: Timeframe::Daily,
            lag,
            correlation: r,
            p_value: p,
            direction: Direction::from_correlation(r),
        }
    }

    fn backtest(b: &str, lag: usize, hit_rate: f64) -> BacktestOutcome {
        BacktestOutcome {
            asset_a: "AAA".to_string(),
            asset_b: b.to_string(),
            timeframe: Timeframe::Daily,
            lag,
            hit_rate,
            total_signals: 40,
            successful_signals: (40.0 * hit_rate) as usize,
            period_start: None,
            period_end: None,
        }
    }

    #[test]
    fn test_detect_requires_return_threshold() {
        let returns = BTreeMap::from([
            ("AAA".to_string(), 0.03),
            ("BBB".to_string(), 0.01),
            ("CCC".to_string(), -0.025),
        ]);
        let triggers = detector().detect_triggers(&returns, &BTreeMap::new(), day(), Timeframe::Daily);

        let assets: Vec<&str> = triggers.iter().map(|t| t.asset.as_str()).collect();
        assert_eq!(assets, vec!["AAA", "CCC"]);
        assert!(triggers.iter().all(|t| t.volume_ratio == 1.0));
    }

    #[test]
    fn test_volume_gate_blocks_quiet_moves() {
        let returns = BTreeMap::from([("AAA".to_string(), 0.03), ("BBB".to_string(), 0.03)]);
        let volumes = BTreeMap::from([
            (
                "AAA".to_string(),
                VolumeStats {
                    today_volume: 2_000_000.0,
                    avg_20d_volume: 1_000_000.0,
                },
            ),
            (
                "BBB".to_string(),
                VolumeStats {
                    today_volume: 1_100_000.0,
                    avg_20d_volume: 1_000_000.0,
                },
            ),
        ]);

        let triggers = detector().detect_triggers(&returns, &volumes, day(), Timeframe::Daily);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].asset, "AAA");
        assert!((triggers[0].volume_ratio - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_average_volume_passes_on_return_alone() {
        let returns = BTreeMap::from([("AAA".to_string(), 0.03)]);
        let volumes = BTreeMap::from([(
            "AAA".to_string(),
            VolumeStats {
                today_volume: 500.0,
                avg_20d_volume: 0.0,
            },
        )]);

        let triggers = detector().detect_triggers(&returns, &volumes, day(), Timeframe::Daily);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].volume_ratio, 1.0);
    }

    #[test]
    fn test_candidate_scoring_and_ranking() {
        // BBB: |corr| 0.5, hit_rate 0.7, p = max within set so p_norm = 0
        // CCC: |corr| 0.8, hit_rate default 0.5, p = 0 so p_norm = 1
        let correlations = vec![corr("BBB", 1, 0.5, 0.01), corr("CCC", 2, -0.8, 0.0)];
        let backtests = vec![backtest("BBB", 1, 0.7)];

        let ranked = detector().find_candidate_pairs("AAA", &correlations, &backtests, 10);
        assert_eq!(ranked.len(), 2);

        assert_eq!(ranked[0].asset_b, "CCC");
        assert!((ranked[0].score - 0.72).abs() < 1e-12);
        assert_eq!(ranked[0].hit_rate, DEFAULT_HIT_RATE);

        assert_eq!(ranked[1].asset_b, "BBB");
        assert!((ranked[1].score - 0.48).abs() < 1e-12);
    }

    #[test]
    fn test_strong_hit_rate_outranks_stronger_correlation() {
        // BBB: |corr| 0.5, hit_rate 0.8, p_norm 0.5
        //   0.4 * 0.5 + 0.4 * 0.8 + 0.2 * 0.5 = 0.62
        // CCC: |corr| 0.8, no backtest so hit_rate 0.5, p = max so p_norm 0
        //   0.4 * 0.8 + 0.4 * 0.5 + 0.2 * 0.0 = 0.52
        let correlations = vec![corr("BBB", 1, 0.5, 0.01), corr("CCC", 2, 0.8, 0.02)];
        let backtests = vec![backtest("BBB", 1, 0.8)];

        let ranked = detector().find_candidate_pairs("AAA", &correlations, &backtests, 10);
        assert_eq!(ranked.len(), 2);

        // The weaker correlation wins on the blended score
        assert_eq!(ranked[0].asset_b, "BBB");
        assert!((ranked[0].score - 0.62).abs() < 1e-12);
        assert_eq!(ranked[1].asset_b, "CCC");
        assert!((ranked[1].score - 0.52).abs() < 1e-12);
        assert!(ranked[1].correlation.abs() > ranked[0].correlation.abs());
    }

    #[test]
    fn test_all_zero_p_values_use_neutral_norm() {
        let correlations = vec![corr("BBB", 1, 0.5, 0.0)];
        let ranked = detector().find_candidate_pairs("AAA", &correlations, &[], 10);
        // 0.4 * 0.5 + 0.4 * 0.5 + 0.2 * 0.5
        assert!((ranked[0].score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_unrelated_trigger_yields_empty() {
        let correlations = vec![corr("BBB", 1, 0.5, 0.01)];
        let ranked = detector().find_candidate_pairs("ZZZ", &correlations, &[], 10);
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_top_n_caps_output() {
        let correlations = vec![
            corr("BBB", 1, 0.5, 0.01),
            corr("CCC", 1, 0.6, 0.01),
            corr("DDD", 1, 0.7, 0.01),
        ];
        let ranked = detector().find_candidate_pairs("AAA", &correlations, &[], 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].asset_b, "DDD");
    }
}
