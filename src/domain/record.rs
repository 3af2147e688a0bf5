//! Result records produced by the analytical engines.
//!
//! Every entity carries its natural key explicitly; recalculation runs upsert
//! on that key rather than appending duplicates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sampling timeframe of a return series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Daily => "daily",
            Timeframe::Weekly => "weekly",
            Timeframe::Monthly => "monthly",
        }
    }

    /// All timeframes, in batch-processing order
    pub fn all() -> [Timeframe; 3] {
        [Timeframe::Daily, Timeframe::Weekly, Timeframe::Monthly]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Timeframe {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Timeframe::Daily),
            "weekly" => Ok(Timeframe::Weekly),
            "monthly" => Ok(Timeframe::Monthly),
            _ => Err(format!("Unknown timeframe: {}", s)),
        }
    }
}

/// Expected response direction relative to the trigger move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// B is expected to move with the same sign as A
    Positive,
    /// B is expected to move with the opposite sign to A
    Negative,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Positive => "positive",
            Direction::Negative => "negative",
        }
    }

    /// Direction implied by a correlation coefficient
    pub fn from_correlation(corr: f64) -> Self {
        if corr > 0.0 {
            Direction::Positive
        } else {
            Direction::Negative
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Direction {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "positive" => Ok(Direction::Positive),
            "negative" => Ok(Direction::Negative),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

/// A significant lagged correlation between two assets.
///
/// Natural key: `(asset_a, asset_b, timeframe, lag)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaggedCorrelation {
    pub asset_a: String,
    pub asset_b: String,
    pub timeframe: Timeframe,
    pub lag: usize,
    pub correlation: f64,
    pub p_value: f64,
    pub direction: Direction,
}

/// A single lag's result for one pair, without the significance filter applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LagPoint {
    pub lag: usize,
    pub correlation: f64,
    pub p_value: f64,
    pub direction: Direction,
}

/// A reciprocal strong pair: A leads B and B leads A
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircularPair {
    pub asset_a: String,
    pub asset_b: String,
    pub lag_ab: usize,
    pub lag_ba: usize,
    pub corr_ab: f64,
    pub corr_ba: f64,
}

/// Historical hit-rate of a correlation-derived signal.
///
/// Natural key: `(asset_a, asset_b, timeframe, lag)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestOutcome {
    pub asset_a: String,
    pub asset_b: String,
    pub timeframe: Timeframe,
    pub lag: usize,
    pub hit_rate: f64,
    pub total_signals: usize,
    pub successful_signals: usize,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
}

/// One historical trigger event with its observed outcome, for audit display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRecord {
    pub date: NaiveDate,
    pub return_a: f64,
    pub return_b: f64,
    pub success: bool,
}

/// Per-hypothesis counts from the big-move hit-rate scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitRateStats {
    pub direction: Direction,
    pub hit_rate: f64,
    pub total_signals: usize,
    pub hits: usize,
    /// Mean signed response: hit magnitudes positive, miss magnitudes negated
    pub avg_return: f64,
}

/// A retained big-move hit-rate result for one pair/lag/hypothesis.
///
/// Only materialized when `total_signals >= min_samples` and
/// `hit_rate >= min_hit_rate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitRateOutcome {
    pub asset_a: String,
    pub asset_b: String,
    pub timeframe: Timeframe,
    pub lag: usize,
    pub direction: Direction,
    pub hit_rate: f64,
    pub total_signals: usize,
    pub hits: usize,
    pub avg_return: f64,
}

/// An asset that crossed the return (and volume) thresholds on a given date.
///
/// Natural key: `(asset, date, timeframe)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub asset: String,
    pub date: NaiveDate,
    pub timeframe: Timeframe,
    pub return_value: f64,
    pub volume_ratio: f64,
}

/// A ranked candidate response asset for a trigger. Derived, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub asset_b: String,
    pub lag: usize,
    pub correlation: f64,
    pub p_value: f64,
    pub hit_rate: f64,
    pub direction: Direction,
    pub score: f64,
}

/// Today's volume against the trailing 20-day average
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolumeStats {
    pub today_volume: f64,
    pub avg_20d_volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_round_trip() {
        for tf in Timeframe::all() {
            assert_eq!(Timeframe::try_from(tf.as_str()).unwrap(), tf);
        }
        assert!(Timeframe::try_from("hourly").is_err());
    }

    #[test]
    fn test_direction_from_correlation() {
        assert_eq!(Direction::from_correlation(0.4), Direction::Positive);
        assert_eq!(Direction::from_correlation(-0.4), Direction::Negative);
        // Zero correlation never passes the significance filter, but the
        // labelling convention is "not positive".
        assert_eq!(Direction::from_correlation(0.0), Direction::Negative);
    }
}
