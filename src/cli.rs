use clap::{Parser, Subcommand};
use chrono::NaiveDate;

use crate::domain::{
    CandidateScore, CircularPair, Direction, HitRateOutcome, LagPoint, SignalRecord, Timeframe,
    TriggerEvent,
};
use crate::error::{LagError, Result};

#[derive(Parser)]
#[command(name = "lagcorr")]
#[command(version = "0.1.0")]
#[command(about = "Time-lagged correlation analysis for asset return series", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory path
    #[arg(short, long, default_value = "config")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply database migrations
    Migrate,
    /// Download price history and rebuild the return tables
    Ingest {
        /// Ticker codes to download
        #[arg(required = true)]
        tickers: Vec<String>,
    },
    /// Recompute correlations and backtests at every timeframe
    Recalc,
    /// Detect today's triggers and persist them
    Daily,
    /// Show triggers for a date
    Triggers {
        /// Date (YYYY-MM-DD), defaults to the latest recorded
        #[arg(short, long)]
        date: Option<NaiveDate>,
        #[arg(short, long, default_value = "daily")]
        timeframe: String,
    },
    /// Rank response candidates for a triggered asset
    Candidates {
        /// Triggered asset code
        asset: String,
        #[arg(short, long, default_value = "daily")]
        timeframe: String,
        /// Number of candidates to show
        #[arg(long, default_value = "10")]
        top: usize,
    },
    /// Full lag correlation profile for one ordered pair
    Pair {
        asset_a: String,
        asset_b: String,
        #[arg(short, long, default_value = "daily")]
        timeframe: String,
    },
    /// Reciprocal lead/lag pairs in the stored correlations
    Circular {
        #[arg(short, long, default_value = "daily")]
        timeframe: String,
    },
    /// Big-move hit-rate scan over stored returns
    Hitrate {
        #[arg(short, long, default_value = "daily")]
        timeframe: String,
        /// Number of pairs to show
        #[arg(long, default_value = "50")]
        top: usize,
    },
    /// Recent signal history for one relationship
    Signals {
        asset_a: String,
        asset_b: String,
        #[arg(short, long)]
        lag: usize,
        /// Expected response direction (positive or negative)
        #[arg(short, long, default_value = "positive")]
        direction: String,
        #[arg(short, long, default_value = "daily")]
        timeframe: String,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

pub fn parse_timeframe(s: &str) -> Result<Timeframe> {
    Timeframe::try_from(s).map_err(LagError::Validation)
}

pub fn parse_direction(s: &str) -> Result<Direction> {
    Direction::try_from(s).map_err(LagError::Validation)
}

pub fn print_triggers(triggers: &[TriggerEvent]) {
    if triggers.is_empty() {
        println!("No triggers");
        return;
    }
    println!("{:<10} {:>10} {:>8}  date", "asset", "return", "vol_x");
    for t in triggers {
        println!(
            "{:<10} {:>9.2}% {:>8.2}  {}",
            t.asset,
            t.return_value * 100.0,
            t.volume_ratio,
            t.date
        );
    }
}

pub fn print_candidates(asset: &str, candidates: &[CandidateScore]) {
    if candidates.is_empty() {
        println!("No candidates for {}", asset);
        return;
    }
    println!(
        "{:<10} {:>4} {:>7} {:>9} {:>8} {:>9}  dir",
        "asset_b", "lag", "corr", "p_value", "hit_rate", "score"
    );
    for c in candidates {
        println!(
            "{:<10} {:>4} {:>7.3} {:>9.2e} {:>7.1}% {:>9.4}  {}",
            c.asset_b,
            c.lag,
            c.correlation,
            c.p_value,
            c.hit_rate * 100.0,
            c.score,
            c.direction
        );
    }
}

pub fn print_pair_profile(asset_a: &str, asset_b: &str, points: &[LagPoint]) {
    println!("{} -> {}", asset_a, asset_b);
    println!("{:>4} {:>8} {:>10}  dir", "lag", "corr", "p_value");
    for p in points {
        println!(
            "{:>4} {:>8.3} {:>10.2e}  {}",
            p.lag, p.correlation, p.p_value, p.direction
        );
    }
}

pub fn print_circular(pairs: &[CircularPair]) {
    if pairs.is_empty() {
        println!("No reciprocal pairs");
        return;
    }
    for p in pairs {
        println!(
            "{} <-> {}: {}->{} lag {} (r={:.3}), {}->{} lag {} (r={:.3})",
            p.asset_a,
            p.asset_b,
            p.asset_a,
            p.asset_b,
            p.lag_ab,
            p.corr_ab,
            p.asset_b,
            p.asset_a,
            p.lag_ba,
            p.corr_ba
        );
    }
}

pub fn print_hit_rates(outcomes: &[HitRateOutcome]) {
    if outcomes.is_empty() {
        println!("No pairs cleared the hit-rate threshold");
        return;
    }
    println!(
        "{:<10} {:<10} {:>4} {:>9} {:>8} {:>10}  dir",
        "asset_a", "asset_b", "lag", "hit_rate", "signals", "avg_ret"
    );
    for o in outcomes {
        println!(
            "{:<10} {:<10} {:>4} {:>8.1}% {:>5}/{:<3} {:>9.4}%  {}",
            o.asset_a,
            o.asset_b,
            o.lag,
            o.hit_rate * 100.0,
            o.hits,
            o.total_signals,
            o.avg_return * 100.0,
            o.direction
        );
    }
}

pub fn print_signals(signals: &[SignalRecord]) {
    if signals.is_empty() {
        println!("No signals");
        return;
    }
    println!("{:<12} {:>9} {:>9}  result", "date", "ret_a", "ret_b");
    for s in signals {
        println!(
            "{:<12} {:>8.2}% {:>8.2}%  {}",
            s.date,
            s.return_a * 100.0,
            s.return_b * 100.0,
            if s.success { "hit" } else { "miss" }
        );
    }
}
