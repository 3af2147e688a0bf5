pub mod backtest;
pub mod correlation;
pub mod hitrate;
pub mod stats;
pub mod trigger;

pub use backtest::BacktestEngine;
pub use correlation::CorrelationEngine;
pub use hitrate::{HitRateEngine, PairHitRates};
pub use trigger::TriggerDetector;
