pub mod job;
pub mod matrix;
pub mod record;

pub use job::{BatchJob, JobKind, JobStatus, JobTracker};
pub use matrix::{ReturnMatrix, ReturnSeries};
pub use record::{
    BacktestOutcome, CandidateScore, CircularPair, Direction, HitRateOutcome, HitRateStats,
    LagPoint, LaggedCorrelation, SignalRecord, Timeframe, TriggerEvent, VolumeStats,
};
