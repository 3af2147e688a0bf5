use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::domain::Timeframe;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Thresholds and limits for the analytical engines
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Absolute return that counts as a trigger move (e.g. 0.02 = 2%)
    #[serde(default = "default_return_threshold")]
    pub return_threshold: f64,
    /// Today's volume must exceed the 20-day average by this factor
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: f64,
    /// Minimum |correlation| a pair/lag must reach to be reported
    #[serde(default = "default_min_correlation")]
    pub min_correlation: f64,
    /// Family-wise significance level before correction
    #[serde(default = "default_significance_level")]
    pub significance_level: f64,
    /// Whether to apply Bonferroni correction across all pair/lag tests
    #[serde(default = "default_true")]
    pub use_correction: bool,
    /// Maximum lag per timeframe, in periods
    #[serde(default = "default_max_lag_daily")]
    pub max_lag_daily: usize,
    #[serde(default = "default_max_lag_weekly")]
    pub max_lag_weekly: usize,
    #[serde(default = "default_max_lag_monthly")]
    pub max_lag_monthly: usize,
    /// Absolute return that counts as a "big move" for the hit-rate engine
    #[serde(default = "default_move_threshold")]
    pub move_threshold: f64,
    /// Minimum hit-rate an outcome must reach to be retained
    #[serde(default = "default_min_hit_rate")]
    pub min_hit_rate: f64,
    /// Minimum number of qualifying signals before an outcome is reported
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

fn default_return_threshold() -> f64 {
    0.02
}
fn default_volume_threshold() -> f64 {
    1.5
}
fn default_min_correlation() -> f64 {
    0.30
}
fn default_significance_level() -> f64 {
    0.05
}
fn default_true() -> bool {
    true
}
fn default_max_lag_daily() -> usize {
    10
}
fn default_max_lag_weekly() -> usize {
    6
}
fn default_max_lag_monthly() -> usize {
    3
}
fn default_move_threshold() -> f64 {
    0.02
}
fn default_min_hit_rate() -> f64 {
    0.55
}
fn default_min_samples() -> usize {
    30
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            return_threshold: default_return_threshold(),
            volume_threshold: default_volume_threshold(),
            min_correlation: default_min_correlation(),
            significance_level: default_significance_level(),
            use_correction: true,
            max_lag_daily: default_max_lag_daily(),
            max_lag_weekly: default_max_lag_weekly(),
            max_lag_monthly: default_max_lag_monthly(),
            move_threshold: default_move_threshold(),
            min_hit_rate: default_min_hit_rate(),
            min_samples: default_min_samples(),
        }
    }
}

impl AnalysisConfig {
    /// Maximum lag for a given timeframe
    pub fn max_lag(&self, timeframe: Timeframe) -> usize {
        match timeframe {
            Timeframe::Daily => self.max_lag_daily,
            Timeframe::Weekly => self.max_lag_weekly,
            Timeframe::Monthly => self.max_lag_monthly,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Candidate cache capacity
    #[serde(default = "default_candidate_maxsize")]
    pub candidate_maxsize: usize,
    /// Candidate cache TTL in seconds
    #[serde(default = "default_candidate_ttl")]
    pub candidate_ttl_secs: u64,
    /// Trigger cache capacity
    #[serde(default = "default_trigger_maxsize")]
    pub trigger_maxsize: usize,
    /// Trigger cache TTL in seconds
    #[serde(default = "default_trigger_ttl")]
    pub trigger_ttl_secs: u64,
}

fn default_candidate_maxsize() -> usize {
    1000
}
fn default_candidate_ttl() -> u64 {
    3600
}
fn default_trigger_maxsize() -> usize {
    100
}
fn default_trigger_ttl() -> u64 {
    86400
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            candidate_maxsize: default_candidate_maxsize(),
            candidate_ttl_secs: default_candidate_ttl(),
            trigger_maxsize: default_trigger_maxsize(),
            trigger_ttl_secs: default_trigger_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Delay between consecutive requests, in milliseconds
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Exponential backoff delays for retries, in milliseconds
    #[serde(default = "default_retry_delays_ms")]
    pub retry_delays_ms: Vec<u64>,
}

fn default_request_delay_ms() -> u64 {
    500
}
fn default_retry_delays_ms() -> Vec<u64> {
    vec![500, 1000, 2000, 4000, 8000]
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: default_request_delay_ms(),
            retry_delays_ms: default_retry_delays_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("database.url", "postgres://localhost/lagcorr")?
            .set_default("database.max_connections", 5)?
            .set_default("logging.level", "info")?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g. config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("LAGCORR_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (LAGCORR_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("LAGCORR")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let a = &self.analysis;

        if a.return_threshold < 0.0 {
            errors.push("return_threshold must be non-negative".to_string());
        }
        if a.volume_threshold < 0.0 {
            errors.push("volume_threshold must be non-negative".to_string());
        }
        if !(0.0..=1.0).contains(&a.min_correlation) {
            errors.push("min_correlation must be between 0 and 1".to_string());
        }
        if a.significance_level <= 0.0 || a.significance_level >= 1.0 {
            errors.push("significance_level must be strictly between 0 and 1".to_string());
        }
        if a.max_lag_daily == 0 || a.max_lag_weekly == 0 || a.max_lag_monthly == 0 {
            errors.push("max_lag must be at least 1 for every timeframe".to_string());
        }
        if a.move_threshold < 0.0 {
            errors.push("move_threshold must be non-negative".to_string());
        }
        if !(0.0..=1.0).contains(&a.min_hit_rate) {
            errors.push("min_hit_rate must be between 0 and 1".to_string());
        }
        if a.min_samples == 0 {
            errors.push("min_samples must be at least 1".to_string());
        }
        if self.cache.candidate_maxsize == 0 || self.cache.trigger_maxsize == 0 {
            errors.push("cache capacities must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(analysis: AnalysisConfig) -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                url: "postgres://localhost/lagcorr_test".to_string(),
                max_connections: 2,
            },
            analysis,
            cache: CacheConfig::default(),
            fetcher: FetcherConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = config_with(AnalysisConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.max_lag(Timeframe::Daily), 10);
        assert_eq!(config.analysis.max_lag(Timeframe::Weekly), 6);
        assert_eq!(config.analysis.max_lag(Timeframe::Monthly), 3);
    }

    #[test]
    fn test_default_log_level_is_usable() {
        // A hand-built config must not yield an empty filter string
        assert_eq!(LoggingConfig::default().level, "info");
        assert_eq!(config_with(AnalysisConfig::default()).logging.level, "info");
    }

    #[test]
    fn test_out_of_range_parameters_rejected() {
        let mut analysis = AnalysisConfig::default();
        analysis.significance_level = 1.5;
        analysis.max_lag_daily = 0;
        let errors = config_with(analysis).validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
