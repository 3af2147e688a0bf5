//! Stooq daily price client
//!
//! Downloads adjusted close and volume history as CSV, with exponential
//! backoff on failures and a pacing delay between consecutive symbols.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::FetcherConfig;
use crate::error::{LagError, Result};

const STOOQ_BASE_URL: &str = "https://stooq.com/q/d/l/";

/// Symbol for the market index used to strip the market factor
pub const MARKET_SYMBOL: &str = "^tpx";

/// One daily price bar
#[derive(Debug, Clone, Copy)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: Option<f64>,
}

/// Daily price client over Stooq's CSV export
pub struct PriceFetcher {
    client: reqwest::Client,
    request_delay: Duration,
    retry_delays: Vec<Duration>,
}

impl PriceFetcher {
    pub fn new(config: &FetcherConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            request_delay: Duration::from_millis(config.request_delay_ms),
            retry_delays: config
                .retry_delays_ms
                .iter()
                .map(|&ms| Duration::from_millis(ms))
                .collect(),
        }
    }

    /// Stooq symbol for a local ticker code. Index symbols (leading `^`)
    /// pass through unchanged.
    pub fn to_stooq_symbol(ticker: &str) -> String {
        if ticker.starts_with('^') {
            ticker.to_lowercase()
        } else {
            format!("{}.jp", ticker.to_lowercase())
        }
    }

    /// Download daily bars for one ticker, oldest first
    pub async fn fetch_daily(&self, ticker: &str) -> Result<Vec<DailyBar>> {
        let symbol = Self::to_stooq_symbol(ticker);
        let url = format!("{}?s={}&i=d", STOOQ_BASE_URL, symbol);

        let mut last_err: Option<LagError> = None;
        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.fetch_once(&url).await {
                Ok(bars) if bars.is_empty() => {
                    return Err(LagError::PriceDataUnavailable(format!(
                        "No rows returned for {}",
                        ticker
                    )));
                }
                Ok(bars) => {
                    debug!(ticker, rows = bars.len(), "Price download complete");
                    tokio::time::sleep(self.request_delay).await;
                    return Ok(bars);
                }
                Err(e) => {
                    warn!(ticker, attempt = attempt + 1, "Price download failed: {}", e);
                    last_err = Some(e);
                    if attempt < self.retry_delays.len() - 1 {
                        tokio::time::sleep(*delay).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            LagError::PriceDataUnavailable(format!("All retries exhausted for {}", ticker))
        }))
    }

    /// Download every ticker in sequence, skipping the ones that fail
    pub async fn fetch_universe(&self, tickers: &[String]) -> BTreeMap<String, Vec<DailyBar>> {
        let mut out = BTreeMap::new();
        let mut failed = 0usize;
        for ticker in tickers {
            match self.fetch_daily(ticker).await {
                Ok(bars) => {
                    out.insert(ticker.clone(), bars);
                }
                Err(e) => {
                    warn!(ticker = %ticker, "Skipping ticker: {}", e);
                    failed += 1;
                }
            }
        }
        info!(
            succeeded = out.len(),
            failed, "Universe price download complete"
        );
        out
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<DailyBar>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(LagError::PriceDataUnavailable(format!(
                "HTTP {} from price source",
                response.status()
            )));
        }
        let body = response.text().await?;
        parse_stooq_csv(&body)
    }
}

/// Parse Stooq's `Date,Open,High,Low,Close,Volume` CSV body. Rows that do
/// not parse are dropped.
fn parse_stooq_csv(body: &str) -> Result<Vec<DailyBar>> {
    let mut bars = Vec::new();
    for (i, line) in body.lines().enumerate() {
        if i == 0 {
            // Header row; anything else means an error page came back
            if !line.starts_with("Date") {
                return Err(LagError::PriceDataUnavailable(
                    "Unexpected response body from price source".into(),
                ));
            }
            continue;
        }
        let mut fields = line.split(',');
        let (Some(date), Some(_o), Some(_h), Some(_l), Some(close)) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            continue;
        };
        let Ok(date) = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") else {
            continue;
        };
        let Ok(close) = close.trim().parse::<f64>() else {
            continue;
        };
        let volume = fields.next().and_then(|v| v.trim().parse::<f64>().ok());
        bars.push(DailyBar {
            date,
            close,
            volume,
        });
    }
    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_mapping() {
        assert_eq!(PriceFetcher::to_stooq_symbol("7203"), "7203.jp");
        assert_eq!(PriceFetcher::to_stooq_symbol("^TPX"), "^tpx");
    }

    #[test]
    fn test_parse_csv_sorted_ascending() {
        let body = "Date,Open,High,Low,Close,Volume\n\
                    2024-01-04,101,103,100,102.5,12000\n\
                    2024-01-03,100,102,99,101.0,10000\n";
        let bars = parse_stooq_csv(body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(bars[0].close, 101.0);
        assert_eq!(bars[1].volume, Some(12000.0));
    }

    #[test]
    fn test_parse_csv_drops_bad_rows() {
        let body = "Date,Open,High,Low,Close,Volume\n\
                    2024-01-03,100,102,99,101.0,10000\n\
                    not,a,valid,row,at,all\n";
        let bars = parse_stooq_csv(body).unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn test_parse_csv_missing_volume() {
        let body = "Date,Open,High,Low,Close,Volume\n\
                    2024-01-03,100,102,99,101.0,\n";
        let bars = parse_stooq_csv(body).unwrap();
        assert_eq!(bars[0].volume, None);
    }

    #[test]
    fn test_error_page_rejected() {
        assert!(parse_stooq_csv("<html>No data</html>").is_err());
    }
}
