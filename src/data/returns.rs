//! Return preparation: log returns, market-factor subtraction and
//! resampling from daily bars to weekly and monthly periods.

use chrono::{Datelike, Days, NaiveDate};
use std::collections::BTreeMap;

use crate::domain::{ReturnSeries, Timeframe};

/// Log returns `ln(p_t / p_{t-1})` over a price series. The first
/// observation has no predecessor and produces no return. Non-positive
/// prices are skipped and break the chain at that point.
pub fn log_returns(prices: &BTreeMap<NaiveDate, f64>) -> BTreeMap<NaiveDate, f64> {
    let mut out = BTreeMap::new();
    let mut prev: Option<f64> = None;
    for (&date, &price) in prices {
        if price <= 0.0 || !price.is_finite() {
            prev = None;
            continue;
        }
        if let Some(p) = prev {
            out.insert(date, (price / p).ln());
        }
        prev = Some(price);
    }
    out
}

/// Excess returns over a market factor. Only dates present in both the
/// asset series and the market series survive.
pub fn subtract_market(
    returns: &BTreeMap<NaiveDate, f64>,
    market: &BTreeMap<NaiveDate, f64>,
) -> BTreeMap<NaiveDate, f64> {
    returns
        .iter()
        .filter_map(|(date, r)| market.get(date).map(|m| (*date, r - m)))
        .collect()
}

/// End of the week containing `date`, anchored to Friday
fn week_anchor(date: NaiveDate) -> NaiveDate {
    let wd = date.weekday().num_days_from_monday();
    let days_to_friday = (4 + 7 - wd) % 7;
    date + Days::new(days_to_friday as u64)
}

/// Last calendar day of the month containing `date`
fn month_anchor(date: NaiveDate) -> NaiveDate {
    let (y, m) = (date.year(), date.month());
    let first_next = if m == 12 {
        NaiveDate::from_ymd_opt(y + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(y, m + 1, 1)
    };
    // Every month has a first day, so the subtraction is total
    first_next
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .unwrap_or(date)
}

fn resample_by<F>(daily: &BTreeMap<NaiveDate, f64>, anchor: F) -> BTreeMap<NaiveDate, f64>
where
    F: Fn(NaiveDate) -> NaiveDate,
{
    let mut out: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (&date, &ret) in daily {
        if ret.is_finite() {
            *out.entry(anchor(date)).or_insert(0.0) += ret;
        }
    }
    out
}

/// Weekly returns: daily log returns summed per week, keyed on the
/// week's Friday
pub fn resample_weekly(daily: &BTreeMap<NaiveDate, f64>) -> BTreeMap<NaiveDate, f64> {
    resample_by(daily, week_anchor)
}

/// Monthly returns: daily log returns summed per month, keyed on the
/// last calendar day of the month
pub fn resample_monthly(daily: &BTreeMap<NaiveDate, f64>) -> BTreeMap<NaiveDate, f64> {
    resample_by(daily, month_anchor)
}

/// Market-adjusted return series for one asset at every timeframe.
///
/// Daily log returns have the market factor subtracted first; weekly and
/// monthly series are aggregated from the adjusted daily series, so the
/// market adjustment carries through.
pub fn prepare_series(
    asset: &str,
    prices: &BTreeMap<NaiveDate, f64>,
    market_returns: &BTreeMap<NaiveDate, f64>,
    timeframe: Timeframe,
) -> ReturnSeries {
    let daily = subtract_market(&log_returns(prices), market_returns);
    let points = match timeframe {
        Timeframe::Daily => daily,
        Timeframe::Weekly => resample_weekly(&daily),
        Timeframe::Monthly => resample_monthly(&daily),
    };
    ReturnSeries {
        asset: asset.to_string(),
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_log_returns_drop_first_observation() {
        let prices = BTreeMap::from([
            (d("2024-01-01"), 100.0),
            (d("2024-01-02"), 110.0),
            (d("2024-01-03"), 99.0),
        ]);
        let rets = log_returns(&prices);
        assert_eq!(rets.len(), 2);
        assert!((rets[&d("2024-01-02")] - (1.1_f64).ln()).abs() < 1e-12);
        assert!((rets[&d("2024-01-03")] - (0.9_f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_log_returns_break_chain_on_bad_price() {
        let prices = BTreeMap::from([
            (d("2024-01-01"), 100.0),
            (d("2024-01-02"), 0.0),
            (d("2024-01-03"), 105.0),
        ]);
        let rets = log_returns(&prices);
        // Neither the zero price nor the day after it produces a return
        assert!(rets.is_empty());
    }

    #[test]
    fn test_subtract_market_intersects_dates() {
        let rets = BTreeMap::from([(d("2024-01-02"), 0.03), (d("2024-01-03"), 0.01)]);
        let market = BTreeMap::from([(d("2024-01-02"), 0.01)]);
        let adjusted = subtract_market(&rets, &market);
        assert_eq!(adjusted.len(), 1);
        assert!((adjusted[&d("2024-01-02")] - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_weekly_anchor_is_friday() {
        // 2024-01-01 is a Monday; its week ends Friday 2024-01-05
        assert_eq!(week_anchor(d("2024-01-01")), d("2024-01-05"));
        assert_eq!(week_anchor(d("2024-01-05")), d("2024-01-05"));
        // Saturday rolls into the next week's Friday
        assert_eq!(week_anchor(d("2024-01-06")), d("2024-01-12"));
    }

    #[test]
    fn test_weekly_resample_sums_within_week() {
        let daily = BTreeMap::from([
            (d("2024-01-02"), 0.01),
            (d("2024-01-04"), 0.02),
            (d("2024-01-08"), 0.05),
        ]);
        let weekly = resample_weekly(&daily);
        assert_eq!(weekly.len(), 2);
        assert!((weekly[&d("2024-01-05")] - 0.03).abs() < 1e-12);
        assert!((weekly[&d("2024-01-12")] - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_monthly_resample_anchors_to_month_end() {
        let daily = BTreeMap::from([
            (d("2024-02-05"), 0.01),
            (d("2024-02-20"), -0.03),
            (d("2024-12-10"), 0.02),
        ]);
        let monthly = resample_monthly(&daily);
        assert!((monthly[&d("2024-02-29")] + 0.02).abs() < 1e-12);
        assert!((monthly[&d("2024-12-31")] - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_prepare_series_daily_pipeline() {
        let prices = BTreeMap::from([
            (d("2024-01-01"), 100.0),
            (d("2024-01-02"), 102.0),
        ]);
        let market = BTreeMap::from([(d("2024-01-02"), 0.005)]);
        let series = prepare_series("AAA", &prices, &market, Timeframe::Daily);
        assert_eq!(series.asset, "AAA");
        assert_eq!(series.len(), 1);
        let expected = (1.02_f64).ln() - 0.005;
        assert!((series.points[&d("2024-01-02")] - expected).abs() < 1e-12);
    }
}
