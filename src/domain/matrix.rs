//! Aligned return series for a universe of assets.
//!
//! The matrix is built by taking the union of all observation dates and
//! marking missing observations with NaN. Engines extract finite pairs per
//! lag themselves, so gaps in one asset never distort another.

use chrono::NaiveDate;
use std::collections::BTreeMap;

/// A single asset's return observations, ordered by date
#[derive(Debug, Clone, Default)]
pub struct ReturnSeries {
    pub asset: String,
    pub points: BTreeMap<NaiveDate, f64>,
}

impl ReturnSeries {
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            points: BTreeMap::new(),
        }
    }

    pub fn from_points(
        asset: impl Into<String>,
        points: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        Self {
            asset: asset.into(),
            points: points.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Values in date order
    pub fn values(&self) -> Vec<f64> {
        self.points.values().copied().collect()
    }
}

/// Date-aligned return columns for a set of assets.
///
/// Assets are kept in sorted order so every scan over the matrix is
/// deterministic regardless of load order.
#[derive(Debug, Clone)]
pub struct ReturnMatrix {
    assets: Vec<String>,
    dates: Vec<NaiveDate>,
    /// Column-major: `columns[asset_idx][date_idx]`, NaN where unobserved
    columns: Vec<Vec<f64>>,
}

impl ReturnMatrix {
    /// Align a set of series on the union of their dates
    pub fn from_series(series: Vec<ReturnSeries>) -> Self {
        let mut dates: Vec<NaiveDate> = series
            .iter()
            .flat_map(|s| s.points.keys().copied())
            .collect();
        dates.sort_unstable();
        dates.dedup();

        let mut series = series;
        series.sort_by(|a, b| a.asset.cmp(&b.asset));

        let columns = series
            .iter()
            .map(|s| {
                dates
                    .iter()
                    .map(|d| s.points.get(d).copied().unwrap_or(f64::NAN))
                    .collect()
            })
            .collect();

        Self {
            assets: series.into_iter().map(|s| s.asset).collect(),
            dates,
            columns,
        }
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn n_assets(&self) -> usize {
        self.assets.len()
    }

    pub fn n_dates(&self) -> usize {
        self.dates.len()
    }

    pub fn asset_index(&self, asset: &str) -> Option<usize> {
        self.assets.iter().position(|a| a == asset)
    }

    /// Return column for an asset, NaN-padded to the shared date axis
    pub fn column(&self, idx: usize) -> &[f64] {
        &self.columns[idx]
    }

    pub fn column_for(&self, asset: &str) -> Option<&[f64]> {
        self.asset_index(asset).map(|i| self.column(i))
    }

    /// Most recent return per asset, skipping assets with no observation
    /// on the latest date
    pub fn latest_returns(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        if let Some(last) = self.dates.len().checked_sub(1) {
            for (asset, col) in self.assets.iter().zip(&self.columns) {
                let v = col[last];
                if v.is_finite() {
                    out.insert(asset.clone(), v);
                }
            }
        }
        out
    }
}
