// =============================================================================
// Chart View — the rendering sink and the header derived from it
// =============================================================================
//
// `ChartSink` is the contract the projection engine writes to: a full
// `set_data` replacement or a single-point `update` keyed by time.
// `ChartView` is the in-process implementation served by the dashboard API;
// it behaves like a candlestick widget (same-time updates merge, newer ones
// append, older ones are refused).
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::warn;

use crate::types::{display_symbol, OhlcPoint};

// =============================================================================
// DisplaySeries
// =============================================================================

/// A candlestick series in strictly ascending time order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DisplaySeries(Vec<OhlcPoint>);

impl DisplaySeries {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Sort by time and keep the last point for any duplicated time.
    pub fn from_unordered(mut points: Vec<OhlcPoint>) -> Self {
        // Stable sort keeps arrival order within equal times, so the
        // later duplicate is the one retained below.
        points.sort_by_key(|p| p.time);
        let mut out: Vec<OhlcPoint> = Vec::with_capacity(points.len());
        for point in points {
            match out.last_mut() {
                Some(last) if last.time == point.time => *last = point,
                _ => out.push(point),
            }
        }
        Self(out)
    }

    /// Wrap points the caller already produced in ascending order.
    pub(crate) fn from_sorted(points: Vec<OhlcPoint>) -> Self {
        debug_assert!(points.windows(2).all(|w| w[0].time < w[1].time));
        Self(points)
    }

    pub fn points(&self) -> &[OhlcPoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn times(&self) -> Vec<i64> {
        self.0.iter().map(|p| p.time).collect()
    }
}

// =============================================================================
// Sink contract
// =============================================================================

/// Destination for projected candles.
pub trait ChartSink {
    /// Replace the whole displayed series.
    fn set_data(&mut self, series: DisplaySeries);

    /// Append a point, or merge it into the point with the same time.
    fn update(&mut self, point: OhlcPoint);

    /// Show nothing.
    fn reset(&mut self) {
        self.set_data(DisplaySeries::empty());
    }
}

/// Outcome of [`ChartView::apply_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointUpdate {
    Appended,
    Merged,
    /// Older than the newest displayed point and not already present.
    Rejected,
}

// =============================================================================
// ChartView
// =============================================================================

/// The series currently on screen.
#[derive(Debug, Default)]
pub struct ChartView {
    series: Vec<OhlcPoint>,
}

impl ChartView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn series(&self) -> DisplaySeries {
        DisplaySeries(self.series.clone())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.series.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn replace(&mut self, series: DisplaySeries) {
        self.series = series.0;
    }

    pub fn apply_update(&mut self, point: OhlcPoint) -> PointUpdate {
        match self.series.last_mut() {
            None => {
                self.series.push(point);
                PointUpdate::Appended
            }
            Some(last) if point.time > last.time => {
                self.series.push(point);
                PointUpdate::Appended
            }
            Some(last) if point.time == last.time => {
                *last = point;
                PointUpdate::Merged
            }
            Some(_) => match self.series.binary_search_by_key(&point.time, |p| p.time) {
                Ok(idx) => {
                    self.series[idx] = point;
                    PointUpdate::Merged
                }
                Err(_) => PointUpdate::Rejected,
            },
        }
    }

    /// Header summary for `currency_pair` over the displayed series.
    pub fn header(&self, currency_pair: &str) -> ChartHeader {
        ChartHeader::from_series(currency_pair, &self.series)
    }
}

impl ChartSink for ChartView {
    fn set_data(&mut self, series: DisplaySeries) {
        self.replace(series);
    }

    fn update(&mut self, point: OhlcPoint) {
        if self.apply_update(point) == PointUpdate::Rejected {
            warn!(time = point.time, "dropping out-of-order chart update");
        }
    }
}

// =============================================================================
// ChartHandle -- shared view + change counter
// =============================================================================

/// A `ChartView` shared between the session controller (the only writer) and
/// the dashboard API (readers). Every write bumps `version` so push loops can
/// detect changes.
#[derive(Clone)]
pub struct ChartHandle {
    view: Arc<RwLock<ChartView>>,
    version: Arc<AtomicU64>,
}

impl ChartHandle {
    pub fn new(version: Arc<AtomicU64>) -> Self {
        Self {
            view: Arc::new(RwLock::new(ChartView::new())),
            version,
        }
    }

    pub fn series(&self) -> DisplaySeries {
        self.view.read().series()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.view.read().len()
    }

    pub fn header(&self, currency_pair: &str) -> ChartHeader {
        self.view.read().header(currency_pair)
    }

    fn bump(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}

impl ChartSink for ChartHandle {
    fn set_data(&mut self, series: DisplaySeries) {
        self.view.write().set_data(series);
        self.bump();
    }

    fn update(&mut self, point: OhlcPoint) {
        self.view.write().update(point);
        self.bump();
    }
}

// =============================================================================
// Header summary
// =============================================================================

/// The symbol / price / change line shown above the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartHeader {
    /// `EUR/USD`
    pub symbol: String,
    /// Last close, formatted; `None` while the chart is empty.
    pub price: Option<String>,
    /// `+0.0023 (+0.21%)`; `None` while the chart is empty.
    pub change: Option<String>,
    pub is_positive: bool,
}

/// Decimal places used for prices of `currency_pair`.
pub fn price_precision(currency_pair: &str) -> usize {
    if currency_pair.ends_with("JPY") {
        2
    } else {
        4
    }
}

impl ChartHeader {
    pub fn from_series(currency_pair: &str, series: &[OhlcPoint]) -> Self {
        let symbol = display_symbol(currency_pair);
        let (first, last) = match (series.first(), series.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Self {
                    symbol,
                    price: None,
                    change: None,
                    is_positive: true,
                }
            }
        };

        let decimals = price_precision(currency_pair);
        let delta = last.close - first.open;
        let pct = if first.open != 0.0 {
            delta / first.open * 100.0
        } else {
            0.0
        };
        let is_positive = delta >= 0.0;
        let sign = if is_positive { "+" } else { "-" };

        Self {
            symbol,
            price: Some(format!("{:.*}", decimals, last.close)),
            change: Some(format!(
                "{sign}{:.*} ({sign}{:.2}%)",
                decimals,
                delta.abs(),
                pct.abs()
            )),
            is_positive,
        }
    }
}
