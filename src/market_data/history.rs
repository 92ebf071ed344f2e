// =============================================================================
// Historical Loader — initial series for the chart, never empty
// =============================================================================
//
// GET <history_endpoint>?timeframe=1M  ->  [{ time, open, high, low, close }]
//
// Any failure (no endpoint configured, transport error, non-2xx, bad body)
// degrades to a locally generated random-walk series so the chart always has
// something to draw.
// =============================================================================

use std::time::Duration;

use anyhow::Context;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::chart::DisplaySeries;
use crate::error::FetchError;
use crate::types::{Ohlc, OhlcPoint, Timeframe};

/// Points generated by [`synthetic_series`].
pub const SYNTHETIC_POINTS: usize = 101;
/// Starting price of the synthetic random walk.
pub const SYNTHETIC_BASE_PRICE: f64 = 1.0850;

/// Where the currently displayed history came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistorySource {
    Historical,
    Synthetic,
}

/// A finished history load, ready for `ChartSink::set_data`.
#[derive(Debug, Clone)]
pub struct HistoryLoad {
    pub timeframe: Timeframe,
    pub source: HistorySource,
    pub series: DisplaySeries,
}

/// HTTP client for the historical endpoint.
#[derive(Clone)]
pub struct HistoryClient {
    endpoint: Option<String>,
    client: reqwest::Client,
}

impl HistoryClient {
    pub fn new(endpoint: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build history HTTP client")?;

        debug!(endpoint = ?endpoint, "HistoryClient initialised");
        Ok(Self { endpoint, client })
    }

    /// Fetch the historical series for `timeframe`, sorted and de-duplicated
    /// by time.
    #[instrument(skip(self), name = "history::fetch")]
    pub async fn fetch(&self, timeframe: Timeframe) -> Result<DisplaySeries, FetchError> {
        let endpoint = self.endpoint.as_deref().ok_or(FetchError::NotConfigured)?;
        let url = reqwest::Url::parse_with_params(endpoint, &[("timeframe", timeframe.label())])
            .map_err(|e| FetchError::InvalidEndpoint(format!("{endpoint}: {e}")))?;

        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let points: Vec<OhlcPoint> = resp.json().await?;
        let series = DisplaySeries::from_unordered(points);

        debug!(timeframe = %timeframe, count = series.len(), "history fetched");
        Ok(series)
    }

    /// Fetch, or fall back to a synthetic series on any failure.
    pub async fn load(&self, timeframe: Timeframe) -> HistoryLoad {
        match self.fetch(timeframe).await {
            Ok(series) if !series.is_empty() => {
                info!(
                    timeframe = %timeframe,
                    count = series.len(),
                    last_time = series.points().last().map(|p| p.time),
                    "historical series loaded"
                );
                return HistoryLoad {
                    timeframe,
                    source: HistorySource::Historical,
                    series,
                };
            }
            Ok(_) => {
                warn!(timeframe = %timeframe, "history endpoint returned no candles — using synthetic series");
            }
            Err(FetchError::NotConfigured) => {
                info!(timeframe = %timeframe, "no history endpoint — using synthetic series");
            }
            Err(e) => {
                warn!(timeframe = %timeframe, error = %e, "history load failed — using synthetic series");
            }
        }

        let now = chrono::Utc::now().timestamp();
        HistoryLoad {
            timeframe,
            source: HistorySource::Synthetic,
            series: synthetic_series(timeframe, now, &mut rand::thread_rng()),
        }
    }
}

/// A random walk of [`SYNTHETIC_POINTS`] candles ending at `now_secs`, spaced
/// one `timeframe` apart.
pub fn synthetic_series<R: Rng>(timeframe: Timeframe, now_secs: i64, rng: &mut R) -> DisplaySeries {
    let step = timeframe.seconds();
    let mut price = SYNTHETIC_BASE_PRICE;
    let mut points = Vec::with_capacity(SYNTHETIC_POINTS);

    for i in (0..SYNTHETIC_POINTS as i64).rev() {
        let open = price;
        let close = price + (rng.gen::<f64>() - 0.5) * 0.002;
        let high = open.max(close) + rng.gen::<f64>() * 0.001;
        let low = open.min(close) - rng.gen::<f64>() * 0.001;

        points.push(OhlcPoint::new(now_secs - i * step, Ohlc::new(open, high, low, close)));
        price = close;
    }

    DisplaySeries::from_sorted(points)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
