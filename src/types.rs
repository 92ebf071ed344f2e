// =============================================================================
// Shared types used across the chart feed
// =============================================================================
//
// The fixed option sets the dashboard selectors offer (currency pairs, tenors,
// timeframes, price types), the OHLC value types, and the `Selection` value
// object that parameterises both the live connection and the projection.
// =============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// =============================================================================
// Currency pairs
// =============================================================================

/// Currency pairs offered by the pair selector.
pub const CURRENCY_PAIRS: &[&str] = &[
    "EURUSD", "GBPUSD", "USDJPY", "AUDUSD", "USDCAD", "NZDUSD", "USDCHF",
];

/// Whether `pair` is one of the selectable currency pairs (case-sensitive,
/// callers normalise to upper case first).
pub fn is_known_pair(pair: &str) -> bool {
    CURRENCY_PAIRS.contains(&pair)
}

/// `EURUSD` -> `EUR/USD`. Anything that is not a six-letter code is returned
/// unchanged.
pub fn display_symbol(pair: &str) -> String {
    if pair.len() == 6 && pair.is_ascii() {
        format!("{}/{}", &pair[..3], &pair[3..])
    } else {
        pair.to_string()
    }
}

// =============================================================================
// Price type
// =============================================================================

/// Which side of the market an OHLC quadruple reflects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceType {
    Bid,
    Mid,
    Ask,
}

impl PriceType {
    pub const ALL: [PriceType; 3] = [PriceType::Bid, PriceType::Mid, PriceType::Ask];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bid => "bid",
            Self::Mid => "mid",
            Self::Ask => "ask",
        }
    }
}

impl Default for PriceType {
    fn default() -> Self {
        Self::Mid
    }
}

impl fmt::Display for PriceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bid" => Ok(Self::Bid),
            "mid" => Ok(Self::Mid),
            "ask" => Ok(Self::Ask),
            other => Err(format!("unknown price type '{other}'")),
        }
    }
}

// =============================================================================
// Tenor
// =============================================================================

/// Tenor labels, indexed by their numeric code.
pub const TENOR_LABELS: [&str; 29] = [
    "SPOT", "D1", "W1", "W2", "W3", "M1", "M2", "M3", "M4", "M5", "M6", "M7", "M8", "M9", "M10",
    "M11", "M12", "M15", "M18", "Y1", "Y2", "Y3", "Y4", "Y5", "Y6", "Y7", "Y8", "Y9", "Y10",
];

/// A forward-settlement horizon. Stored as its numeric code (0 = SPOT);
/// serialised as its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Tenor(u8);

impl Tenor {
    pub const SPOT: Tenor = Tenor(0);

    pub fn from_code(code: u8) -> Option<Self> {
        ((code as usize) < TENOR_LABELS.len()).then_some(Self(code))
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        TENOR_LABELS
            .iter()
            .position(|l| l.eq_ignore_ascii_case(label))
            .map(|idx| Self(idx as u8))
    }

    pub fn code(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        TENOR_LABELS[self.0 as usize]
    }

    pub fn all() -> impl Iterator<Item = Tenor> {
        (0..TENOR_LABELS.len() as u8).map(Tenor)
    }
}

impl fmt::Display for Tenor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tenor {
    type Err = String;

    /// Accepts either the label (`"M3"`) or the numeric code (`"7"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(tenor) = Self::from_label(s) {
            return Ok(tenor);
        }
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(Self::from_code)
            .ok_or_else(|| format!("unknown tenor '{s}'"))
    }
}

impl Serialize for Tenor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Tenor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Timeframe
// =============================================================================

/// Historical-fetch granularity. Not used for live bucketing, which the
/// server decides through each message's `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1M")]
    M1,
    #[serde(rename = "5M")]
    M5,
    #[serde(rename = "15M")]
    M15,
    #[serde(rename = "1D")]
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [Timeframe::M1, Timeframe::M5, Timeframe::M15, Timeframe::D1];

    pub fn label(self) -> &'static str {
        match self {
            Self::M1 => "1M",
            Self::M5 => "5M",
            Self::M15 => "15M",
            Self::D1 => "1D",
        }
    }

    /// Bucket width in seconds.
    pub fn seconds(self) -> i64 {
        match self {
            Self::M1 => 60,
            Self::M5 => 300,
            Self::M15 => 900,
            Self::D1 => 86_400,
        }
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::M1
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|tf| tf.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown timeframe '{s}'"))
    }
}

// =============================================================================
// OHLC values
// =============================================================================

/// Open/high/low/close quadruple for one time bucket and one price type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlc {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Ohlc {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self { open, high, low, close }
    }

    pub fn is_finite(&self) -> bool {
        self.open.is_finite() && self.high.is_finite() && self.low.is_finite() && self.close.is_finite()
    }
}

/// One point of a displayed candlestick series, in the shape the charting
/// widget consumes (`time` in seconds since epoch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcPoint {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl OhlcPoint {
    pub fn new(time: i64, ohlc: Ohlc) -> Self {
        Self {
            time,
            open: ohlc.open,
            high: ohlc.high,
            low: ohlc.low,
            close: ohlc.close,
        }
    }
}

// =============================================================================
// Selection
// =============================================================================

/// The user's current choice of instrument, tenor, timeframe and price type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub currency_pair: String,
    pub tenor: Tenor,
    pub timeframe: Timeframe,
    pub price_type: PriceType,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            currency_pair: "EURUSD".to_string(),
            tenor: Tenor::SPOT,
            timeframe: Timeframe::M1,
            price_type: PriceType::Mid,
        }
    }
}

/// What a move from one selection to another invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionChange {
    /// Currency pair or tenor changed: the live series must be replaced.
    pub restream: bool,
    /// Price type changed: the displayed series must be re-projected.
    pub reproject: bool,
    /// Timeframe changed: the historical series must be reloaded.
    pub reload_history: bool,
}

impl SelectionChange {
    pub fn is_empty(&self) -> bool {
        !(self.restream || self.reproject || self.reload_history)
    }
}

impl Selection {
    pub fn diff(&self, next: &Selection) -> SelectionChange {
        SelectionChange {
            restream: self.currency_pair != next.currency_pair || self.tenor != next.tenor,
            reproject: self.price_type != next.price_type,
            reload_history: self.timeframe != next.timeframe,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}/{}/{}",
            self.currency_pair, self.tenor, self.timeframe, self.price_type
        )
    }
}

/// A partial selection change as submitted by the dashboard. Absent fields
/// keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionUpdate {
    #[serde(default)]
    pub currency_pair: Option<String>,
    #[serde(default)]
    pub tenor: Option<Tenor>,
    #[serde(default)]
    pub timeframe: Option<Timeframe>,
    #[serde(default)]
    pub price_type: Option<PriceType>,
}

impl SelectionUpdate {
    /// Apply to `current`, rejecting currency pairs outside [`CURRENCY_PAIRS`].
    pub fn apply_to(&self, current: &Selection) -> Result<Selection, String> {
        let mut next = current.clone();
        if let Some(pair) = &self.currency_pair {
            let pair = pair.trim().to_uppercase();
            if !is_known_pair(&pair) {
                return Err(format!("unknown currency pair '{pair}'"));
            }
            next.currency_pair = pair;
        }
        if let Some(tenor) = self.tenor {
            next.tenor = tenor;
        }
        if let Some(timeframe) = self.timeframe {
            next.timeframe = timeframe;
        }
        if let Some(price_type) = self.price_type {
            next.price_type = price_type;
        }
        Ok(next)
    }
}
