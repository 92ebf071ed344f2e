// =============================================================================
// Quote Message Decoder — one inbound stream frame -> one CandleRecord
// =============================================================================
//
// Expected shape:
// ```json
// { "id": "q-1", "pair": { "base": 1, "quote": 2 }, "currency_pair": "EURUSD",
//   "interval": 60, "start": 1700000000000, "tenor": 0,
//   "ask": { "open": .., "high": .., "low": .., "close": .. },
//   "bid": { .. }, "mid": { .. } }
// ```
//
// Decoding is all-or-nothing: either every required field parses and every
// price is finite, or the caller gets a `DecodeError` and nothing else.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::market_data::candle_store::CandleRecord;
use crate::types::Ohlc;

/// Numeric base/quote currency identifiers carried by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairIds {
    pub base: i64,
    pub quote: i64,
}

/// Fields of a quote message that are not part of the candle itself.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteMeta {
    pub id: String,
    pub currency_pair: String,
    pub start_ms: i64,
    pub pair: Option<PairIds>,
    pub interval: Option<i64>,
    pub tenor: Option<i64>,
}

/// A successfully decoded message.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedQuote {
    pub meta: QuoteMeta,
    pub record: CandleRecord,
}

#[derive(Deserialize)]
struct WireQuote {
    id: String,
    currency_pair: String,
    start: i64,
    #[serde(default)]
    pair: Option<PairIds>,
    #[serde(default)]
    interval: Option<i64>,
    #[serde(default)]
    tenor: Option<i64>,
    bid: Ohlc,
    mid: Ohlc,
    ask: Ohlc,
}

/// Millisecond timestamp -> whole seconds, rounding toward negative infinity.
pub fn time_key_from_millis(start_ms: i64) -> i64 {
    start_ms.div_euclid(1000)
}

/// Decode one text frame from the quote stream.
pub fn decode_quote(text: &str) -> Result<DecodedQuote, DecodeError> {
    let wire: WireQuote = serde_json::from_str(text)?;

    for (price_type, ohlc) in [("bid", &wire.bid), ("mid", &wire.mid), ("ask", &wire.ask)] {
        if !ohlc.is_finite() {
            return Err(DecodeError::NonFinite { price_type });
        }
    }

    let record = CandleRecord {
        time_key: time_key_from_millis(wire.start),
        bid: wire.bid,
        mid: wire.mid,
        ask: wire.ask,
    };
    let meta = QuoteMeta {
        id: wire.id,
        currency_pair: wire.currency_pair,
        start_ms: wire.start,
        pair: wire.pair,
        interval: wire.interval,
        tenor: wire.tenor,
    };

    Ok(DecodedQuote { meta, record })
}

/// Decode a binary frame by treating it as UTF-8 JSON text.
pub fn decode_quote_bytes(bytes: &[u8]) -> Result<DecodedQuote, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::NotText { len: bytes.len() })?;
    decode_quote(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
