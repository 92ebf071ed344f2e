use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Ohlc, PriceType};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// One time bucket of quote data carrying all three sides of the market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleRecord {
    /// Bucket start, seconds since epoch.
    pub time_key: i64,
    pub bid: Ohlc,
    pub mid: Ohlc,
    pub ask: Ohlc,
}

impl CandleRecord {
    pub fn ohlc(&self, price_type: PriceType) -> Ohlc {
        match price_type {
            PriceType::Bid => self.bid,
            PriceType::Mid => self.mid,
            PriceType::Ask => self.ask,
        }
    }
}

/// Result of [`CandleStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// First record for this time key.
    Inserted,
    /// A still-forming bucket was revised.
    Replaced,
    /// Older than every record in a full window; not stored.
    Evicted,
}

// ---------------------------------------------------------------------------
// CandleStore -- rolling window keyed by time
// ---------------------------------------------------------------------------

/// Everything received on the current streaming session, one record per
/// `time_key`. Holds at most `max_candles` records; the oldest keys are
/// evicted first.
#[derive(Debug, Clone)]
pub struct CandleStore {
    records: BTreeMap<i64, CandleRecord>,
    max_candles: usize,
}

impl CandleStore {
    /// Create a store retaining at most `max_candles` records (minimum 1).
    pub fn new(max_candles: usize) -> Self {
        Self {
            records: BTreeMap::new(),
            max_candles: max_candles.max(1),
        }
    }

    /// Insert the record at its `time_key`, replacing any earlier revision
    /// of the same bucket. A new key older than everything in a full window
    /// would be evicted at once, so it is refused instead.
    pub fn upsert(&mut self, record: CandleRecord) -> Upsert {
        if self.records.len() >= self.max_candles && !self.records.contains_key(&record.time_key) {
            if let Some((&oldest, _)) = self.records.first_key_value() {
                if record.time_key < oldest {
                    return Upsert::Evicted;
                }
            }
        }

        let outcome = match self.records.insert(record.time_key, record) {
            Some(_) => Upsert::Replaced,
            None => Upsert::Inserted,
        };

        while self.records.len() > self.max_candles {
            self.records.pop_first();
        }

        outcome
    }

    /// Drop every record. Safe to call repeatedly.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// All records, oldest first.
    pub fn snapshot_sorted_by_time(&self) -> Vec<&CandleRecord> {
        self.records.values().collect()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, time_key: i64) -> Option<&CandleRecord> {
        self.records.get(&time_key)
    }

    /// The most recent bucket, if any.
    #[cfg(test)]
    pub(crate) fn latest(&self) -> Option<&CandleRecord> {
        self.records.last_key_value().map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn max_candles(&self) -> usize {
        self.max_candles
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
