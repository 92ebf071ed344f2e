//! Projection of stored candle records onto one price type.
//!
//! Two paths feed the sink: `project_incremental` pushes the single record
//! that just arrived, `full_reload` rebuilds the entire series from the store
//! after a price-type switch.

use crate::chart::view::{ChartSink, DisplaySeries};
use crate::market_data::candle_store::{CandleRecord, CandleStore};
use crate::types::{OhlcPoint, PriceType};

pub fn project_point(record: &CandleRecord, price_type: PriceType) -> OhlcPoint {
    OhlcPoint::new(record.time_key, record.ohlc(price_type))
}

/// The series the sink should show for `price_type`, oldest first.
pub fn project_series(store: &CandleStore, price_type: PriceType) -> DisplaySeries {
    let points = store
        .snapshot_sorted_by_time()
        .into_iter()
        .map(|record| project_point(record, price_type))
        .collect();
    DisplaySeries::from_sorted(points)
}

/// Push the just-upserted `record` to the sink as one point.
pub fn project_incremental<S: ChartSink>(sink: &mut S, record: &CandleRecord, price_type: PriceType) {
    sink.update(project_point(record, price_type));
}

/// Replace the sink's series with the whole store projected onto
/// `price_type`. Returns `false` without touching the sink when the store is
/// empty.
pub fn full_reload<S: ChartSink>(sink: &mut S, store: &CandleStore, price_type: PriceType) -> bool {
    if store.is_empty() {
        return false;
    }
    sink.set_data(project_series(store, price_type));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::candle_store::tests::sample_record;
    use crate::market_data::quote_decoder::decode_quote;
    use crate::market_data::quote_decoder::tests::quote_json;

    /// Sink that records calls instead of rendering.
    #[derive(Default)]
    struct RecordingSink {
        set_data_calls: Vec<DisplaySeries>,
        updates: Vec<OhlcPoint>,
    }

    impl ChartSink for RecordingSink {
        fn set_data(&mut self, series: DisplaySeries) {
            self.set_data_calls.push(series);
        }

        fn update(&mut self, point: OhlcPoint) {
            self.updates.push(point);
        }
    }

    #[test]
    fn full_reload_uses_bid_quadruples_in_time_order() {
        let mut store = CandleStore::new(100);
        // Arrive out of order on purpose.
        for start in [1_700_000_060_000, 1_700_000_000_000] {
            let json = quote_json("EURUSD", start, 1.0850, None);
            store.upsert(decode_quote(&json).unwrap().record);
        }

        let mut sink = RecordingSink::default();
        assert!(full_reload(&mut sink, &store, PriceType::Bid));
        assert_eq!(sink.set_data_calls.len(), 1);

        let series = &sink.set_data_calls[0];
        assert_eq!(series.times(), vec![1_700_000_000, 1_700_000_060]);
        for (point, record) in series.points().iter().zip(store.snapshot_sorted_by_time()) {
            assert_eq!(point.open, record.bid.open);
            assert_eq!(point.high, record.bid.high);
            assert_eq!(point.low, record.bid.low);
            assert_eq!(point.close, record.bid.close);
        }
    }

    #[test]
    fn full_reload_on_empty_store_does_not_touch_sink() {
        let store = CandleStore::new(100);
        let mut sink = RecordingSink::default();
        assert!(!full_reload(&mut sink, &store, PriceType::Ask));
        assert!(sink.set_data_calls.is_empty());
        assert!(sink.updates.is_empty());
    }

    #[test]
    fn switching_price_type_keeps_times_changes_values() {
        let mut store = CandleStore::new(100);
        for t in [240, 0, 120, 60, 180] {
            store.upsert(sample_record(t, 1.2));
        }

        let bid = project_series(&store, PriceType::Bid);
        let ask = project_series(&store, PriceType::Ask);
        assert_eq!(bid.times(), ask.times());
        assert_eq!(bid.times(), vec![0, 60, 120, 180, 240]);
        assert!(bid.points().iter().zip(ask.points()).all(|(b, a)| b.close < a.close));
    }

    #[test]
    fn incremental_emits_one_point_for_selected_side() {
        let record = sample_record(60, 1.5);
        let mut sink = RecordingSink::default();
        project_incremental(&mut sink, &record, PriceType::Mid);
        assert_eq!(sink.updates, vec![OhlcPoint::new(60, record.mid)]);
        assert!(sink.set_data_calls.is_empty());
    }
}
