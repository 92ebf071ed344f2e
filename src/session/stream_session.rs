// =============================================================================
// Stream Session — connection lifecycle, candle store, projection
// =============================================================================
//
// One `StreamSession` backs one mounted chart. It owns the candle store, the
// rendering sink and the transport, and is driven by exactly one caller (the
// controller task), so nothing in here locks.
//
//   Idle/Open/Closed --(pair or tenor change, start)--> Connecting
//   Connecting --(opened)--> Open
//   Open/Connecting --(error, peer close, teardown, supersession)--> Closed
//
// A closed connection is never reopened; only the next pair/tenor change
// creates a new one. Events from any connection other than the current one
// are discarded.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::chart::projection::{full_reload, project_incremental};
use crate::chart::ChartSink;
use crate::error::{DecodeError, TransportError};
use crate::market_data::candle_store::{CandleStore, Upsert};
use crate::market_data::history::{HistoryLoad, HistorySource};
use crate::market_data::quote_decoder::{decode_quote, decode_quote_bytes, DecodedQuote};
use crate::market_data::quote_stream::{stream_url, ConnectionId, StreamEvent, Transport};
use crate::types::{Selection, SelectionChange};

// ---------------------------------------------------------------------------
// Status types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Message counters for the current process.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessageStats {
    pub accepted: u64,
    pub rejected: u64,
    /// Dropped because they came from a superseded or closed connection.
    pub stale: u64,
    /// Valid, but older than everything a full candle window holds.
    pub outside_window: u64,
    pub last_accepted_at: Option<DateTime<Utc>>,
}

/// Serialisable view of the session for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub selection: Selection,
    pub connection: ConnectionState,
    pub connection_id: Option<ConnectionId>,
    pub candle_count: usize,
    pub messages: MessageStats,
    pub history_source: Option<HistorySource>,
}

impl SessionStatus {
    pub fn initial(selection: Selection) -> Self {
        Self {
            selection,
            connection: ConnectionState::Idle,
            connection_id: None,
            candle_count: 0,
            messages: MessageStats::default(),
            history_source: None,
        }
    }
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Accepted(Upsert),
    /// Decoded fine but too old for the full window; neither stored nor shown.
    OutsideWindow,
    Rejected,
    Stale,
}

// ---------------------------------------------------------------------------
// StreamSession
// ---------------------------------------------------------------------------

pub struct StreamSession<S: ChartSink, T: Transport> {
    endpoint: Option<String>,
    selection: Selection,
    state: ConnectionState,
    current: Option<ConnectionId>,
    next_connection: u64,
    store: CandleStore,
    sink: S,
    transport: T,
    stats: MessageStats,
    history_request: u64,
    history_source: Option<HistorySource>,
}

impl<S: ChartSink, T: Transport> StreamSession<S, T> {
    pub fn new(
        endpoint: Option<String>,
        selection: Selection,
        max_candles: usize,
        sink: S,
        transport: T,
    ) -> Self {
        Self {
            endpoint,
            selection,
            state: ConnectionState::Idle,
            current: None,
            next_connection: 1,
            store: CandleStore::new(max_candles),
            sink,
            transport,
            stats: MessageStats::default(),
            history_request: 0,
            history_source: None,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn current_connection(&self) -> Option<ConnectionId> {
        self.current
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &CandleStore {
        &self.store
    }

    #[cfg(test)]
    pub(crate) fn sink(&self) -> &S {
        &self.sink
    }

    pub fn stats(&self) -> &MessageStats {
        &self.stats
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            selection: self.selection.clone(),
            connection: self.state,
            connection_id: self.current,
            candle_count: self.store.len(),
            messages: self.stats.clone(),
            history_source: self.history_source,
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// First mount: open a connection if a stream endpoint is configured.
    pub fn start(&mut self) {
        if self.endpoint.is_some() {
            self.restart_stream();
        } else {
            info!(selection = %self.selection, "no stream endpoint configured — live updates disabled");
        }
    }

    /// Move to `next`, doing only the work the difference requires.
    pub fn apply_selection(&mut self, next: Selection) -> SelectionChange {
        let change = self.selection.diff(&next);
        if change.is_empty() {
            return change;
        }

        info!(from = %self.selection, to = %next, "selection changed");
        self.selection = next;

        if change.restream {
            self.restart_stream();
        }
        if change.reproject {
            self.reproject();
        }
        change
    }

    /// Close the current connection for good (shutdown).
    pub fn teardown(&mut self) {
        if let Some(id) = self.current.take() {
            self.transport.close(id);
            info!(connection = %id, "quote stream torn down");
        }
        if self.state != ConnectionState::Idle {
            self.state = ConnectionState::Closed;
        }
    }

    fn restart_stream(&mut self) {
        // (a) release the previous connection
        if let Some(old) = self.current.take() {
            self.transport.close(old);
            info!(connection = %old, "superseded quote stream closed");
        }
        // (b) + (c) forget the previous instrument's candles, on screen too.
        // A history load still in flight belongs to the old instrument.
        self.store.clear();
        self.sink.reset();
        self.history_request += 1;
        self.history_source = None;

        let Some(endpoint) = self.endpoint.as_deref() else {
            self.state = ConnectionState::Idle;
            return;
        };

        // (d) target for the new selection
        let url = match stream_url(endpoint, &self.selection.currency_pair, self.selection.tenor) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "cannot build quote stream URL");
                self.state = ConnectionState::Closed;
                return;
            }
        };

        // (e) open
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        self.current = Some(id);
        self.state = ConnectionState::Connecting;
        info!(
            connection = %id,
            currency_pair = %self.selection.currency_pair,
            tenor = %self.selection.tenor,
            max_candles = self.store.max_candles(),
            "opening quote stream"
        );
        self.transport.open(id, url);
    }

    fn reproject(&mut self) {
        let price_type = self.selection.price_type;
        if full_reload(&mut self.sink, &self.store, price_type) {
            debug!(price_type = %price_type, candles = self.store.len(), "series re-projected");
        }
    }

    fn is_current(&self, id: ConnectionId) -> bool {
        self.current == Some(id)
    }

    // ── Stream events ───────────────────────────────────────────────────

    pub fn on_stream_event(&mut self, event: StreamEvent) -> Option<MessageOutcome> {
        match event {
            StreamEvent::Opened(id) => {
                self.on_opened(id);
                None
            }
            StreamEvent::Text(id, text) => Some(self.on_message(id, || decode_quote(&text))),
            StreamEvent::Binary(id, bytes) => Some(self.on_message(id, || decode_quote_bytes(&bytes))),
            StreamEvent::Closed(id, reason) => {
                self.on_closed(id, reason);
                None
            }
        }
    }

    pub fn on_opened(&mut self, id: ConnectionId) {
        if !self.is_current(id) {
            debug!(connection = %id, "ignoring open of superseded connection");
            return;
        }
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Open;
            info!(connection = %id, "quote stream open");
        }
    }

    /// Decode and apply one frame from connection `id`.
    pub fn on_message<F>(&mut self, id: ConnectionId, decode: F) -> MessageOutcome
    where
        F: FnOnce() -> Result<DecodedQuote, DecodeError>,
    {
        if !self.is_current(id) || self.state != ConnectionState::Open {
            self.stats.stale += 1;
            debug!(connection = %id, "discarding message from non-current connection");
            return MessageOutcome::Stale;
        }

        match decode() {
            Ok(decoded) => {
                let record = decoded.record;
                let time_key = record.time_key;
                let price_type = self.selection.price_type;
                let meta = decoded.meta;

                let upsert = self.store.upsert(record.clone());
                if upsert == Upsert::Evicted {
                    self.stats.outside_window += 1;
                    debug!(
                        connection = %id,
                        quote_id = %meta.id,
                        time_key,
                        "candle older than the retained window — not shown"
                    );
                    return MessageOutcome::OutsideWindow;
                }
                project_incremental(&mut self.sink, &record, price_type);

                self.stats.accepted += 1;
                self.stats.last_accepted_at = Some(Utc::now());
                debug!(
                    connection = %id,
                    quote_id = %meta.id,
                    currency_pair = %meta.currency_pair,
                    start_ms = meta.start_ms,
                    interval = ?meta.interval,
                    tenor = ?meta.tenor,
                    pair = ?meta.pair,
                    time_key,
                    outcome = ?upsert,
                    "candle applied"
                );
                MessageOutcome::Accepted(upsert)
            }
            Err(e) => {
                self.stats.rejected += 1;
                warn!(connection = %id, error = %e, "discarding malformed quote message");
                MessageOutcome::Rejected
            }
        }
    }

    pub fn on_closed(&mut self, id: ConnectionId, reason: Option<TransportError>) {
        self.transport.close(id);
        if !self.is_current(id) {
            debug!(connection = %id, "superseded connection finished");
            return;
        }

        self.current = None;
        self.state = ConnectionState::Closed;
        match reason {
            Some(e) => warn!(connection = %id, error = %e, "quote stream closed — no further live updates"),
            None => info!(connection = %id, "quote stream closed — no further live updates"),
        }
    }

    // ── History ─────────────────────────────────────────────────────────

    /// Start a new history request; any earlier one becomes stale.
    pub fn begin_history_request(&mut self) -> u64 {
        self.history_request += 1;
        self.history_request
    }

    /// Show a finished history load unless a newer request superseded it.
    pub fn apply_history(&mut self, request: u64, load: HistoryLoad) -> bool {
        if request != self.history_request || load.timeframe != self.selection.timeframe {
            debug!(request, timeframe = %load.timeframe, "dropping superseded history load");
            return false;
        }

        info!(
            timeframe = %load.timeframe,
            source = ?load.source,
            count = load.series.len(),
            "history applied"
        );
        self.history_source = Some(load.source);
        self.sink.set_data(load.series);
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::view::{ChartView, DisplaySeries};
    use crate::market_data::quote_decoder::tests::quote_json;
    use crate::types::{OhlcPoint, PriceType, Tenor, Timeframe};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Op {
        Open(ConnectionId, String),
        Close(ConnectionId),
    }

    #[derive(Default)]
    struct FakeTransport {
        ops: Vec<Op>,
    }

    impl Transport for FakeTransport {
        fn open(&mut self, id: ConnectionId, url: String) {
            self.ops.push(Op::Open(id, url));
        }

        fn close(&mut self, id: ConnectionId) {
            self.ops.push(Op::Close(id));
        }
    }

    const ENDPOINT: &str = "ws://quotes.test/rt";

    fn session() -> StreamSession<ChartView, FakeTransport> {
        StreamSession::new(
            Some(ENDPOINT.to_string()),
            Selection::default(),
            1000,
            ChartView::new(),
            FakeTransport::default(),
        )
    }

    fn open_session() -> (StreamSession<ChartView, FakeTransport>, ConnectionId) {
        let mut s = session();
        s.start();
        let id = s.current_connection().unwrap();
        s.on_opened(id);
        (s, id)
    }

    fn send(s: &mut StreamSession<ChartView, FakeTransport>, id: ConnectionId, json: String) -> MessageOutcome {
        s.on_stream_event(StreamEvent::Text(id, json)).unwrap()
    }

    fn with_pair(s: &StreamSession<ChartView, FakeTransport>, pair: &str) -> Selection {
        let mut next = s.selection().clone();
        next.currency_pair = pair.to_string();
        next
    }

    #[test]
    fn start_opens_connection_with_selection_query() {
        let mut s = session();
        assert_eq!(s.state(), ConnectionState::Idle);
        s.start();
        assert_eq!(s.state(), ConnectionState::Connecting);
        assert_eq!(
            s.transport().ops,
            vec![Op::Open(
                ConnectionId(1),
                format!("{ENDPOINT}?currency_pair=EURUSD&tenor=SPOT")
            )]
        );

        s.on_opened(ConnectionId(1));
        assert_eq!(s.state(), ConnectionState::Open);
    }

    #[test]
    fn start_without_endpoint_stays_idle() {
        let mut s = StreamSession::new(None, Selection::default(), 10, ChartView::new(), FakeTransport::default());
        s.start();
        assert_eq!(s.state(), ConnectionState::Idle);
        assert!(s.transport().ops.is_empty());
    }

    #[test]
    fn messages_upsert_and_update_sink() {
        let (mut s, id) = open_session();

        let first = send(&mut s, id, quote_json("EURUSD", 1_700_000_000_000, 1.0850, None));
        let revised = send(&mut s, id, quote_json("EURUSD", 1_700_000_000_500, 1.0860, None));
        let second = send(&mut s, id, quote_json("EURUSD", 1_700_000_060_000, 1.0870, None));

        assert_eq!(first, MessageOutcome::Accepted(Upsert::Inserted));
        assert_eq!(revised, MessageOutcome::Accepted(Upsert::Replaced));
        assert_eq!(second, MessageOutcome::Accepted(Upsert::Inserted));

        assert_eq!(s.store().len(), 2);
        assert!((s.store().get(1_700_000_000).unwrap().mid.open - 1.0860).abs() < 1e-12);

        let series = s.sink().series();
        assert_eq!(series.times(), vec![1_700_000_000, 1_700_000_060]);
        assert!((series.points()[0].open - 1.0860).abs() < 1e-12);
        assert_eq!(s.stats().accepted, 3);
        assert!(s.stats().last_accepted_at.is_some());
    }

    #[test]
    fn malformed_message_leaves_store_untouched() {
        let (mut s, id) = open_session();
        send(&mut s, id, quote_json("EURUSD", 1_700_000_000_000, 1.0850, None));
        let before = s.store().snapshot_sorted_by_time().into_iter().cloned().collect::<Vec<_>>();

        let outcome = send(&mut s, id, quote_json("EURUSD", 1_700_000_060_000, 1.09, Some("mid")));
        assert_eq!(outcome, MessageOutcome::Rejected);

        let after = s.store().snapshot_sorted_by_time().into_iter().cloned().collect::<Vec<_>>();
        assert_eq!(before, after);
        assert_eq!(s.sink().len(), 1);
        assert_eq!(s.state(), ConnectionState::Open);
        assert_eq!(s.stats().rejected, 1);
    }

    #[test]
    fn pair_switch_clears_store_and_sink_before_new_data() {
        let (mut s, old) = open_session();
        send(&mut s, old, quote_json("EURUSD", 1_700_000_000_000, 1.0850, None));
        assert_eq!(s.store().len(), 1);

        let next = with_pair(&s, "GBPUSD");
        let change = s.apply_selection(next);
        assert!(change.restream);

        assert!(s.store().is_empty());
        assert!(s.sink().is_empty());
        assert_eq!(s.state(), ConnectionState::Connecting);

        let new = s.current_connection().unwrap();
        assert_ne!(new, old);
        assert_eq!(
            s.transport().ops[1..],
            [
                Op::Close(old),
                Op::Open(new, format!("{ENDPOINT}?currency_pair=GBPUSD&tenor=SPOT")),
            ]
        );
    }

    #[test]
    fn late_messages_from_superseded_connection_are_ignored() {
        let (mut s, old) = open_session();
        s.apply_selection(with_pair(&s, "USDJPY"));
        let new = s.current_connection().unwrap();
        s.on_opened(old);
        assert_eq!(s.state(), ConnectionState::Connecting);
        s.on_opened(new);

        let outcome = send(&mut s, old, quote_json("EURUSD", 1_700_000_000_000, 1.0850, None));
        assert_eq!(outcome, MessageOutcome::Stale);
        assert!(s.store().is_empty());
        assert!(s.sink().is_empty());

        // The old connection finishing does not close the new one.
        s.on_closed(old, None);
        assert_eq!(s.state(), ConnectionState::Open);
        assert_eq!(s.current_connection(), Some(new));

        let outcome = send(&mut s, new, quote_json("USDJPY", 1_700_000_000_000, 150.0, None));
        assert!(matches!(outcome, MessageOutcome::Accepted(_)));
        assert_eq!(s.stats().stale, 1);
    }

    #[test]
    fn tenor_switch_restreams() {
        let (mut s, _) = open_session();
        let mut next = s.selection().clone();
        next.tenor = Tenor::from_label("W1").unwrap();
        s.apply_selection(next);
        match s.transport().ops.last() {
            Some(Op::Open(_, url)) => assert!(url.ends_with("tenor=W1")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn price_switch_reprojects_without_clearing() {
        let (mut s, id) = open_session();
        for start in [1_700_000_120_000, 1_700_000_000_000, 1_700_000_060_000] {
            send(&mut s, id, quote_json("EURUSD", start, 1.0850, None));
        }
        let ops_before = s.transport().ops.len();

        let mut next = s.selection().clone();
        next.price_type = PriceType::Bid;
        let change = s.apply_selection(next);
        assert!(change.reproject && !change.restream);

        assert_eq!(s.store().len(), 3);
        assert_eq!(s.transport().ops.len(), ops_before);

        let series = s.sink().series();
        assert_eq!(series.times(), vec![1_700_000_000, 1_700_000_060, 1_700_000_120]);
        for (point, record) in series.points().iter().zip(s.store().snapshot_sorted_by_time()) {
            assert_eq!(*point, OhlcPoint::new(record.time_key, record.bid));
        }

        // New messages now project the bid side.
        send(&mut s, id, quote_json("EURUSD", 1_700_000_180_000, 1.0900, None));
        let last = *s.sink().series().points().last().unwrap();
        assert_eq!(last, OhlcPoint::new(1_700_000_180, s.store().latest().unwrap().bid));
    }

    #[test]
    fn price_switch_on_empty_store_keeps_sink() {
        let mut s = session();
        s.start();
        let req = s.begin_history_request();
        let history = DisplaySeries::from_unordered(vec![OhlcPoint {
            time: 60,
            open: 1.0,
            high: 1.1,
            low: 0.9,
            close: 1.05,
        }]);
        assert!(s.apply_history(
            req,
            HistoryLoad {
                timeframe: Timeframe::M1,
                source: HistorySource::Synthetic,
                series: history
            }
        ));

        let mut next = s.selection().clone();
        next.price_type = PriceType::Ask;
        s.apply_selection(next);
        assert_eq!(s.sink().len(), 1);
    }

    #[test]
    fn closed_connection_is_not_reopened() {
        let (mut s, id) = open_session();
        s.on_closed(
            id,
            Some(TransportError::ClosedByPeer {
                reason: "1011 server going away".into(),
            }),
        );
        assert_eq!(s.state(), ConnectionState::Closed);
        assert!(s.current_connection().is_none());
        assert_eq!(s.transport().ops.last(), Some(&Op::Close(id)));

        let outcome = send(&mut s, id, quote_json("EURUSD", 1_700_000_000_000, 1.0850, None));
        assert_eq!(outcome, MessageOutcome::Stale);

        // Only a pair/tenor change opens a new one.
        let opens = |s: &StreamSession<ChartView, FakeTransport>| {
            s.transport().ops.iter().filter(|op| matches!(op, Op::Open(..))).count()
        };
        assert_eq!(opens(&s), 1);
        s.apply_selection(with_pair(&s, "AUDUSD"));
        assert_eq!(opens(&s), 2);
        assert_eq!(s.state(), ConnectionState::Connecting);
    }

    #[test]
    fn teardown_releases_connection() {
        let (mut s, id) = open_session();
        s.teardown();
        assert_eq!(s.state(), ConnectionState::Closed);
        assert_eq!(s.transport().ops.last(), Some(&Op::Close(id)));
        s.teardown();
        assert_eq!(s.transport().ops.iter().filter(|op| matches!(op, Op::Close(_))).count(), 1);
    }

    #[test]
    fn stale_history_is_dropped() {
        let mut s = session();
        let first = s.begin_history_request();
        let second = s.begin_history_request();
        let load = |tf| HistoryLoad {
            timeframe: tf,
            source: HistorySource::Historical,
            series: DisplaySeries::from_unordered(vec![OhlcPoint {
                time: 60,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
            }]),
        };

        assert!(!s.apply_history(first, load(Timeframe::M1)));
        assert!(s.sink().is_empty());
        assert!(s.apply_history(second, load(Timeframe::M1)));
        assert_eq!(s.status().history_source, Some(HistorySource::Historical));
    }

    #[test]
    fn history_started_before_pair_switch_is_dropped() {
        let mut s = session();
        s.start();
        let req = s.begin_history_request();
        let load = HistoryLoad {
            timeframe: Timeframe::M1,
            source: HistorySource::Historical,
            series: DisplaySeries::from_unordered(vec![OhlcPoint {
                time: 60,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
            }]),
        };

        // Timeframe unchanged, so nothing new is requested for GBPUSD.
        let change = s.apply_selection(with_pair(&s, "GBPUSD"));
        assert!(!change.reload_history);

        assert!(!s.apply_history(req, load));
        assert!(s.sink().is_empty());
        assert_eq!(s.status().history_source, None);
    }

    #[test]
    fn pair_switch_forgets_history_source() {
        let mut s = session();
        s.start();
        let req = s.begin_history_request();
        assert!(s.apply_history(
            req,
            HistoryLoad {
                timeframe: Timeframe::M1,
                source: HistorySource::Synthetic,
                series: DisplaySeries::from_unordered(vec![OhlcPoint {
                    time: 60,
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                }]),
            }
        ));
        assert_eq!(s.status().history_source, Some(HistorySource::Synthetic));

        s.apply_selection(with_pair(&s, "USDJPY"));
        assert!(s.sink().is_empty());
        assert_eq!(s.status().history_source, None);
    }

    #[test]
    fn full_window_ignores_older_candle() {
        let mut s = StreamSession::new(
            Some(ENDPOINT.to_string()),
            Selection::default(),
            2,
            ChartView::new(),
            FakeTransport::default(),
        );
        s.start();
        let id = s.current_connection().unwrap();
        s.on_opened(id);

        send(&mut s, id, quote_json("EURUSD", 1_700_000_120_000, 1.0850, None));
        send(&mut s, id, quote_json("EURUSD", 1_700_000_180_000, 1.0860, None));
        let outcome = send(&mut s, id, quote_json("EURUSD", 1_700_000_000_000, 1.0800, None));

        assert_eq!(outcome, MessageOutcome::OutsideWindow);
        assert_eq!(s.store().len(), 2);
        assert!(s.store().get(1_700_000_000).is_none());
        assert_eq!(s.sink().series().times(), vec![1_700_000_120, 1_700_000_180]);
        assert_eq!(s.stats().accepted, 2);
        assert_eq!(s.stats().outside_window, 1);
    }

    #[test]
    fn store_keeps_last_message_per_key() {
        let (mut s, id) = open_session();
        let starts = [0_i64, 60_000, 0, 120_000, 60_000, 60_500, 0];
        for (i, start) in starts.iter().enumerate() {
            let base = 1.0 + i as f64 * 0.01;
            send(&mut s, id, quote_json("EURUSD", 1_700_000_000_000 + start, base, None));
        }

        assert_eq!(s.store().len(), 3);
        // Last writes: key 0 -> i=6, key 60 -> i=5, key 120 -> i=3.
        for (key, i) in [(1_700_000_000, 6), (1_700_000_060, 5), (1_700_000_120, 3)] {
            let expected = 1.0 + i as f64 * 0.01;
            assert!((s.store().get(key).unwrap().mid.open - expected).abs() < 1e-12);
        }
    }
}
