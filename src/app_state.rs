// =============================================================================
// Central Application State — FX chart feed
// =============================================================================
//
// Shared between the session controller (writer) and the dashboard API
// (readers) via `Arc<AppState>`. The controller owns the session itself; what
// lives here is the published view of it:
//
//   - the chart (written through `ChartHandle`, which bumps the version)
//   - the latest `SessionStatus`
//   - the command channel back into the controller
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for the mutable shared pieces.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::chart::{ChartHandle, ChartHeader, DisplaySeries};
use crate::market_data::history::HistorySource;
use crate::market_data::quote_stream::ConnectionId;
use crate::runtime_config::RuntimeConfig;
use crate::session::{ConnectionState, ControlCommand, MessageStats, SessionStatus};
use crate::types::Selection;

// =============================================================================
// AppState
// =============================================================================

pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Monotonically increasing version counter. Bumped by every chart write
    /// and every status change; the WebSocket feed pushes when it moves.
    pub state_version: Arc<AtomicU64>,

    /// Total snapshots pushed over dashboard WebSockets.
    pub ws_sequence_number: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    // ── Session view ────────────────────────────────────────────────────
    pub chart: ChartHandle,
    status: RwLock<SessionStatus>,

    // ── Controller ──────────────────────────────────────────────────────
    pub commands: mpsc::Sender<ControlCommand>,

    // ── Timing ──────────────────────────────────────────────────────────
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: RuntimeConfig, commands: mpsc::Sender<ControlCommand>) -> Self {
        let state_version = Arc::new(AtomicU64::new(1));
        let status = SessionStatus::initial(config.initial_selection());

        Self {
            chart: ChartHandle::new(state_version.clone()),
            state_version,
            ws_sequence_number: AtomicU64::new(0),
            runtime_config: Arc::new(RwLock::new(config)),
            status: RwLock::new(status),
            commands,
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Session status ──────────────────────────────────────────────────

    /// Replace the published status; bumps the version only when it changed.
    pub fn publish_status(&self, status: SessionStatus) {
        let mut current = self.status.write();
        if *current != status {
            *current = status;
            drop(current);
            self.increment_version();
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Everything the dashboard shows, for `GET /api/v1/state` and the
    /// WebSocket feed.
    pub fn build_snapshot(&self) -> StateSnapshot {
        let now = Utc::now();
        let version = self.current_state_version();
        let status = self.status();
        let config = self.runtime_config.read();

        StateSnapshot {
            state_version: version,
            server_time: now.timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            ws_sequence_number: self.ws_sequence_number.load(Ordering::Relaxed),
            header: self.chart.header(&status.selection.currency_pair),
            series: self.chart.series(),
            selection: status.selection,
            connection: status.connection,
            connection_id: status.connection_id,
            candle_count: status.candle_count,
            messages: status.messages,
            history_source: status.history_source,
            endpoints: EndpointSummary {
                stream: config.ws_endpoint.clone(),
                history: config.history_endpoint.clone(),
                max_candles: config.max_candles,
            },
        }
    }
}

// =============================================================================
// Serialisable snapshot types
// =============================================================================

/// Full feed state sent to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub ws_sequence_number: u64,
    pub selection: Selection,
    pub connection: ConnectionState,
    pub connection_id: Option<ConnectionId>,
    pub candle_count: usize,
    pub messages: MessageStats,
    pub history_source: Option<HistorySource>,
    pub header: ChartHeader,
    pub series: DisplaySeries,
    pub endpoints: EndpointSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<String>,
    pub max_candles: usize,
}
