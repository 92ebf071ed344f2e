// =============================================================================
// Session Controller — the single writer of session state
// =============================================================================
//
// Owns the `StreamSession` and serialises everything that touches it:
//   - selection commands from the dashboard API
//   - events from quote stream reader tasks
//   - finished history loads
//
// After every step the session status is published to `AppState` so the REST
// and WebSocket handlers can read it without reaching into the session.
// =============================================================================

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::app_state::AppState;
use crate::chart::ChartSink;
use crate::market_data::history::{HistoryClient, HistoryLoad};
use crate::market_data::quote_stream::{StreamEvent, Transport};
use crate::session::stream_session::StreamSession;
use crate::types::{Selection, SelectionUpdate, Timeframe};

/// Requests the controller accepts from the rest of the process.
#[derive(Debug)]
pub enum ControlCommand {
    /// Apply a partial selection change; the reply carries the resulting
    /// selection or a validation message.
    Select {
        update: SelectionUpdate,
        reply: oneshot::Sender<Result<Selection, String>>,
    },
    Shutdown,
}

/// Run until `Shutdown` arrives or every command sender is dropped, then tear
/// the session down.
pub async fn run_controller<S, T>(
    state: Arc<AppState>,
    mut session: StreamSession<S, T>,
    history: HistoryClient,
    mut commands: mpsc::Receiver<ControlCommand>,
    mut events: mpsc::Receiver<StreamEvent>,
) where
    S: ChartSink,
    T: Transport,
{
    let (history_tx, mut history_rx) = mpsc::channel::<(u64, HistoryLoad)>(8);

    info!(selection = %session.selection(), "session controller started");
    session.start();
    let timeframe = session.selection().timeframe;
    request_history(&mut session, &history, &history_tx, timeframe);
    state.publish_status(session.status());

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ControlCommand::Select { update, reply }) => {
                    let result = update.apply_to(session.selection()).map(|next| {
                        let change = session.apply_selection(next);
                        if change.reload_history {
                            let timeframe = session.selection().timeframe;
                            request_history(&mut session, &history, &history_tx, timeframe);
                        }
                        session.selection().clone()
                    });
                    let _ = reply.send(result);
                }
                Some(ControlCommand::Shutdown) | None => break,
            },

            Some(event) = events.recv() => {
                session.on_stream_event(event);
            }

            Some((request, load)) = history_rx.recv() => {
                session.apply_history(request, load);
            }
        }

        state.publish_status(session.status());
    }

    session.teardown();
    state.publish_status(session.status());
    let stats = session.stats();
    info!(
        connection = %session.state(),
        accepted = stats.accepted,
        rejected = stats.rejected,
        stale = stats.stale,
        "session controller stopped"
    );
}

fn request_history<S: ChartSink, T: Transport>(
    session: &mut StreamSession<S, T>,
    history: &HistoryClient,
    results: &mpsc::Sender<(u64, HistoryLoad)>,
    timeframe: Timeframe,
) {
    let request = session.begin_history_request();
    let client = history.clone();
    let results = results.clone();
    debug!(request, timeframe = %timeframe, "requesting history");

    tokio::spawn(async move {
        let load = client.load(timeframe).await;
        let _ = results.send((request, load)).await;
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
