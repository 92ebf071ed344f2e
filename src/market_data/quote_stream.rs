// =============================================================================
// Quote Stream — one WebSocket connection per (currency pair, tenor)
// =============================================================================
//
// The reader task never touches session state. It forwards everything it sees
// as `StreamEvent`s tagged with its `ConnectionId`; the session controller
// decides what is still current.
// =============================================================================

use std::collections::HashMap;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::error::TransportError;
use crate::types::Tenor;

/// Identifies one connection attempt. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a connection task reports back to the controller.
#[derive(Debug)]
pub enum StreamEvent {
    Opened(ConnectionId),
    Text(ConnectionId, String),
    Binary(ConnectionId, Vec<u8>),
    /// Terminal. `None` means the stream ended without an error.
    Closed(ConnectionId, Option<TransportError>),
}

/// `<endpoint>?currency_pair=EURUSD&tenor=SPOT`, keeping any query the
/// endpoint already carries.
pub fn stream_url(endpoint: &str, currency_pair: &str, tenor: Tenor) -> Result<String, TransportError> {
    reqwest::Url::parse_with_params(
        endpoint,
        &[("currency_pair", currency_pair), ("tenor", tenor.label())],
    )
    .map(String::from)
    .map_err(|e| TransportError::InvalidEndpoint(format!("{endpoint}: {e}")))
}

/// Connect to `url` and forward frames into `events` until the stream ends,
/// fails, or the receiver goes away.
///
/// Always finishes with exactly one `Closed` event (unless the receiver is
/// gone). Does not reconnect.
pub async fn run_quote_stream(id: ConnectionId, url: String, events: mpsc::Sender<StreamEvent>) {
    info!(connection = %id, url = %url, "connecting to quote stream");

    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            error!(connection = %id, url = %url, error = %e, "quote stream connect failed");
            let _ = events
                .send(StreamEvent::Closed(id, Some(TransportError::Connect(e))))
                .await;
            return;
        }
    };

    info!(connection = %id, "quote stream connected");
    if events.send(StreamEvent::Opened(id)).await.is_err() {
        return;
    }

    let (_write, mut read) = ws_stream.split();

    let outcome = loop {
        let event = match read.next().await {
            Some(Ok(Message::Text(text))) => StreamEvent::Text(id, text),
            Some(Ok(Message::Binary(bytes))) => StreamEvent::Binary(id, bytes),
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                    .unwrap_or_else(|| "no close frame".to_string());
                warn!(connection = %id, reason = %reason, "quote stream closed by peer");
                break Some(TransportError::ClosedByPeer { reason });
            }
            // tungstenite answers pings itself.
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                error!(connection = %id, error = %e, "quote stream read error");
                break Some(TransportError::Read(e));
            }
            None => {
                warn!(connection = %id, "quote stream ended");
                break None;
            }
        };

        if events.send(event).await.is_err() {
            debug!(connection = %id, "controller gone — stopping quote stream");
            return;
        }
    };

    let _ = events.send(StreamEvent::Closed(id, outcome)).await;
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Opens and closes streaming connections on behalf of the session.
pub trait Transport {
    fn open(&mut self, id: ConnectionId, url: String);
    /// Release the connection. Closing an unknown or finished id is a no-op.
    fn close(&mut self, id: ConnectionId);
}

/// Spawns one [`run_quote_stream`] task per connection and aborts it on
/// close; dropping the transport aborts whatever is still running.
pub struct WsTransport {
    events: mpsc::Sender<StreamEvent>,
    tasks: HashMap<ConnectionId, JoinHandle<()>>,
}

impl WsTransport {
    pub fn new(events: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            events,
            tasks: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn live_connections(&self) -> usize {
        self.tasks.len()
    }
}

impl Transport for WsTransport {
    fn open(&mut self, id: ConnectionId, url: String) {
        let handle = tokio::spawn(run_quote_stream(id, url, self.events.clone()));
        if let Some(previous) = self.tasks.insert(id, handle) {
            previous.abort();
        }
    }

    fn close(&mut self, id: ConnectionId) {
        if let Some(handle) = self.tasks.remove(&id) {
            handle.abort();
            debug!(connection = %id, "quote stream task released");
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
