//! Error types for the three failure domains of the feed.
//!
//! None of these is fatal: a bad message is dropped, a dead connection stays
//! closed, and a failed history load is replaced by a synthetic series.

use thiserror::Error;

/// An inbound stream message that cannot be turned into a candle record.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed quote message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("non-finite {price_type} price in quote message")]
    NonFinite { price_type: &'static str },

    #[error("non-text frame ({len} bytes) is not valid UTF-8")]
    NotText { len: usize },
}

/// Failure of the streaming connection itself.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid stream endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("connect failed: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("read failed: {0}")]
    Read(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("closed by peer: {reason}")]
    ClosedByPeer { reason: String },
}

/// Failure to load the historical series.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no history endpoint configured")]
    NotConfigured,

    #[error("invalid history endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("history request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("history endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}
