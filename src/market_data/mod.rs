pub mod candle_store;
pub mod history;
pub mod quote_decoder;
pub mod quote_stream;

pub use history::HistoryClient;
pub use quote_stream::WsTransport;
