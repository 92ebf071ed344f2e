pub mod controller;
pub mod stream_session;

pub use controller::{run_controller, ControlCommand};
pub use stream_session::{ConnectionState, MessageStats, SessionStatus, StreamSession};
