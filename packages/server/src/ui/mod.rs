//! Chat relay server: HTTP API, WebSocket endpoint and connection sessions.

mod handler;
mod server;
pub mod session;
pub mod signal;
pub mod state;

pub use server::Server;
pub use session::{SessionConfig, SessionError};
pub use signal::shutdown_signal;
pub use state::AppState;
