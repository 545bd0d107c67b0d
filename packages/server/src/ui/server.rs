//! Server execution logic.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::{
    handler::{
        create_room, create_user, debug_room_state, get_active_members, get_room_detail,
        get_room_messages, get_rooms, get_user, health_check, websocket_handler,
    },
    state::AppState,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Chat relay server
///
/// This struct encapsulates the server configuration and provides methods to run the server.
///
/// # Example
///
/// ```ignore
/// let server = Server::new(app_state, Duration::from_secs(15));
/// server.run("127.0.0.1", 8000).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
    /// シャットダウン時に接続セッションの終了を待つ時間
    shutdown_grace: Duration,
}

impl Server {
    /// Create a new Server instance
    pub fn new(state: AppState, shutdown_grace: Duration) -> Self {
        Self {
            state: Arc::new(state),
            shutdown_grace,
        }
    }

    /// Build the router with every endpoint
    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route("/ws/{user_id}", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/users", post(create_user))
            .route("/api/users/{user_id}", get(get_user))
            .route("/api/rooms", get(get_rooms).post(create_room))
            .route("/api/rooms/{room_id}", get(get_room_detail))
            .route("/api/rooms/{room_id}/active", get(get_active_members))
            .route("/api/rooms/{room_id}/messages", get(get_room_messages))
            .route("/debug/rooms/{room_id}", get(debug_room_state))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Bind to `host:port` and run until the shutdown token is cancelled
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: &str, port: u16) -> Result<(), BoxError> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;
        self.serve(listener).await
    }

    /// Run on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<(), BoxError> {
        let local_addr = listener.local_addr()?;
        tracing::info!("Chat relay server listening on {}", local_addr);
        tracing::info!("Connect to: ws://{}/ws/{{user_id}}?room_id={{room_id}}", local_addr);

        let app = self.router();
        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        // axum は upgrade 済みの接続を待たないので、セッションはここで待つ
        let sessions = &self.state.sessions;
        sessions.close();
        tracing::info!(
            "Waiting up to {:?} for {} session(s) to close",
            self.shutdown_grace,
            sessions.len()
        );
        if tokio::time::timeout(self.shutdown_grace, sessions.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                "Grace period elapsed; force closing {} session(s)",
                sessions.len()
            );
        }

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
