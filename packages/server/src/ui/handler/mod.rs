//! HTTP and WebSocket handlers.

mod http;
mod websocket;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::infrastructure::dto::http::ErrorResponse;

pub use http::{
    create_room, create_user, debug_room_state, get_active_members, get_room_detail,
    get_room_messages, get_rooms, get_user, health_check,
};
pub use websocket::websocket_handler;

/// Error response with a `{"message": ...}` body
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    pub const fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse::new(self.message))).into_response()
    }
}
