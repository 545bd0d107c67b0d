//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Path, Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::Response,
};

use crate::{
    domain::{MemberId, RoomId},
    infrastructure::dto::websocket::ConnectQuery,
    ui::{session, state::AppState},
    usecase::{JoinError, JoinRequest, QueryError},
};

use super::ApiError;

/// `GET /ws/{user_id}?room_id=<uuid>`
///
/// ユーザーと Room の存在を確認してから接続をアップグレードする。
/// Room への参加はアップグレード後に行い、拒否された場合は何も送らずに接続を閉じる。
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<ConnectQuery>,
) -> Result<Response, ApiError> {
    // Convert String -> Domain Model
    let member_id = MemberId::parse(&user_id).map_err(|_| {
        tracing::warn!("Invalid user_id format: '{}'", user_id);
        ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "User ID is required")
    })?;
    let room_id = RoomId::parse(&query.room_id).map_err(|_| {
        tracing::warn!("Invalid room_id format: '{}'", query.room_id);
        ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "Invalid room ID")
    })?;

    let user = state
        .get_user_usecase
        .execute(member_id)
        .await
        .map_err(|e| join_lookup_error(e, "User account not found"))?;

    // the in-memory room is created on join, only when it exists in storage
    state
        .get_room_detail_usecase
        .execute(room_id)
        .await
        .map_err(|e| join_lookup_error(e, "Room not found"))?;

    let request = JoinRequest {
        member_id: user.id,
        display_name: user.username,
        room_id,
    };
    let sessions = state.sessions.clone();
    let max_frame_size = state.max_frame_size;

    Ok(ws
        .max_message_size(max_frame_size)
        .max_frame_size(max_frame_size)
        .on_upgrade(move |socket| sessions.track_future(handle_socket(socket, state, request))))
}

fn join_lookup_error(error: QueryError, not_found: &'static str) -> ApiError {
    match error {
        QueryError::NotFound => ApiError::new(StatusCode::NOT_FOUND, not_found),
        QueryError::CoordinatorUnavailable => {
            ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down")
        }
        QueryError::Persistence(e) => {
            tracing::error!("Failed to join room: {}", e);
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to join room")
        }
    }
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, request: JoinRequest) {
    let member_id = request.member_id;
    let room_id = request.room_id;

    let ticket = match state.join_room_usecase.execute(request).await {
        Ok(ticket) => ticket,
        Err(e) => {
            match &e {
                JoinError::RoomNotFound => {
                    tracing::warn!("Member '{}' tried to join missing room '{}'", member_id, room_id)
                }
                _ => tracing::error!(
                    "Member '{}' could not join room '{}': {}",
                    member_id,
                    room_id,
                    e
                ),
            }
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: e.to_string().into(),
                })))
                .await;
            return;
        }
    };

    tracing::info!(
        "Member '{}' ({}) connected to room '{}' as session '{}'",
        ticket.identity.display_name,
        member_id,
        room_id,
        ticket.identity.session_id
    );

    session::run(
        socket,
        ticket,
        state.session_deps(),
        state.session_config.clone(),
        state.shutdown.clone(),
    )
    .await;
}
