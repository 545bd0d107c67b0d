//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::{
    domain::{MemberId, RoomId},
    infrastructure::dto::http::{
        ActiveMemberDto, CreateRoomRequest, CreateUserRequest, MessageDto, PaginationQuery,
        RoomDto, RoomStateDto, UserDto,
    },
    ui::state::AppState,
    usecase::{CreateRoomError, CreateUserError, QueryError},
};

use super::ApiError;

const INVALID_BODY: ApiError = ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "Invalid data format");
const INVALID_ROOM_ID: ApiError = ApiError::new(StatusCode::BAD_REQUEST, "Invalid room ID");
const ROOM_NOT_FOUND: ApiError = ApiError::new(StatusCode::NOT_FOUND, "Room not found");
const USER_NOT_FOUND: ApiError = ApiError::new(StatusCode::NOT_FOUND, "User account not found");
const UNAVAILABLE: ApiError =
    ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down");

fn parse_room_id(raw: &str) -> Result<RoomId, ApiError> {
    RoomId::parse(raw).map_err(|_| INVALID_ROOM_ID)
}

/// 参照系のエラーを HTTP ステータスに変換
fn query_error(error: QueryError, not_found: ApiError, failure: &'static str) -> ApiError {
    match error {
        QueryError::NotFound => not_found,
        QueryError::Persistence(e) => {
            tracing::error!("{}: {}", failure, e);
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, failure)
        }
        QueryError::CoordinatorUnavailable => UNAVAILABLE,
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Create a user
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserDto>), ApiError> {
    let Json(request) = payload.map_err(|_| INVALID_BODY)?;

    match state.create_user_usecase.execute(request.username).await {
        Ok(user) => Ok((StatusCode::CREATED, Json(user.into()))),
        Err(CreateUserError::InvalidInput(e)) => {
            tracing::debug!("Rejected username: {}", e);
            Err(ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Username must be 1 to 50 characters",
            ))
        }
        Err(CreateUserError::UsernameTaken) => Err(ApiError::new(
            StatusCode::CONFLICT,
            "Username is already taken",
        )),
        Err(CreateUserError::Persistence(e)) => {
            tracing::error!("Failed to create user: {}", e);
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create user",
            ))
        }
    }
}

/// Get a user by ID
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<UserDto>, ApiError> {
    let user_id = MemberId::parse(&user_id)
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "Invalid user ID"))?;

    state
        .get_user_usecase
        .execute(user_id)
        .await
        .map(|user| Json(user.into()))
        .map_err(|e| query_error(e, USER_NOT_FOUND, "Failed to retrieve user"))
}

/// Create a room (and make it live right away)
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RoomDto>), ApiError> {
    let Json(request) = payload.map_err(|_| INVALID_BODY)?;
    let creator_id = MemberId::parse(&request.user_id).map_err(|_| {
        ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "User ID is required")
    })?;

    match state
        .create_room_usecase
        .execute(request.name, creator_id)
        .await
    {
        Ok(room) => Ok((StatusCode::CREATED, Json(room.into()))),
        Err(CreateRoomError::InvalidInput(e)) => {
            tracing::debug!("Rejected room name: {}", e);
            Err(ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Room name must be 1 to 100 characters",
            ))
        }
        Err(CreateRoomError::CreatorNotFound) => Err(USER_NOT_FOUND),
        Err(CreateRoomError::Persistence(e)) => {
            tracing::error!("Failed to create room: {}", e);
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create room",
            ))
        }
    }
}

/// Get list of rooms (newest first)
pub async fn get_rooms(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Vec<RoomDto>>, ApiError> {
    let rooms = state
        .get_rooms_usecase
        .execute(query.to_pagination())
        .await
        .map_err(|e| query_error(e, ROOM_NOT_FOUND, "Failed to retrieve rooms"))?;

    // Domain Model から DTO への変換
    Ok(Json(rooms.into_iter().map(RoomDto::from).collect()))
}

/// Get room detail by ID
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDto>, ApiError> {
    let room_id = parse_room_id(&room_id)?;

    state
        .get_room_detail_usecase
        .execute(room_id)
        .await
        .map(|room| Json(room.into()))
        .map_err(|e| query_error(e, ROOM_NOT_FOUND, "Failed to retrieve room"))
}

/// Get members currently connected to a room
pub async fn get_active_members(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<ActiveMemberDto>>, ApiError> {
    let room_id = RoomId::parse(&room_id).map_err(|_| {
        ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "Room ID is required")
    })?;

    let members = state
        .get_active_members_usecase
        .execute(room_id)
        .await
        .map_err(|e| {
            query_error(
                e,
                ApiError::new(
                    StatusCode::NOT_FOUND,
                    "Room not found or has inactive users",
                ),
                "Failed to retrieve active members",
            )
        })?;

    Ok(Json(members.into_iter().map(ActiveMemberDto::from).collect()))
}

/// Get stored messages of a room (newest first)
pub async fn get_room_messages(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let room_id = parse_room_id(&room_id)?;

    let messages = state
        .get_room_messages_usecase
        .execute(room_id, query.to_pagination())
        .await
        .map_err(|e| query_error(e, ROOM_NOT_FOUND, "Failed to retrieve room messages"))?;

    Ok(Json(messages.iter().map(MessageDto::from).collect()))
}

/// Debug endpoint to get the in-memory state of a live room (for testing purposes)
pub async fn debug_room_state(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomStateDto>, ApiError> {
    let room_id = parse_room_id(&room_id)?;

    state
        .get_room_state_usecase
        .execute(room_id)
        .await
        .map(|snapshot| Json(snapshot.into()))
        .map_err(|e| {
            query_error(
                e,
                ApiError::new(StatusCode::NOT_FOUND, "Room is not live"),
                "Failed to retrieve room state",
            )
        })
}
