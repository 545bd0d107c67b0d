//! HTTP API DTOs.

use serde::{Deserialize, Serialize};

use crate::usecase::Pagination;

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `POST /api/users`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}

/// User representation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub username: String,
    pub created_at: String,
}

/// `POST /api/rooms`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub name: String,
    pub user_id: String,
}

/// Room representation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomDto {
    pub id: String,
    pub name: String,
    pub creator_id: String,
    pub created_at: String,
}

/// Stored or buffered chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub content: String,
    pub created_at: String,
}

/// Member currently connected to a room
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveMemberDto {
    pub id: String,
    pub username: String,
}

/// In-memory state of a live room (debug endpoint)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateDto {
    pub room: RoomDto,
    pub members: Vec<ActiveMemberDto>,
    pub history: Vec<MessageDto>,
}

/// `?page=&pageSize=`
///
/// 数値として解釈できない値は未指定として扱う。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl PaginationQuery {
    pub fn to_pagination(&self) -> Pagination {
        let parse = |value: &Option<String>| -> Option<i64> {
            value.as_deref().and_then(|v| v.trim().parse().ok())
        };
        Pagination::new(parse(&self.page), parse(&self.page_size))
    }
}
