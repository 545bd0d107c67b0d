//! Conversion logic between DTOs and domain entities.
//!
//! 変換は Domain → DTO の一方向のみ。リクエスト DTO からの変換は値オブジェクトの
//! 検証を伴うため、ハンドラが UseCase を呼ぶ前に行います。

use hiroba_shared::time::timestamp_to_rfc3339;

use crate::domain::{ActiveMember, ChatMessage, RoomMetadata, User};
use crate::infrastructure::dto::{http, websocket};
use crate::usecase::RoomSnapshot;

impl From<&ChatMessage> for websocket::ChatMessageFrame {
    fn from(model: &ChatMessage) -> Self {
        Self {
            r#type: websocket::MessageType::ChatMessage,
            id: model.id.to_string(),
            room_id: model.room_id.to_string(),
            sender_id: model.sender_id.to_string(),
            sender_username: model.sender_name.as_str().to_string(),
            content: model.content.as_str().to_string(),
            created_at: timestamp_to_rfc3339(model.created_at.value()),
        }
    }
}

impl From<&ChatMessage> for http::MessageDto {
    fn from(model: &ChatMessage) -> Self {
        Self {
            id: model.id.to_string(),
            room_id: model.room_id.to_string(),
            sender_id: model.sender_id.to_string(),
            sender_username: model.sender_name.as_str().to_string(),
            content: model.content.as_str().to_string(),
            created_at: timestamp_to_rfc3339(model.created_at.value()),
        }
    }
}

impl From<RoomMetadata> for http::RoomDto {
    fn from(model: RoomMetadata) -> Self {
        Self {
            id: model.id.to_string(),
            name: model.name.into(),
            creator_id: model.creator_id.to_string(),
            created_at: timestamp_to_rfc3339(model.created_at.value()),
        }
    }
}

impl From<User> for http::UserDto {
    fn from(model: User) -> Self {
        Self {
            id: model.id.to_string(),
            username: model.username.into_string(),
            created_at: timestamp_to_rfc3339(model.created_at.value()),
        }
    }
}

impl From<ActiveMember> for http::ActiveMemberDto {
    fn from(model: ActiveMember) -> Self {
        Self {
            id: model.member_id.to_string(),
            username: model.display_name.into_string(),
        }
    }
}

impl From<RoomSnapshot> for http::RoomStateDto {
    fn from(snapshot: RoomSnapshot) -> Self {
        Self {
            room: snapshot.metadata.into(),
            members: snapshot.members.into_iter().map(Into::into).collect(),
            history: snapshot
                .history
                .iter()
                .map(|message| http::MessageDto::from(message.as_ref()))
                .collect(),
        }
    }
}
