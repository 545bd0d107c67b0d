//! UseCase: Room のメッセージ一覧取得

use std::sync::Arc;

use crate::domain::{ChatMessage, RoomId, RoomRepository};

use super::{error::QueryError, pagination::Pagination};

/// 永続化済みメッセージを新しい順にページングして返すユースケース
pub struct GetRoomMessagesUseCase {
    repository: Arc<dyn RoomRepository>,
}

impl GetRoomMessagesUseCase {
    pub fn new(repository: Arc<dyn RoomRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(
        &self,
        room_id: RoomId,
        pagination: Pagination,
    ) -> Result<Vec<ChatMessage>, QueryError> {
        Ok(self
            .repository
            .list_messages(&room_id, pagination.limit(), pagination.offset())
            .await?)
    }
}
