//! UseCase: Room 一覧・詳細取得

use std::sync::Arc;

use crate::domain::{RoomId, RoomMetadata, RoomRepository};

use super::{error::QueryError, pagination::Pagination};

/// Room 一覧取得のユースケース
pub struct GetRoomsUseCase {
    repository: Arc<dyn RoomRepository>,
}

impl GetRoomsUseCase {
    pub fn new(repository: Arc<dyn RoomRepository>) -> Self {
        Self { repository }
    }

    /// 作成の新しい順に 1 ページ分の Room を返す
    pub async fn execute(&self, pagination: Pagination) -> Result<Vec<RoomMetadata>, QueryError> {
        Ok(self
            .repository
            .list_rooms(pagination.limit(), pagination.offset())
            .await?)
    }
}

/// Room 詳細取得のユースケース
pub struct GetRoomDetailUseCase {
    repository: Arc<dyn RoomRepository>,
}

impl GetRoomDetailUseCase {
    pub fn new(repository: Arc<dyn RoomRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self, room_id: RoomId) -> Result<RoomMetadata, QueryError> {
        Ok(self.repository.get_room(&room_id).await?)
    }
}
