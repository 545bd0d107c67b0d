//! UseCase: Room 作成
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - CreateRoomUseCase::execute() メソッド
//!
//! ### なぜこのテストが必要か
//! - 作成した Room がすぐに参加可能（コーディネーターに preload 済み）であることを保証する
//! - 作成者が存在しない場合・名前が不正な場合に永続化層へ書き込まないことを確認する
//!
//! ### どのような状況を想定しているか
//! - 正常系：作成と preload
//! - 異常系：作成者不在、名前が空、永続化層の障害

use std::sync::Arc;

use crate::domain::{
    GatewayError, MemberId, RoomMetadata, RoomName, RoomRepository, UserRepository,
};

use super::{coordinator::CoordinatorHandle, error::CreateRoomError};

/// Room 作成のユースケース
pub struct CreateRoomUseCase {
    room_repository: Arc<dyn RoomRepository>,
    user_repository: Arc<dyn UserRepository>,
    coordinator: CoordinatorHandle,
}

impl CreateRoomUseCase {
    /// 新しい CreateRoomUseCase を作成
    pub fn new(
        room_repository: Arc<dyn RoomRepository>,
        user_repository: Arc<dyn UserRepository>,
        coordinator: CoordinatorHandle,
    ) -> Self {
        Self {
            room_repository,
            user_repository,
            coordinator,
        }
    }

    /// Room を作成し、メモリ上にも空の Room を用意する
    pub async fn execute(
        &self,
        name: String,
        creator_id: MemberId,
    ) -> Result<RoomMetadata, CreateRoomError> {
        let name = RoomName::new(name)?;

        self.user_repository
            .get_user(&creator_id)
            .await
            .map_err(|e| match e {
                GatewayError::NotFound => CreateRoomError::CreatorNotFound,
                other => CreateRoomError::Persistence(other),
            })?;

        let room = self
            .room_repository
            .create_room(name, creator_id)
            .await
            .map_err(CreateRoomError::Persistence)?;
        tracing::info!(
            "Room '{}' ({}) created by '{}'",
            room.id,
            room.name.as_str(),
            creator_id
        );

        // preload できなくても、最初の参加時に永続化層から復元される
        if let Err(e) = self.coordinator.preload(room.clone()).await {
            tracing::warn!("Failed to preload room '{}': {}", room.id, e);
        }

        Ok(room)
    }
}
