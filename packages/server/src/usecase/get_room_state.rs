//! UseCase: メモリ上の Room の状態取得
//!
//! 永続化層ではなく、コーディネーターが持つ live な Room を参照します。

use crate::domain::{ActiveMember, RoomId};

use super::{
    coordinator::{CoordinatorHandle, RoomSnapshot},
    error::QueryError,
};

/// 接続中のメンバー一覧取得のユースケース
pub struct GetActiveMembersUseCase {
    coordinator: CoordinatorHandle,
}

impl GetActiveMembersUseCase {
    pub fn new(coordinator: CoordinatorHandle) -> Self {
        Self { coordinator }
    }

    /// 表示名順のメンバー一覧を返す
    ///
    /// Room がメモリ上にない（誰も参加していない、または回収済み）場合は `NotFound`。
    pub async fn execute(&self, room_id: RoomId) -> Result<Vec<ActiveMember>, QueryError> {
        self.coordinator
            .snapshot(room_id)
            .await?
            .map(|snapshot| snapshot.members)
            .ok_or(QueryError::NotFound)
    }
}

/// Room の状態（メンバー・履歴）取得のユースケース（デバッグ用）
pub struct GetRoomStateUseCase {
    coordinator: CoordinatorHandle,
}

impl GetRoomStateUseCase {
    pub fn new(coordinator: CoordinatorHandle) -> Self {
        Self { coordinator }
    }

    pub async fn execute(&self, room_id: RoomId) -> Result<RoomSnapshot, QueryError> {
        self.coordinator
            .snapshot(room_id)
            .await?
            .ok_or(QueryError::NotFound)
    }
}
