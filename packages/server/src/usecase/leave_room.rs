//! UseCase: Room からの退出

use super::{coordinator::CoordinatorHandle, error::CoordinatorUnavailable, join_room::SessionIdentity};

/// Room 退出のユースケース
pub struct LeaveRoomUseCase {
    coordinator: CoordinatorHandle,
}

impl LeaveRoomUseCase {
    pub fn new(coordinator: CoordinatorHandle) -> Self {
        Self { coordinator }
    }

    /// セッションの登録解除を依頼する
    ///
    /// 既に退出済み・切り離し済み・別セッションに置き換え済みの場合は何も起きない。
    pub async fn execute(&self, identity: &SessionIdentity) -> Result<(), CoordinatorUnavailable> {
        self.coordinator
            .leave(identity.room_id, identity.member_id, identity.session_id)
            .await
    }
}
