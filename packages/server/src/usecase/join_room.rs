//! UseCase: Room への参加
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - JoinRoomUseCase::execute() メソッド
//! - セッションの登録とメールボックスの受け渡し
//!
//! ### なぜこのテストが必要か
//! - WebSocket ハンドラはここで受け取った SessionTicket だけを頼りに送受信ループを動かす
//! - 存在しない Room への参加が拒否されることを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：参加してチケットを受け取り、他メンバーのメッセージがメールボックスに届く
//! - 異常系：永続化層に存在しない Room

use crate::domain::{DisplayName, MailboxReceiver, MemberId, RoomId, SessionId, mailbox};

use super::{
    coordinator::{CoordinatorHandle, JoinSession},
    error::JoinError,
};

/// 参加リクエスト（接続ハンドラが解決したユーザーと Room）
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub member_id: MemberId,
    pub display_name: DisplayName,
    pub room_id: RoomId,
}

/// 1 つの接続セッションの識別情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub session_id: SessionId,
    pub member_id: MemberId,
    pub display_name: DisplayName,
    pub room_id: RoomId,
}

/// 参加が受理されたセッションに渡されるもの
#[derive(Debug)]
pub struct SessionTicket {
    pub identity: SessionIdentity,
    /// outbound ループが読み出すメールボックス
    pub mailbox: MailboxReceiver,
}

/// Room 参加のユースケース
pub struct JoinRoomUseCase {
    coordinator: CoordinatorHandle,
    /// セッションごとのメールボックス容量
    mailbox_capacity: usize,
}

impl JoinRoomUseCase {
    /// 新しい JoinRoomUseCase を作成
    pub fn new(coordinator: CoordinatorHandle, mailbox_capacity: usize) -> Self {
        Self {
            coordinator,
            mailbox_capacity,
        }
    }

    /// Room への参加を実行
    ///
    /// コーディネーターが参加を受理するまで待つ。受理された時点でセッションは
    /// Room のメンバーとして登録済みで、直近の履歴のリプレイが始まっている。
    ///
    /// # Errors
    ///
    /// * `JoinError::RoomNotFound` - Room が永続化層に存在しない
    /// * `JoinError::Persistence` - Room の復元に失敗した
    /// * `JoinError::CoordinatorUnavailable` - コーディネーターが停止している
    pub async fn execute(&self, request: JoinRequest) -> Result<SessionTicket, JoinError> {
        let (tx, rx) = mailbox(self.mailbox_capacity);
        let identity = SessionIdentity {
            session_id: SessionId::generate(),
            member_id: request.member_id,
            display_name: request.display_name,
            room_id: request.room_id,
        };

        self.coordinator
            .join(JoinSession {
                session_id: identity.session_id,
                member_id: identity.member_id,
                display_name: identity.display_name.clone(),
                room_id: identity.room_id,
                mailbox: tx,
            })
            .await?;

        Ok(SessionTicket {
            identity,
            mailbox: rx,
        })
    }
}
