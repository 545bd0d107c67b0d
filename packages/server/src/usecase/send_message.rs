//! UseCase: メッセージ送信処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SendMessageUseCase::execute() メソッド
//! - 受信したフレームの正規化・検証と、コーディネーターへの投入
//!
//! ### なぜこのテストが必要か
//! - 空のフレームや長すぎる本文がコーディネーターに入らないことを保証する
//! - 改行を含むフレームが 1 行に正規化されることを確認する
//!
//! ### どのような状況を想定しているか
//! - 正常系：メッセージが他のメンバーに届く
//! - 異常系：空白だけのフレーム、本文の上限超過

use std::sync::Arc;

use hiroba_shared::time::Clock;

use crate::domain::{ChatMessage, MessageContent, MessageId, Timestamp};

use super::{coordinator::CoordinatorHandle, error::SendMessageError, join_room::SessionIdentity};

/// メッセージ送信のユースケース
pub struct SendMessageUseCase {
    coordinator: CoordinatorHandle,
    /// メッセージの作成日時に使う時計
    clock: Arc<dyn Clock>,
}

impl SendMessageUseCase {
    /// 新しい SendMessageUseCase を作成
    pub fn new(coordinator: CoordinatorHandle, clock: Arc<dyn Clock>) -> Self {
        Self { coordinator, clock }
    }

    /// メッセージ送信を実行
    ///
    /// # Arguments
    ///
    /// * `sender` - 送信元セッション
    /// * `frame` - クライアントから受信したテキストフレーム（未加工）
    ///
    /// # Returns
    ///
    /// * `Ok(MessageId)` - コーディネーターに投入したメッセージの ID
    /// * `Err(SendMessageError)` - 本文が不正、またはコーディネーターが停止している
    pub async fn execute(
        &self,
        sender: &SessionIdentity,
        frame: &str,
    ) -> Result<MessageId, SendMessageError> {
        let content = MessageContent::from_frame(frame)?;
        let message = ChatMessage::new(
            sender.room_id,
            sender.member_id,
            sender.display_name.clone(),
            content,
            Timestamp::new(self.clock.now_millis()),
        );
        let message_id = message.id;

        self.coordinator.submit_message(message).await?;

        Ok(message_id)
    }
}
