//! Repository trait 定義
//!
//! ドメイン層・UseCase 層が必要とする永続化のインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! - `PersistenceGateway`: ブロードキャストコーディネーターが使う（Room の復元、メッセージの保存）
//! - `RoomRepository` / `UserRepository`: HTTP API が使う CRUD

use async_trait::async_trait;

use super::{
    ChatMessage, DisplayName, GatewayError, MemberId, RoomId, RoomMetadata, RoomName, User,
};

/// コーディネーターから見た永続化層
///
/// `create_message` はコーディネーターから fire-and-forget で呼ばれる。
/// 完了や失敗がブロードキャストの経路に影響することはない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Room のメタデータを取得（存在しなければ `GatewayError::NotFound`）
    async fn get_room(&self, room_id: &RoomId) -> Result<RoomMetadata, GatewayError>;

    /// 直近 `limit` 件のメッセージを古い順に取得
    async fn get_recent_messages(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, GatewayError>;

    /// メッセージを保存し、保存されたメッセージを返す
    async fn create_message(&self, message: &ChatMessage) -> Result<ChatMessage, GatewayError>;
}

/// Room の CRUD
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn create_room(
        &self,
        name: RoomName,
        creator_id: MemberId,
    ) -> Result<RoomMetadata, GatewayError>;

    /// Room 一覧（新しい順）
    async fn list_rooms(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RoomMetadata>, GatewayError>;

    async fn get_room(&self, room_id: &RoomId) -> Result<RoomMetadata, GatewayError>;

    /// Room のメッセージ一覧（新しい順）
    async fn list_messages(
        &self,
        room_id: &RoomId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ChatMessage>, GatewayError>;
}

/// User の CRUD
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// ユーザーを作成（ユーザー名が重複していれば `GatewayError::AlreadyExists`）
    async fn create_user(&self, username: DisplayName) -> Result<User, GatewayError>;

    async fn get_user(&self, member_id: &MemberId) -> Result<User, GatewayError>;
}
