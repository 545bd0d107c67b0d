//! InMemory ストア実装
//!
//! ドメイン層が定義する `PersistenceGateway` / `RoomRepository` / `UserRepository` の
//! 具体的な実装。HashMap をインメモリ DB として使用します。
//!
//! プロセスが終了するとデータは失われます。
//! PostgreSQL などの DBMS を使う場合は、同じ trait を実装した別の Repository を用意します。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use hiroba_shared::time::{Clock, SystemClock};
use tokio::sync::Mutex;

use crate::domain::{
    ChatMessage, DisplayName, GatewayError, MemberId, PersistenceGateway, RoomId, RoomMetadata,
    RoomName, RoomRepository, Timestamp, User, UserRepository,
};

#[derive(Default)]
struct Tables {
    users: HashMap<MemberId, User>,
    rooms: HashMap<RoomId, RoomMetadata>,
    /// 作成順の Room ID
    room_order: Vec<RoomId>,
    /// Room ごとのメッセージ（保存順 = 古い順）
    messages: HashMap<RoomId, Vec<ChatMessage>>,
}

/// インメモリストア
///
/// 1 つのインスタンスを 3 つの trait として共有して使う。
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    /// システム時計を使うストアを作成
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// 作成日時に使う時計を指定してストアを作成
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock,
        }
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    /// 保存済みメッセージ数
    #[cfg(test)]
    pub async fn count_messages(&self, room_id: &RoomId) -> usize {
        let tables = self.tables.lock().await;
        tables.messages.get(room_id).map_or(0, Vec::len)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryStore {
    async fn get_room(&self, room_id: &RoomId) -> Result<RoomMetadata, GatewayError> {
        let tables = self.tables.lock().await;
        tables
            .rooms
            .get(room_id)
            .cloned()
            .ok_or(GatewayError::NotFound)
    }

    async fn get_recent_messages(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, GatewayError> {
        let tables = self.tables.lock().await;
        if !tables.rooms.contains_key(room_id) {
            return Err(GatewayError::NotFound);
        }
        let messages = tables.messages.get(room_id).map_or(&[][..], Vec::as_slice);
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    async fn create_message(&self, message: &ChatMessage) -> Result<ChatMessage, GatewayError> {
        let mut tables = self.tables.lock().await;
        if !tables.rooms.contains_key(&message.room_id) {
            return Err(GatewayError::NotFound);
        }
        tables
            .messages
            .entry(message.room_id)
            .or_default()
            .push(message.clone());
        Ok(message.clone())
    }
}

#[async_trait]
impl RoomRepository for InMemoryStore {
    async fn create_room(
        &self,
        name: RoomName,
        creator_id: MemberId,
    ) -> Result<RoomMetadata, GatewayError> {
        let room = RoomMetadata {
            id: RoomId::generate(),
            name,
            creator_id,
            created_at: self.now(),
        };
        let mut tables = self.tables.lock().await;
        tables.rooms.insert(room.id, room.clone());
        tables.room_order.push(room.id);
        Ok(room)
    }

    async fn list_rooms(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RoomMetadata>, GatewayError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .room_order
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .filter_map(|id| tables.rooms.get(id).cloned())
            .collect())
    }

    async fn get_room(&self, room_id: &RoomId) -> Result<RoomMetadata, GatewayError> {
        PersistenceGateway::get_room(self, room_id).await
    }

    async fn list_messages(
        &self,
        room_id: &RoomId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ChatMessage>, GatewayError> {
        let tables = self.tables.lock().await;
        if !tables.rooms.contains_key(room_id) {
            return Err(GatewayError::NotFound);
        }
        Ok(tables
            .messages
            .get(room_id)
            .map(|messages| {
                messages
                    .iter()
                    .rev()
                    .skip(offset)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, username: DisplayName) -> Result<User, GatewayError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.username == username) {
            return Err(GatewayError::AlreadyExists);
        }
        let user = User {
            id: MemberId::generate(),
            username,
            created_at: self.now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, member_id: &MemberId) -> Result<User, GatewayError> {
        let tables = self.tables.lock().await;
        tables
            .users
            .get(member_id)
            .cloned()
            .ok_or(GatewayError::NotFound)
    }
}
