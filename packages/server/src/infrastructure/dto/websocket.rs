//! WebSocket message DTOs.
//!
//! サーバーからクライアントへはテキストフレームで JSON を送ります。
//! クライアントからサーバーへのフレームは JSON ではなく、本文そのものです。

use serde::{Deserialize, Serialize};

/// Message type enum for WebSocket messages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    /// Room 内の誰かが送信したチャットメッセージ（リプレイを含む）
    ChatMessage,
}

/// Chat message frame delivered to room members
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageFrame {
    pub r#type: MessageType,
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub content: String,
    /// RFC 3339 (UTC)
    pub created_at: String,
}

/// Query parameters for WebSocket connection
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectQuery {
    #[serde(alias = "roomId")]
    pub room_id: String,
}
