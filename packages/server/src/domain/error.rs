//! Domain errors.

use thiserror::Error;

/// 値オブジェクトの検証エラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueObjectError {
    #[error("invalid {kind} id: '{value}'")]
    InvalidId { kind: &'static str, value: String },

    #[error("display name must not be empty")]
    EmptyDisplayName,

    #[error("display name cannot exceed {max} characters (got {actual})")]
    DisplayNameTooLong { max: usize, actual: usize },

    #[error("room name must not be empty")]
    EmptyRoomName,

    #[error("room name cannot exceed {max} characters (got {actual})")]
    RoomNameTooLong { max: usize, actual: usize },

    #[error("message content must not be empty")]
    EmptyContent,

    #[error("message content has exceeded its limit of {max} characters (got {actual})")]
    ContentTooLong { max: usize, actual: usize },
}

/// 永続化層（Persistence Gateway / Repository）のエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// メールボックスへの配送失敗
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// メールボックスが満杯（メンバーの読み出しが追いついていない）
    #[error("member is unresponsive (mailbox full)")]
    MemberUnresponsive,

    /// 受信側（セッション）が既に終了している
    #[error("mailbox closed")]
    MailboxClosed,
}
