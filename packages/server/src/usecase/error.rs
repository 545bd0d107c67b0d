//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::{GatewayError, ValueObjectError};

/// コーディネーターのタスクが停止している
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("broadcast coordinator is not running")]
pub struct CoordinatorUnavailable;

/// Room への参加エラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JoinError {
    /// 永続化層に Room が存在しない（セッションは登録されず、接続を閉じる）
    #[error("room not found")]
    RoomNotFound,

    /// Room の復元中に永続化層でエラーが発生した
    #[error("failed to load room: {0}")]
    Persistence(String),

    #[error("broadcast coordinator is not running")]
    CoordinatorUnavailable,
}

impl From<CoordinatorUnavailable> for JoinError {
    fn from(_: CoordinatorUnavailable) -> Self {
        Self::CoordinatorUnavailable
    }
}

/// メッセージ送信エラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendMessageError {
    /// 空・長すぎるなど、本文として受け付けられないフレーム
    #[error("invalid message content: {0}")]
    InvalidContent(#[from] ValueObjectError),

    #[error("broadcast coordinator is not running")]
    CoordinatorUnavailable,
}

impl From<CoordinatorUnavailable> for SendMessageError {
    fn from(_: CoordinatorUnavailable) -> Self {
        Self::CoordinatorUnavailable
    }
}

/// Room 作成エラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CreateRoomError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValueObjectError),

    #[error("creator not found")]
    CreatorNotFound,

    #[error("persistence error: {0}")]
    Persistence(GatewayError),
}

/// ユーザー作成エラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CreateUserError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValueObjectError),

    #[error("username already taken")]
    UsernameTaken,

    #[error("persistence error: {0}")]
    Persistence(GatewayError),
}

/// 参照系ユースケースのエラー
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("not found")]
    NotFound,

    #[error("persistence error: {0}")]
    Persistence(GatewayError),

    #[error("broadcast coordinator is not running")]
    CoordinatorUnavailable,
}

impl From<GatewayError> for QueryError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::NotFound => Self::NotFound,
            other => Self::Persistence(other),
        }
    }
}

impl From<CoordinatorUnavailable> for QueryError {
    fn from(_: CoordinatorUnavailable) -> Self {
        Self::CoordinatorUnavailable
    }
}
