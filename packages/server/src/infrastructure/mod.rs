//! Infrastructure layer.
//!
//! - `repository`: ドメイン層の永続化 trait の実装
//! - `dto`: WebSocket / HTTP のデータ転送オブジェクトと変換

pub mod dto;
pub mod repository;
