//! Domain layer for the chat relay.
//!
//! This module contains business logic that is independent of
//! data transfer objects (DTOs) and infrastructure concerns.

pub mod entity;
pub mod error;
pub mod repository;
pub mod value_object;

pub use entity::{
    ActiveMember, ChatMessage, Eviction, FanoutOutcome, Mailbox, MailboxReceiver, Member, Room,
    RoomMetadata, User, WeakMailbox, mailbox, replay_history,
};
pub use error::{DeliveryError, GatewayError, ValueObjectError};
pub use repository::{PersistenceGateway, RoomRepository, UserRepository};
pub use value_object::{
    DisplayName, MemberId, MessageContent, MessageId, RoomId, RoomName, SessionId, Timestamp,
};

#[cfg(test)]
pub use repository::{MockPersistenceGateway, MockRoomRepository, MockUserRepository};
