//! UseCase layer.
//!
//! ビジネスロジックの流れを表現します。Room の状態を持つのはブロードキャスト
//! コーディネーター（`coordinator`）だけで、他のユースケースはコーディネーターの
//! ハンドルか Repository を通して操作します。

pub mod coordinator;
pub mod create_room;
pub mod error;
pub mod get_room_messages;
pub mod get_room_state;
pub mod get_rooms;
pub mod join_room;
pub mod leave_room;
pub mod pagination;
pub mod send_message;
pub mod user;

pub use coordinator::{
    CoordinatorConfig, CoordinatorHandle, JoinSession, RoomSnapshot, spawn_coordinator,
};
pub use create_room::CreateRoomUseCase;
pub use error::{
    CoordinatorUnavailable, CreateRoomError, CreateUserError, JoinError, QueryError,
    SendMessageError,
};
pub use get_room_messages::GetRoomMessagesUseCase;
pub use get_room_state::{GetActiveMembersUseCase, GetRoomStateUseCase};
pub use get_rooms::{GetRoomDetailUseCase, GetRoomsUseCase};
pub use join_room::{JoinRequest, JoinRoomUseCase, SessionIdentity, SessionTicket};
pub use leave_room::LeaveRoomUseCase;
pub use pagination::Pagination;
pub use send_message::SendMessageUseCase;
pub use user::{CreateUserUseCase, GetUserUseCase};
