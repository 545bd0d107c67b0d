//! Server state shared by every handler.

use std::sync::Arc;

use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::usecase::{
    CreateRoomUseCase, CreateUserUseCase, GetActiveMembersUseCase, GetRoomDetailUseCase,
    GetRoomMessagesUseCase, GetRoomStateUseCase, GetRoomsUseCase, GetUserUseCase,
    JoinRoomUseCase, LeaveRoomUseCase, SendMessageUseCase,
};

use super::session::{SessionConfig, SessionDeps};

/// Shared application state
pub struct AppState {
    /// JoinRoomUseCase（Room 参加のユースケース）
    pub join_room_usecase: Arc<JoinRoomUseCase>,
    /// LeaveRoomUseCase（Room 退出のユースケース）
    pub leave_room_usecase: Arc<LeaveRoomUseCase>,
    /// SendMessageUseCase（メッセージ送信のユースケース）
    pub send_message_usecase: Arc<SendMessageUseCase>,
    /// CreateUserUseCase（ユーザー作成のユースケース）
    pub create_user_usecase: Arc<CreateUserUseCase>,
    /// GetUserUseCase（ユーザー取得のユースケース）
    pub get_user_usecase: Arc<GetUserUseCase>,
    /// CreateRoomUseCase（Room 作成のユースケース）
    pub create_room_usecase: Arc<CreateRoomUseCase>,
    /// GetRoomsUseCase（Room 一覧取得のユースケース）
    pub get_rooms_usecase: Arc<GetRoomsUseCase>,
    /// GetRoomDetailUseCase（Room 詳細取得のユースケース）
    pub get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
    /// GetRoomMessagesUseCase（メッセージ一覧取得のユースケース）
    pub get_room_messages_usecase: Arc<GetRoomMessagesUseCase>,
    /// GetActiveMembersUseCase（接続中メンバー取得のユースケース）
    pub get_active_members_usecase: Arc<GetActiveMembersUseCase>,
    /// GetRoomStateUseCase（Room 状態取得のユースケース）
    pub get_room_state_usecase: Arc<GetRoomStateUseCase>,
    /// 接続セッションのタイミング設定
    pub session_config: SessionConfig,
    /// 受信するメッセージ・フレームの最大サイズ（バイト）
    pub max_frame_size: usize,
    /// 実行中の接続セッション
    pub sessions: TaskTracker,
    /// シャットダウンの通知
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            send_message: Arc::clone(&self.send_message_usecase),
            leave_room: Arc::clone(&self.leave_room_usecase),
        }
    }
}
