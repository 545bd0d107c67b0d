//! Dependency wiring.

use std::sync::Arc;

use hiroba_shared::time::SystemClock;
use tokio::task::JoinHandle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::ServerConfig,
    infrastructure::repository::InMemoryStore,
    ui::{AppState, Server},
    usecase::{
        CreateRoomUseCase, CreateUserUseCase, GetActiveMembersUseCase, GetRoomDetailUseCase,
        GetRoomMessagesUseCase, GetRoomStateUseCase, GetRoomsUseCase, GetUserUseCase,
        JoinRoomUseCase, LeaveRoomUseCase, SendMessageUseCase, spawn_coordinator,
    },
};

/// A wired server plus the coordinator task backing it
pub struct App {
    pub server: Server,
    pub coordinator: JoinHandle<()>,
}

/// Build every layer from the configuration.
///
/// Cancelling `shutdown` stops the HTTP listener, every session and the coordinator.
/// Must be called inside a tokio runtime.
pub fn build(config: &ServerConfig, shutdown: CancellationToken) -> App {
    // Initialize dependencies in order:
    // 1. Store
    // 2. Broadcast coordinator
    // 3. UseCases
    // 4. AppState
    // 5. Server

    // 1. Create Store (in-memory database)
    let store = Arc::new(InMemoryStore::new());

    // 2. Start the broadcast coordinator
    let (coordinator, coordinator_task) =
        spawn_coordinator(config.into(), store.clone(), shutdown.clone());

    // 3. Create UseCases
    let join_room_usecase = Arc::new(JoinRoomUseCase::new(
        coordinator.clone(),
        config.mailbox_capacity,
    ));
    let leave_room_usecase = Arc::new(LeaveRoomUseCase::new(coordinator.clone()));
    let send_message_usecase = Arc::new(SendMessageUseCase::new(
        coordinator.clone(),
        Arc::new(SystemClock),
    ));
    let create_user_usecase = Arc::new(CreateUserUseCase::new(store.clone()));
    let get_user_usecase = Arc::new(GetUserUseCase::new(store.clone()));
    let create_room_usecase = Arc::new(CreateRoomUseCase::new(
        store.clone(),
        store.clone(),
        coordinator.clone(),
    ));
    let get_rooms_usecase = Arc::new(GetRoomsUseCase::new(store.clone()));
    let get_room_detail_usecase = Arc::new(GetRoomDetailUseCase::new(store.clone()));
    let get_room_messages_usecase = Arc::new(GetRoomMessagesUseCase::new(store));
    let get_active_members_usecase = Arc::new(GetActiveMembersUseCase::new(coordinator.clone()));
    let get_room_state_usecase = Arc::new(GetRoomStateUseCase::new(coordinator));

    // 4. Create AppState
    let state = AppState {
        join_room_usecase,
        leave_room_usecase,
        send_message_usecase,
        create_user_usecase,
        get_user_usecase,
        create_room_usecase,
        get_rooms_usecase,
        get_room_detail_usecase,
        get_room_messages_usecase,
        get_active_members_usecase,
        get_room_state_usecase,
        session_config: config.into(),
        max_frame_size: config.max_frame_size,
        sessions: TaskTracker::new(),
        shutdown,
    };

    // 5. Create the server
    App {
        server: Server::new(state, config.shutdown_grace()),
        coordinator: coordinator_task,
    }
}
