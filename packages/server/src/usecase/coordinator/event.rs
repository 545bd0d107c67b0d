//! Coordinator events and the handle used to submit them.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::domain::{
    ActiveMember, ChatMessage, DisplayName, GatewayError, Mailbox, MemberId, RoomId,
    RoomMetadata, SessionId,
};
use crate::usecase::error::{CoordinatorUnavailable, JoinError};

/// A session asking to be registered in a room.
#[derive(Debug)]
pub struct JoinSession {
    pub session_id: SessionId,
    pub member_id: MemberId,
    pub display_name: DisplayName,
    pub room_id: RoomId,
    pub mailbox: Mailbox,
}

/// Point-in-time view of a live room.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub metadata: RoomMetadata,
    pub members: Vec<ActiveMember>,
    pub history: Vec<Arc<ChatMessage>>,
}

pub(crate) type HydrationResult = Result<(RoomMetadata, Vec<ChatMessage>), GatewayError>;

/// Everything the coordinator loop consumes, one at a time, in arrival order.
#[derive(Debug)]
pub(crate) enum CoordinatorEvent {
    Join {
        session: JoinSession,
        reply: oneshot::Sender<Result<(), JoinError>>,
    },
    Leave {
        room_id: RoomId,
        member_id: MemberId,
        session_id: SessionId,
    },
    Message(ChatMessage),
    Preload(RoomMetadata),
    Snapshot {
        room_id: RoomId,
        reply: oneshot::Sender<Option<RoomSnapshot>>,
    },
    Hydrated {
        room_id: RoomId,
        result: HydrationResult,
    },
}

/// Cloneable sender side of the coordinator's event queue.
///
/// The coordinator stops once every handle has been dropped.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    events: mpsc::Sender<CoordinatorEvent>,
}

impl CoordinatorHandle {
    pub(crate) fn new(events: mpsc::Sender<CoordinatorEvent>) -> Self {
        Self { events }
    }

    async fn submit(&self, event: CoordinatorEvent) -> Result<(), CoordinatorUnavailable> {
        self.events
            .send(event)
            .await
            .map_err(|_| CoordinatorUnavailable)
    }

    /// Register a session and wait until the coordinator has accepted or rejected it.
    pub async fn join(&self, session: JoinSession) -> Result<(), JoinError> {
        let (reply, response) = oneshot::channel();
        self.submit(CoordinatorEvent::Join { session, reply }).await?;
        response.await.map_err(|_| JoinError::CoordinatorUnavailable)?
    }

    pub async fn leave(
        &self,
        room_id: RoomId,
        member_id: MemberId,
        session_id: SessionId,
    ) -> Result<(), CoordinatorUnavailable> {
        self.submit(CoordinatorEvent::Leave {
            room_id,
            member_id,
            session_id,
        })
        .await
    }

    pub async fn submit_message(&self, message: ChatMessage) -> Result<(), CoordinatorUnavailable> {
        self.submit(CoordinatorEvent::Message(message)).await
    }

    /// Create the in-memory room eagerly (used right after a room is created in storage).
    pub async fn preload(&self, metadata: RoomMetadata) -> Result<(), CoordinatorUnavailable> {
        self.submit(CoordinatorEvent::Preload(metadata)).await
    }

    /// `None` when the room is not live in memory.
    pub async fn snapshot(
        &self,
        room_id: RoomId,
    ) -> Result<Option<RoomSnapshot>, CoordinatorUnavailable> {
        let (reply, response) = oneshot::channel();
        self.submit(CoordinatorEvent::Snapshot { room_id, reply })
            .await?;
        response.await.map_err(|_| CoordinatorUnavailable)
    }
}
