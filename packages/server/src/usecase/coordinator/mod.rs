//! Room broadcast coordinator.
//!
//! The coordinator is a single tokio task that owns every in-memory [`Room`].
//! Join, leave and message events reach it through one bounded queue and are
//! processed one at a time, so room state needs no locks.
//!
//! Nothing inside the loop awaits storage. Hydrating a room runs as a spawned
//! task that reports back through the same queue as a `Hydrated` event.
//! Messages are handed to a single persistence writer in processing order,
//! so storage sees them in the same order as the room history.

mod event;

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::domain::{
    ChatMessage, GatewayError, Member, MemberId, PersistenceGateway, Room, RoomId, RoomMetadata,
    SessionId, replay_history,
};
use crate::usecase::error::JoinError;

pub use event::{CoordinatorHandle, JoinSession, RoomSnapshot};
pub(crate) use event::{CoordinatorEvent, HydrationResult};

/// Tunables of the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Recent messages kept per room for replay.
    pub history_capacity: usize,
    /// Capacity of the coordinator's event queue.
    pub event_queue_capacity: usize,
    /// How long a room may stay without members before it is dropped from memory.
    /// `None` keeps rooms until the process exits.
    pub room_idle_ttl: Option<Duration>,
    /// How often idle rooms are looked for.
    pub idle_sweep_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            event_queue_capacity: 1024,
            room_idle_ttl: Some(Duration::from_secs(600)),
            idle_sweep_interval: Duration::from_secs(30),
        }
    }
}

struct PendingJoin {
    session: JoinSession,
    reply: oneshot::Sender<Result<(), JoinError>>,
}

struct LiveRoom {
    room: Room,
    empty_since: Option<Instant>,
}

impl LiveRoom {
    fn new(room: Room) -> Self {
        let empty_since = room.is_empty().then(Instant::now);
        Self { room, empty_since }
    }

    fn mark_if_empty(&mut self) {
        if self.room.is_empty() {
            self.empty_since.get_or_insert_with(Instant::now);
        }
    }
}

enum RoomSlot {
    /// Waiting for storage; joins are parked in arrival order.
    Hydrating(Vec<PendingJoin>),
    Live(LiveRoom),
}

/// Start the coordinator task.
///
/// The task ends when every [`CoordinatorHandle`] is dropped or `shutdown` is
/// cancelled; either way all remaining mailboxes are closed on exit, and the
/// task completes only after every accepted message has reached storage.
pub fn spawn_coordinator(
    config: CoordinatorConfig,
    gateway: Arc<dyn PersistenceGateway>,
    shutdown: CancellationToken,
) -> (CoordinatorHandle, JoinHandle<()>) {
    let (events_tx, events_rx) = mpsc::channel(config.event_queue_capacity.max(1));
    let (persist_tx, persist_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(run_persistence_writer(Arc::clone(&gateway), persist_rx));
    let coordinator = Coordinator {
        config,
        gateway,
        rooms: HashMap::new(),
        loopback: events_tx.downgrade(),
        events: events_rx,
        persist: persist_tx,
        shutdown,
    };
    let task = tokio::spawn(async move {
        coordinator.run().await;
        // the writer drains what is queued once the coordinator drops its sender
        if let Err(e) = writer.await {
            tracing::error!("Persistence writer task failed: {}", e);
        }
    });
    (CoordinatorHandle::new(events_tx), task)
}

struct Coordinator {
    config: CoordinatorConfig,
    gateway: Arc<dyn PersistenceGateway>,
    rooms: HashMap<RoomId, RoomSlot>,
    /// Weak so that the coordinator does not keep its own queue open.
    loopback: mpsc::WeakSender<CoordinatorEvent>,
    events: mpsc::Receiver<CoordinatorEvent>,
    /// Unbounded so that a slow store never stalls the loop.
    persist: mpsc::UnboundedSender<Arc<ChatMessage>>,
    shutdown: CancellationToken,
}

impl Coordinator {
    async fn run(mut self) {
        tracing::info!("Broadcast coordinator started");

        let mut sweep = tokio::time::interval(self.config.idle_sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Broadcast coordinator received shutdown signal");
                    break;
                }
                event = self.events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                _ = sweep.tick() => self.sweep_idle_rooms(Instant::now()),
            }
        }

        let closed: usize = self
            .rooms
            .values_mut()
            .map(|slot| match slot {
                RoomSlot::Live(live) => live.room.clear_members(),
                RoomSlot::Hydrating(_) => 0,
            })
            .sum();
        tracing::info!(
            "Broadcast coordinator stopped ({} rooms, {} sessions closed)",
            self.rooms.len(),
            closed
        );
    }

    fn handle(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Join { session, reply } => self.on_join(session, reply),
            CoordinatorEvent::Leave {
                room_id,
                member_id,
                session_id,
            } => self.on_leave(room_id, member_id, session_id),
            CoordinatorEvent::Message(message) => self.on_message(message),
            CoordinatorEvent::Preload(metadata) => self.on_preload(metadata),
            CoordinatorEvent::Snapshot { room_id, reply } => {
                let snapshot = match self.rooms.get(&room_id) {
                    Some(RoomSlot::Live(live)) => Some(RoomSnapshot {
                        metadata: live.room.metadata.clone(),
                        members: live.room.active_members(),
                        history: live.room.history_snapshot(),
                    }),
                    _ => None,
                };
                let _ = reply.send(snapshot);
            }
            CoordinatorEvent::Hydrated { room_id, result } => self.on_hydrated(room_id, result),
        }
    }

    fn on_join(&mut self, session: JoinSession, reply: oneshot::Sender<Result<(), JoinError>>) {
        let room_id = session.room_id;
        match self.rooms.get_mut(&room_id) {
            Some(RoomSlot::Live(live)) => {
                admit(live, session);
                let _ = reply.send(Ok(()));
            }
            Some(RoomSlot::Hydrating(pending)) => {
                tracing::debug!(
                    "Room '{}' is hydrating; parking join of session '{}'",
                    room_id,
                    session.session_id
                );
                pending.push(PendingJoin { session, reply });
            }
            None => {
                let Some(loopback) = self.loopback.upgrade() else {
                    let _ = reply.send(Err(JoinError::CoordinatorUnavailable));
                    return;
                };
                self.rooms.insert(
                    room_id,
                    RoomSlot::Hydrating(vec![PendingJoin { session, reply }]),
                );
                spawn_hydration(
                    Arc::clone(&self.gateway),
                    room_id,
                    self.config.history_capacity,
                    loopback,
                );
            }
        }
    }

    fn on_hydrated(&mut self, room_id: RoomId, result: HydrationResult) {
        let pending = match self.rooms.remove(&room_id) {
            Some(RoomSlot::Hydrating(pending)) => pending,
            Some(live) => {
                tracing::warn!("Ignoring hydration result for live room '{}'", room_id);
                self.rooms.insert(room_id, live);
                return;
            }
            None => return,
        };

        match result {
            Ok((metadata, messages)) => {
                tracing::info!(
                    "Room '{}' hydrated with {} messages",
                    room_id,
                    messages.len()
                );
                let mut live = LiveRoom::new(Room::hydrate(
                    metadata,
                    self.config.history_capacity,
                    messages,
                ));
                for PendingJoin { session, reply } in pending {
                    admit(&mut live, session);
                    let _ = reply.send(Ok(()));
                }
                live.mark_if_empty();
                self.rooms.insert(room_id, RoomSlot::Live(live));
            }
            Err(GatewayError::NotFound) => {
                tracing::info!(
                    "Room '{}' not found in storage; rejecting {} join(s)",
                    room_id,
                    pending.len()
                );
                for PendingJoin { reply, .. } in pending {
                    let _ = reply.send(Err(JoinError::RoomNotFound));
                }
            }
            Err(e) => {
                tracing::error!("Failed to hydrate room '{}': {}", room_id, e);
                for PendingJoin { reply, .. } in pending {
                    let _ = reply.send(Err(JoinError::Persistence(e.to_string())));
                }
            }
        }
    }

    fn on_leave(&mut self, room_id: RoomId, member_id: MemberId, session_id: SessionId) {
        match self.rooms.get_mut(&room_id) {
            Some(RoomSlot::Live(live)) => {
                if live.room.unregister(&member_id, &session_id).is_some() {
                    tracing::info!(
                        "Member '{}' left room '{}' ({} remaining)",
                        member_id,
                        room_id,
                        live.room.member_count()
                    );
                    live.mark_if_empty();
                } else {
                    tracing::debug!(
                        "Leave for unregistered session '{}' in room '{}' ignored",
                        session_id,
                        room_id
                    );
                }
            }
            Some(RoomSlot::Hydrating(pending)) => {
                pending.retain(|p| p.session.session_id != session_id);
            }
            None => {
                tracing::debug!("Leave for unknown room '{}' ignored", room_id);
            }
        }
    }

    fn on_message(&mut self, message: ChatMessage) {
        let Some(RoomSlot::Live(live)) = self.rooms.get_mut(&message.room_id) else {
            tracing::debug!(
                "Dropping message '{}' for room '{}' which is not live",
                message.id,
                message.room_id
            );
            return;
        };

        let message = Arc::new(message);
        live.room.push_message(Arc::clone(&message));
        if self.persist.send(Arc::clone(&message)).is_err() {
            tracing::error!(
                "Persistence writer is gone; message '{}' in room '{}' will not be stored",
                message.id,
                message.room_id
            );
        }

        let outcome = live.room.fan_out(&message);
        for eviction in &outcome.evicted {
            tracing::warn!(
                "Evicted member '{}' (session '{}') from room '{}': {}",
                eviction.member_id,
                eviction.session_id,
                message.room_id,
                eviction.reason
            );
        }
        live.mark_if_empty();
        tracing::debug!(
            "Message '{}' fanned out to {} member(s) in room '{}'",
            message.id,
            outcome.delivered,
            message.room_id
        );
    }

    fn on_preload(&mut self, metadata: RoomMetadata) {
        let room_id = metadata.id;
        if self.rooms.contains_key(&room_id) {
            return;
        }
        tracing::debug!("Room '{}' preloaded", room_id);
        self.rooms.insert(
            room_id,
            RoomSlot::Live(LiveRoom::new(Room::new(
                metadata,
                self.config.history_capacity,
            ))),
        );
    }

    fn sweep_idle_rooms(&mut self, now: Instant) {
        let Some(ttl) = self.config.room_idle_ttl else {
            return;
        };
        self.rooms.retain(|room_id, slot| match slot {
            RoomSlot::Live(LiveRoom {
                room,
                empty_since: Some(since),
            }) if room.is_empty() && now.duration_since(*since) >= ttl => {
                tracing::info!("Reclaiming idle room '{}'", room_id);
                false
            }
            _ => true,
        });
    }
}

/// Register a session in a live room and replay its history.
///
/// Replay finishes before the coordinator handles the next event, so live
/// messages always land after the history.
fn admit(live: &mut LiveRoom, session: JoinSession) {
    let JoinSession {
        session_id,
        member_id,
        display_name,
        room_id,
        mailbox,
    } = session;

    let member = Member::new(session_id, display_name, mailbox);
    let weak_mailbox = member.downgrade_mailbox();
    if let Some(displaced) = live.room.register(member_id, member) {
        tracing::info!(
            "Member '{}' re-joined room '{}'; closing previous session '{}'",
            member_id,
            room_id,
            displaced.session_id
        );
    }
    live.empty_since = None;
    tracing::info!(
        "Session '{}' of member '{}' joined room '{}' ({} member(s))",
        session_id,
        member_id,
        room_id,
        live.room.member_count()
    );

    let history = live.room.history_snapshot();
    if history.is_empty() {
        return;
    }
    let replayed = replay_history(&weak_mailbox, &history);
    if replayed < history.len() {
        tracing::warn!(
            "Replay to session '{}' stopped after {}/{} messages",
            session_id,
            replayed,
            history.len()
        );
    } else {
        tracing::debug!("Replayed {} messages to session '{}'", replayed, session_id);
    }
}

fn spawn_hydration(
    gateway: Arc<dyn PersistenceGateway>,
    room_id: RoomId,
    limit: usize,
    loopback: mpsc::Sender<CoordinatorEvent>,
) {
    tokio::spawn(async move {
        let result = async {
            let metadata = gateway.get_room(&room_id).await?;
            let messages = gateway.get_recent_messages(&room_id, limit).await?;
            Ok::<_, GatewayError>((metadata, messages))
        }
        .await;
        if loopback
            .send(CoordinatorEvent::Hydrated { room_id, result })
            .await
            .is_err()
        {
            tracing::debug!("Coordinator gone before room '{}' was hydrated", room_id);
        }
    });
}

/// Stores messages one at a time in the order the coordinator handed them over.
///
/// Failures are logged and never retried. Ends once the queue is closed and drained.
async fn run_persistence_writer(
    gateway: Arc<dyn PersistenceGateway>,
    mut queue: mpsc::UnboundedReceiver<Arc<ChatMessage>>,
) {
    while let Some(message) = queue.recv().await {
        match gateway.create_message(&message).await {
            Ok(_) => tracing::debug!("Persisted message '{}'", message.id),
            Err(e) => tracing::error!(
                "Persistence failure for message '{}' in room '{}': {}",
                message.id,
                message.room_id,
                e
            ),
        }
    }
    tracing::debug!("Persistence writer stopped");
}
