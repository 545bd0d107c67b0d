//! Domain entities.
//!
//! `Room` はメンバーの一覧と直近メッセージの履歴を保持し、
//! ファンアウト（送信者以外への配送）とバックプレッシャーのポリシーを実装します。
//! `Room` を変更するのはブロードキャストコーディネーターのタスクだけです。

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use tokio::sync::mpsc::{self, error::TrySendError};

use super::{
    error::DeliveryError,
    value_object::{
        DisplayName, MemberId, MessageContent, MessageId, RoomId, RoomName, SessionId, Timestamp,
    },
};

/// セッションごとの送信待ちメールボックス（送信側）
pub type Mailbox = mpsc::Sender<Arc<ChatMessage>>;
/// メールボックスの受信側（セッションの outbound ループが保持する）
pub type MailboxReceiver = mpsc::Receiver<Arc<ChatMessage>>;
/// メールボックスを生かし続けない参照（履歴のリプレイ用）
pub type WeakMailbox = mpsc::WeakSender<Arc<ChatMessage>>;

/// 容量 `capacity` のメールボックスを作成
pub fn mailbox(capacity: usize) -> (Mailbox, MailboxReceiver) {
    mpsc::channel(capacity.max(1))
}

/// チャットメッセージ（生成後は不変）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: MemberId,
    pub sender_name: DisplayName,
    pub content: MessageContent,
    pub created_at: Timestamp,
}

impl ChatMessage {
    /// 新しい ID を割り当ててメッセージを作成
    pub fn new(
        room_id: RoomId,
        sender_id: MemberId,
        sender_name: DisplayName,
        content: MessageContent,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            room_id,
            sender_id,
            sender_name,
            content,
            created_at,
        }
    }
}

/// 永続化されている Room の情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMetadata {
    pub id: RoomId,
    pub name: RoomName,
    pub creator_id: MemberId,
    pub created_at: Timestamp,
}

/// ユーザー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: MemberId,
    pub username: DisplayName,
    pub created_at: Timestamp,
}

/// Room に現在参加しているメンバーの概要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveMember {
    pub member_id: MemberId,
    pub display_name: DisplayName,
}

/// Room に登録された接続中のメンバー
///
/// コーディネーターはメールボックスの送信側だけを持つ。
/// `Member` を drop するとメールボックスが閉じ、セッションの outbound ループが終了する。
#[derive(Debug)]
pub struct Member {
    pub session_id: SessionId,
    pub display_name: DisplayName,
    mailbox: Mailbox,
}

impl Member {
    pub fn new(session_id: SessionId, display_name: DisplayName, mailbox: Mailbox) -> Self {
        Self {
            session_id,
            display_name,
            mailbox,
        }
    }

    /// ブロックせずにメールボックスへ配送
    pub fn deliver(&self, message: Arc<ChatMessage>) -> Result<(), DeliveryError> {
        self.mailbox.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::MemberUnresponsive,
            TrySendError::Closed(_) => DeliveryError::MailboxClosed,
        })
    }

    pub fn downgrade_mailbox(&self) -> WeakMailbox {
        self.mailbox.downgrade()
    }
}

/// ファンアウトで退出させられたメンバー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub member_id: MemberId,
    pub session_id: SessionId,
    pub reason: DeliveryError,
}

/// ファンアウトの結果
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FanoutOutcome {
    pub delivered: usize,
    pub evicted: Vec<Eviction>,
}

/// メモリ上の Room
#[derive(Debug)]
pub struct Room {
    pub metadata: RoomMetadata,
    history: VecDeque<Arc<ChatMessage>>,
    history_capacity: usize,
    members: HashMap<MemberId, Member>,
}

impl Room {
    /// 履歴が空の Room を作成
    pub fn new(metadata: RoomMetadata, history_capacity: usize) -> Self {
        Self {
            metadata,
            history: VecDeque::with_capacity(history_capacity),
            history_capacity,
            members: HashMap::new(),
        }
    }

    /// 永続化層から読み込んだ履歴（古い順）で Room を復元
    ///
    /// 容量を超える分は古いものから捨てる。
    pub fn hydrate(
        metadata: RoomMetadata,
        history_capacity: usize,
        messages: Vec<ChatMessage>,
    ) -> Self {
        let mut room = Self::new(metadata, history_capacity);
        for message in messages {
            room.push_message(Arc::new(message));
        }
        room
    }

    #[cfg(test)]
    pub fn id(&self) -> RoomId {
        self.metadata.id
    }

    /// メンバーを登録
    ///
    /// 同じメンバー ID が既に登録されていれば置き換え、置き換えられた方を返す。
    pub fn register(&mut self, member_id: MemberId, member: Member) -> Option<Member> {
        self.members.insert(member_id, member)
    }

    /// 指定セッションのメンバーを登録解除
    ///
    /// 登録中のセッション ID と一致しない場合は何もしない。
    pub fn unregister(&mut self, member_id: &MemberId, session_id: &SessionId) -> Option<Member> {
        match self.members.get(member_id) {
            Some(member) if member.session_id == *session_id => self.members.remove(member_id),
            _ => None,
        }
    }

    /// 履歴に追加（容量に達していれば最も古いものを捨てる）
    pub fn push_message(&mut self, message: Arc<ChatMessage>) {
        if self.history_capacity == 0 {
            return;
        }
        while self.history.len() >= self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(message);
    }

    /// 送信者以外の全メンバーへ配送
    ///
    /// メールボックスが満杯・閉じているメンバーはその場で登録解除する。
    /// 登録解除された `Member` は drop され、メールボックスが閉じる。
    pub fn fan_out(&mut self, message: &Arc<ChatMessage>) -> FanoutOutcome {
        let mut outcome = FanoutOutcome::default();
        self.members.retain(|member_id, member| {
            if *member_id == message.sender_id {
                return true;
            }
            match member.deliver(Arc::clone(message)) {
                Ok(()) => {
                    outcome.delivered += 1;
                    true
                }
                Err(reason) => {
                    outcome.evicted.push(Eviction {
                        member_id: *member_id,
                        session_id: member.session_id,
                        reason,
                    });
                    false
                }
            }
        });
        outcome
    }

    /// 履歴のスナップショット（古い順）
    pub fn history_snapshot(&self) -> Vec<Arc<ChatMessage>> {
        self.history.iter().cloned().collect()
    }

    #[cfg(test)]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    #[cfg(test)]
    pub fn member(&self, member_id: &MemberId) -> Option<&Member> {
        self.members.get(member_id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// 参加中メンバーの一覧（表示名順）
    pub fn active_members(&self) -> Vec<ActiveMember> {
        let mut members: Vec<ActiveMember> = self
            .members
            .iter()
            .map(|(member_id, member)| ActiveMember {
                member_id: *member_id,
                display_name: member.display_name.clone(),
            })
            .collect();
        members.sort_by(|a, b| {
            a.display_name
                .as_str()
                .cmp(b.display_name.as_str())
                .then(a.member_id.cmp(&b.member_id))
        });
        members
    }

    /// 全メンバーを登録解除（メールボックスはすべて閉じる）
    pub fn clear_members(&mut self) -> usize {
        let count = self.members.len();
        self.members.clear();
        count
    }
}

/// 履歴を古い順にメールボックスへ流し込む
///
/// 配送はブロックしない。メールボックスが満杯・閉じていればそこで打ち切り、
/// 配送できた件数を返す。
pub fn replay_history(mailbox: &WeakMailbox, history: &[Arc<ChatMessage>]) -> usize {
    let Some(mailbox) = mailbox.upgrade() else {
        return 0;
    };
    let mut replayed = 0;
    for message in history {
        if mailbox.try_send(Arc::clone(message)).is_err() {
            break;
        }
        replayed += 1;
    }
    replayed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> RoomMetadata {
        RoomMetadata {
            id: RoomId::generate(),
            name: RoomName::new("general".to_string()).unwrap(),
            creator_id: MemberId::generate(),
            created_at: Timestamp::new(1000),
        }
    }

    fn name(value: &str) -> DisplayName {
        DisplayName::new(value.to_string()).unwrap()
    }

    fn message(room_id: RoomId, sender_id: MemberId, body: &str) -> Arc<ChatMessage> {
        Arc::new(ChatMessage::new(
            room_id,
            sender_id,
            name("sender"),
            MessageContent::new(body.to_string()).unwrap(),
            Timestamp::new(2000),
        ))
    }

    fn join(room: &mut Room, display_name: &str, capacity: usize) -> (MemberId, MailboxReceiver) {
        let member_id = MemberId::generate();
        let (tx, rx) = mailbox(capacity);
        room.register(
            member_id,
            Member::new(SessionId::generate(), name(display_name), tx),
        );
        (member_id, rx)
    }

    #[test]
    fn test_push_message_evicts_oldest_when_full() {
        // テスト項目: 履歴が容量に達すると最も古いメッセージから捨てられる（FIFO）
        // given (前提条件):
        let mut room = Room::new(metadata(), 3);
        let sender = MemberId::generate();

        // when (操作):
        for body in ["m1", "m2", "m3", "m4"] {
            room.push_message(message(room.id(), sender, body));
        }

        // then (期待する結果):
        let bodies: Vec<String> = room
            .history_snapshot()
            .iter()
            .map(|m| m.content.as_str().to_string())
            .collect();
        assert_eq!(bodies, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_push_message_with_zero_capacity_keeps_nothing() {
        // テスト項目: 容量 0 の Room は履歴を保持しない
        // given (前提条件):
        let mut room = Room::new(metadata(), 0);

        // when (操作):
        room.push_message(message(room.id(), MemberId::generate(), "hello"));

        // then (期待する結果):
        assert_eq!(room.history_len(), 0);
    }

    #[test]
    fn test_hydrate_keeps_most_recent_messages_in_order() {
        // テスト項目: 復元時は直近の容量分だけが時系列順に残る
        // given (前提条件):
        let meta = metadata();
        let sender = MemberId::generate();
        let messages: Vec<ChatMessage> = ["a", "b", "c"]
            .iter()
            .map(|body| (*message(meta.id, sender, body)).clone())
            .collect();

        // when (操作):
        let room = Room::hydrate(meta, 2, messages);

        // then (期待する結果):
        let history = room.history_snapshot();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content.as_str(), "b");
        assert_eq!(history[1].content.as_str(), "c");
    }

    #[test]
    fn test_fan_out_skips_sender() {
        // テスト項目: ファンアウトは送信者以外の全メンバーに届き、送信者には届かない
        // given (前提条件):
        let mut room = Room::new(metadata(), 10);
        let (alice, mut alice_rx) = join(&mut room, "alice", 4);
        let (_bob, mut bob_rx) = join(&mut room, "bob", 4);
        let (_carol, mut carol_rx) = join(&mut room, "carol", 4);

        // when (操作):
        let outcome = room.fan_out(&message(room.id(), alice, "hello"));

        // then (期待する結果):
        assert_eq!(outcome.delivered, 2);
        assert!(outcome.evicted.is_empty());
        assert_eq!(bob_rx.try_recv().unwrap().content.as_str(), "hello");
        assert_eq!(carol_rx.try_recv().unwrap().content.as_str(), "hello");
        assert!(alice_rx.try_recv().is_err());
    }

    #[test]
    fn test_fan_out_evicts_member_with_full_mailbox() {
        // テスト項目: メールボックスが満杯のメンバーは登録解除され、メールボックスが閉じる
        // given (前提条件):
        let mut room = Room::new(metadata(), 10);
        let sender = MemberId::generate();
        let (slow, mut slow_rx) = join(&mut room, "slow", 2);
        let (_fast, mut fast_rx) = join(&mut room, "fast", 8);

        // when (操作): 読み出さずに 3 件配送する
        let first = room.fan_out(&message(room.id(), sender, "1"));
        let second = room.fan_out(&message(room.id(), sender, "2"));
        let third = room.fan_out(&message(room.id(), sender, "3"));

        // then (期待する結果):
        assert_eq!(first.delivered, 2);
        assert_eq!(second.delivered, 2);
        assert_eq!(third.delivered, 1);
        assert_eq!(third.evicted.len(), 1);
        assert_eq!(third.evicted[0].member_id, slow);
        assert_eq!(third.evicted[0].reason, DeliveryError::MemberUnresponsive);
        assert!(room.member(&slow).is_none());

        // 満杯になる前の 2 件は受け取れるが、3 件目は届かずチャネルが閉じている
        assert_eq!(slow_rx.try_recv().unwrap().content.as_str(), "1");
        assert_eq!(slow_rx.try_recv().unwrap().content.as_str(), "2");
        assert_eq!(
            slow_rx.try_recv().unwrap_err(),
            mpsc::error::TryRecvError::Disconnected
        );
        for expected in ["1", "2", "3"] {
            assert_eq!(fast_rx.try_recv().unwrap().content.as_str(), expected);
        }
    }

    #[test]
    fn test_fan_out_removes_member_whose_session_is_gone() {
        // テスト項目: 受信側が終了しているメンバーは MailboxClosed で登録解除される
        // given (前提条件):
        let mut room = Room::new(metadata(), 10);
        let (gone, gone_rx) = join(&mut room, "gone", 2);
        drop(gone_rx);

        // when (操作):
        let outcome = room.fan_out(&message(room.id(), MemberId::generate(), "hi"));

        // then (期待する結果):
        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.evicted[0].member_id, gone);
        assert_eq!(outcome.evicted[0].reason, DeliveryError::MailboxClosed);
        assert!(room.is_empty());
    }

    #[test]
    fn test_unregister_requires_matching_session() {
        // テスト項目: セッション ID が一致しない登録解除は何もしない
        // given (前提条件):
        let mut room = Room::new(metadata(), 10);
        let member_id = MemberId::generate();
        let session_id = SessionId::generate();
        let (tx, _rx) = mailbox(2);
        room.register(member_id, Member::new(session_id, name("alice"), tx));

        // when (操作):
        let stale = room.unregister(&member_id, &SessionId::generate());
        let current = room.unregister(&member_id, &session_id);

        // then (期待する結果):
        assert!(stale.is_none());
        assert!(current.is_some());
        assert!(room.is_empty());
    }

    #[test]
    fn test_register_same_member_returns_displaced_session() {
        // テスト項目: 同じメンバー ID の再登録は前のセッションを置き換えて返す
        // given (前提条件):
        let mut room = Room::new(metadata(), 10);
        let member_id = MemberId::generate();
        let first_session = SessionId::generate();
        let (tx1, _rx1) = mailbox(2);
        let (tx2, _rx2) = mailbox(2);
        room.register(member_id, Member::new(first_session, name("alice"), tx1));

        // when (操作):
        let displaced = room.register(
            member_id,
            Member::new(SessionId::generate(), name("alice"), tx2),
        );

        // then (期待する結果):
        assert_eq!(displaced.map(|m| m.session_id), Some(first_session));
        assert_eq!(room.member_count(), 1);
    }

    #[test]
    fn test_active_members_sorted_by_display_name() {
        // テスト項目: 参加中メンバーは表示名順に並ぶ
        // given (前提条件):
        let mut room = Room::new(metadata(), 10);
        let (_c, _rx_c) = join(&mut room, "charlie", 1);
        let (_a, _rx_a) = join(&mut room, "alice", 1);
        let (_b, _rx_b) = join(&mut room, "bob", 1);

        // when (操作):
        let members = room.active_members();

        // then (期待する結果):
        let names: Vec<&str> = members.iter().map(|m| m.display_name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "charlie"]);
    }

    #[test]
    fn test_replay_history_stops_when_mailbox_full() {
        // テスト項目: リプレイは時系列順に配送し、満杯になった時点で打ち切る
        // given (前提条件):
        let mut room = Room::new(metadata(), 10);
        let sender = MemberId::generate();
        for body in ["a", "b", "c"] {
            room.push_message(message(room.id(), sender, body));
        }
        let (tx, mut rx) = mailbox(2);

        // when (操作):
        let replayed = replay_history(&tx.downgrade(), &room.history_snapshot());

        // then (期待する結果):
        assert_eq!(replayed, 2);
        assert_eq!(rx.try_recv().unwrap().content.as_str(), "a");
        assert_eq!(rx.try_recv().unwrap().content.as_str(), "b");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_replay_history_into_closed_mailbox_is_noop() {
        // テスト項目: 既に閉じたメールボックスへのリプレイは何も配送しない
        // given (前提条件):
        let (tx, _rx) = mailbox(2);
        let weak = tx.downgrade();
        drop(tx);
        let history = vec![message(RoomId::generate(), MemberId::generate(), "a")];

        // when (操作):
        let replayed = replay_history(&weak, &history);

        // then (期待する結果):
        assert_eq!(replayed, 0);
    }
}
