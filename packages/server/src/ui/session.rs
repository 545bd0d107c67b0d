//! Connection session.
//!
//! 1 つの WebSocket 接続を、独立して動く 2 つのループで扱います。
//!
//! - inbound ループ: クライアントからのフレームを読み、メッセージとしてコーディネーターへ投入する
//! - outbound ループ: メールボックスに届いたメッセージをクライアントへ書き込み、定期的に Ping を送る
//!
//! inbound ループが終わった場合は outbound ループに接続を閉じさせ（クローズの応答を送り切る）、
//! outbound ループが終わった場合は inbound ループを中断します。最後に必ず退出（Leave）を通知します。

use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code},
};
use futures_util::{
    sink::{Sink, SinkExt},
    stream::{Stream, StreamExt},
};
use thiserror::Error;
use tokio::time::{Instant, interval_at, timeout, timeout_at};
use tokio_util::sync::CancellationToken;

use crate::{
    domain::MailboxReceiver,
    infrastructure::dto::websocket::ChatMessageFrame,
    usecase::{
        LeaveRoomUseCase, SendMessageError, SendMessageUseCase, SessionIdentity, SessionTicket,
    },
};

/// 接続セッションのタイミング設定
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Ping を送る間隔
    pub ping_interval: Duration,
    /// この時間 Pong が届かなければ接続を切る
    pub pong_timeout: Duration,
    /// 1 回の書き込みの期限
    pub write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// ループが異常終了した理由
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection failure: {0}")]
    ConnectionFailure(#[from] axum::Error),

    #[error("no pong received within {0:?}")]
    IdleTimeout(Duration),

    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// ループが正常終了した理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// クライアントが接続を閉じた
    ClientClosed,
    /// inbound ループが先に終わったため接続を閉じた
    InboundFinished,
    /// メールボックスが閉じた（退出・切り離し・再参加による置き換え）
    MailboxClosed,
    /// サーバーのシャットダウン
    Shutdown,
}

/// 送受信に使うユースケース
#[derive(Clone)]
pub struct SessionDeps {
    pub send_message: Arc<SendMessageUseCase>,
    pub leave_room: Arc<LeaveRoomUseCase>,
}

/// セッションを最後まで実行する
///
/// 参加が受理された直後に呼ばれ、接続が終わるまで戻らない。
pub async fn run(
    socket: WebSocket,
    ticket: SessionTicket,
    deps: SessionDeps,
    config: SessionConfig,
    shutdown: CancellationToken,
) {
    let SessionTicket { identity, mailbox } = ticket;
    let (sender, receiver) = socket.split();
    let inbound_done = CancellationToken::new();
    // closing waits for at most one pending write plus the close itself
    let close_grace = config.write_timeout * 2;

    let mut recv_task = tokio::spawn(inbound_loop(
        receiver,
        identity.clone(),
        Arc::clone(&deps.send_message),
        config.pong_timeout,
    ));
    let mut send_task = tokio::spawn(outbound_loop(
        sender,
        mailbox,
        config,
        shutdown,
        inbound_done.clone(),
    ));

    let (direction, result) = tokio::select! {
        result = &mut recv_task => {
            // let the writer flush the close handshake before the socket is dropped
            inbound_done.cancel();
            match timeout(close_grace, &mut send_task).await {
                Ok(Ok(Err(e))) => tracing::debug!(
                    "Closing session '{}' failed: {}",
                    identity.session_id,
                    e
                ),
                Ok(_) => {}
                Err(_) => send_task.abort(),
            }
            ("inbound", result)
        }
        result = &mut send_task => {
            recv_task.abort();
            ("outbound", result)
        }
    };

    match result {
        Ok(Ok(end)) => tracing::info!(
            "Session '{}' of '{}' ended in {} loop: {:?}",
            identity.session_id,
            identity.display_name,
            direction,
            end
        ),
        Ok(Err(e)) => tracing::warn!(
            "Session '{}' of '{}' failed in {} loop: {}",
            identity.session_id,
            identity.display_name,
            direction,
            e
        ),
        Err(e) => tracing::error!(
            "Session '{}' {} task did not complete: {}",
            identity.session_id,
            direction,
            e
        ),
    }

    if let Err(e) = deps.leave_room.execute(&identity).await {
        tracing::debug!(
            "Leave for session '{}' not delivered: {}",
            identity.session_id,
            e
        );
    }
}

/// クライアントからのフレームを読み続ける
///
/// Pong を受け取ったときだけ期限を延ばす。
async fn inbound_loop<S>(
    mut receiver: S,
    identity: SessionIdentity,
    send_message: Arc<SendMessageUseCase>,
    pong_timeout: Duration,
) -> Result<SessionEnd, SessionError>
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut deadline = Instant::now() + pong_timeout;

    loop {
        let frame = match timeout_at(deadline, receiver.next()).await {
            Err(_) => return Err(SessionError::IdleTimeout(pong_timeout)),
            Ok(None) => return Ok(SessionEnd::ClientClosed),
            Ok(Some(frame)) => frame?,
        };

        match frame {
            Message::Text(text) => match send_message.execute(&identity, text.as_str()).await {
                Ok(message_id) => {
                    tracing::debug!(
                        "Message '{}' from '{}' submitted to room '{}'",
                        message_id,
                        identity.display_name,
                        identity.room_id
                    );
                }
                Err(SendMessageError::InvalidContent(e)) => {
                    tracing::warn!(
                        "Dropping frame from '{}' in room '{}': {}",
                        identity.display_name,
                        identity.room_id,
                        e
                    );
                }
                Err(SendMessageError::CoordinatorUnavailable) => {
                    return Ok(SessionEnd::Shutdown);
                }
            },
            Message::Pong(_) => {
                deadline = Instant::now() + pong_timeout;
            }
            Message::Close(_) => {
                tracing::info!("Client '{}' requested close", identity.display_name);
                return Ok(SessionEnd::ClientClosed);
            }
            Message::Binary(_) => {
                tracing::debug!(
                    "Ignoring binary frame from '{}'",
                    identity.display_name
                );
            }
            // Pong replies to client pings are queued by the transport
            Message::Ping(_) => {}
        }
    }
}

/// メールボックスの中身をクライアントへ書き込み続ける
async fn outbound_loop<S>(
    mut sender: S,
    mut mailbox: MailboxReceiver,
    config: SessionConfig,
    shutdown: CancellationToken,
    inbound_done: CancellationToken,
) -> Result<SessionEnd, SessionError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let write_timeout = config.write_timeout;
    let mut ping = interval_at(Instant::now() + config.ping_interval, config.ping_interval);

    loop {
        // shutdown first so that the close code is AWAY even when the coordinator
        // has already dropped this mailbox
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                close(&mut sender, close_code::AWAY, "server shutting down", write_timeout).await?;
                return Ok(SessionEnd::Shutdown);
            }
            _ = inbound_done.cancelled() => {
                // also flushes the reply to a close frame sent by the client
                timeout(write_timeout, sender.close())
                    .await
                    .map_err(|_| SessionError::WriteTimeout(write_timeout))??;
                return Ok(SessionEnd::InboundFinished);
            }
            message = mailbox.recv() => match message {
                Some(message) => {
                    let frame = ChatMessageFrame::from(message.as_ref());
                    let json = serde_json::to_string(&frame)?;
                    write(&mut sender, Message::Text(json.into()), write_timeout).await?;
                }
                None => {
                    close(&mut sender, close_code::NORMAL, "session closed", write_timeout).await?;
                    return Ok(SessionEnd::MailboxClosed);
                }
            },
            _ = ping.tick() => {
                write(&mut sender, Message::Ping(Bytes::new()), write_timeout).await?;
            }
        }
    }
}

async fn write<S>(sender: &mut S, message: Message, write_timeout: Duration) -> Result<(), SessionError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    timeout(write_timeout, sender.send(message))
        .await
        .map_err(|_| SessionError::WriteTimeout(write_timeout))??;
    Ok(())
}

async fn close<S>(
    sender: &mut S,
    code: u16,
    reason: &'static str,
    write_timeout: Duration,
) -> Result<(), SessionError>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let frame = CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    };
    write(sender, Message::Close(Some(frame)), write_timeout).await
}

#[cfg(test)]
mod tests {
    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - outbound ループ: メッセージの JSON 書き込み、定期的な Ping、終了理由ごとの Close フレーム
    // - inbound ループ: Pong だけが期限を延ばすこと、期限切れでの終了
    // - 書き込みが期限内に終わらない場合のタイムアウト
    //
    // 【なぜこのテストが必要か】
    // - 応答しないクライアントを切り離せないと、メンバー一覧に残り続ける
    // - Close フレームのコードでクライアントは再接続すべきかを判断する
    // ========================================

    use std::{
        pin::Pin,
        task::{Context, Poll},
    };

    use futures_util::{sink, stream};
    use hiroba_shared::time::FixedClock;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        domain::{
            ChatMessage, DisplayName, MemberId, MessageContent, RoomId, SessionId, Timestamp,
            mailbox,
        },
        infrastructure::repository::InMemoryStore,
        usecase::{CoordinatorConfig, spawn_coordinator},
    };

    type TestSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;
    type TestStream = Pin<Box<dyn Stream<Item = Result<Message, axum::Error>> + Send>>;

    /// 書き込まれたフレームを記録する Sink
    fn recording_sink() -> (TestSink, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = sink::unfold(tx, |tx, message: Message| async move {
            let _ = tx.send(message);
            Ok::<_, axum::Error>(tx)
        });
        (Box::pin(sink), rx)
    }

    /// 書き込みが永遠に終わらない Sink
    struct StalledSink;

    impl Sink<Message> for StalledSink {
        type Error = axum::Error;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn start_send(self: Pin<&mut Self>, _: Message) -> Result<(), Self::Error> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }
    }

    /// 指定した間隔でフレームを返し、その後は何も返さない Stream
    fn frames_after(frames: Vec<(Duration, Message)>) -> TestStream {
        let frames = stream::unfold(frames.into_iter(), |mut frames| async move {
            let (delay, message) = frames.next()?;
            tokio::time::sleep(delay).await;
            Some((Ok::<_, axum::Error>(message), frames))
        });
        Box::pin(frames.chain(stream::pending()))
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    fn close_code_of(frame: &Message) -> Option<u16> {
        match frame {
            Message::Close(Some(close)) => Some(close.code),
            _ => None,
        }
    }

    fn identity() -> SessionIdentity {
        SessionIdentity {
            session_id: SessionId::generate(),
            member_id: MemberId::generate(),
            display_name: DisplayName::new("alice".to_string()).unwrap(),
            room_id: RoomId::generate(),
        }
    }

    fn send_message_usecase() -> Arc<SendMessageUseCase> {
        let (handle, _task) = spawn_coordinator(
            CoordinatorConfig::default(),
            Arc::new(InMemoryStore::new()),
            CancellationToken::new(),
        );
        Arc::new(SendMessageUseCase::new(handle, Arc::new(FixedClock::new(0))))
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbound_writes_messages_then_closes_normally() {
        // テスト項目: メールボックスのメッセージを JSON で書き込み、閉じたら NORMAL で Close する
        // given (前提条件):
        let (sink, mut written) = recording_sink();
        let (tx, rx) = mailbox(8);
        let message = ChatMessage::new(
            RoomId::generate(),
            MemberId::generate(),
            DisplayName::new("bob".to_string()).unwrap(),
            MessageContent::new("hi".to_string()).unwrap(),
            Timestamp::new(0),
        );
        tx.send(Arc::new(message)).await.unwrap();
        drop(tx);

        // when (操作):
        let end = outbound_loop(
            sink,
            rx,
            SessionConfig::default(),
            CancellationToken::new(),
            CancellationToken::new(),
        )
        .await;

        // then (期待する結果):
        assert_eq!(end.unwrap(), SessionEnd::MailboxClosed);
        let frames = drain(&mut written);
        assert_eq!(frames.len(), 2);
        let Message::Text(text) = &frames[0] else {
            panic!("expected a text frame, got {:?}", frames[0]);
        };
        let frame: ChatMessageFrame = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(frame.content, "hi");
        assert_eq!(frame.sender_username, "bob");
        assert_eq!(close_code_of(&frames[1]), Some(close_code::NORMAL));
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbound_sends_going_away_on_shutdown() {
        // テスト項目: シャットダウン時は AWAY の Close を送って終了する
        // given (前提条件):
        let (sink, mut written) = recording_sink();
        let (_tx, rx) = mailbox(8);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        // when (操作):
        let end = outbound_loop(
            sink,
            rx,
            SessionConfig::default(),
            shutdown,
            CancellationToken::new(),
        )
        .await;

        // then (期待する結果):
        assert_eq!(end.unwrap(), SessionEnd::Shutdown);
        let frames = drain(&mut written);
        assert_eq!(frames.len(), 1);
        assert_eq!(close_code_of(&frames[0]), Some(close_code::AWAY));
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbound_pings_every_interval() {
        // テスト項目: ping_interval ごとに Ping を送る
        // given (前提条件):
        let (sink, mut written) = recording_sink();
        let (_tx, rx) = mailbox(8);
        let config = SessionConfig {
            ping_interval: Duration::from_secs(30),
            ..SessionConfig::default()
        };

        // when (操作):
        let still_running = timeout(
            Duration::from_secs(65),
            outbound_loop(
                sink,
                rx,
                config,
                CancellationToken::new(),
                CancellationToken::new(),
            ),
        )
        .await;

        // then (期待する結果):
        assert!(still_running.is_err());
        let frames = drain(&mut written);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| matches!(f, Message::Ping(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbound_closes_sink_when_inbound_finishes() {
        // テスト項目: inbound ループが終わったら、フレームを追加せずに接続を閉じて終了する
        // given (前提条件):
        let (sink, mut written) = recording_sink();
        let (_tx, rx) = mailbox(8);
        let inbound_done = CancellationToken::new();
        inbound_done.cancel();

        // when (操作):
        let end = outbound_loop(
            sink,
            rx,
            SessionConfig::default(),
            CancellationToken::new(),
            inbound_done,
        )
        .await;

        // then (期待する結果):
        assert_eq!(end.unwrap(), SessionEnd::InboundFinished);
        assert!(drain(&mut written).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_gives_up_after_write_timeout() {
        // テスト項目: 書き込みが write_timeout 内に終わらなければ WriteTimeout になる
        // given (前提条件):
        let mut sink = StalledSink;
        let started = Instant::now();

        // when (操作):
        let result = write(&mut sink, Message::Ping(Bytes::new()), Duration::from_secs(10)).await;

        // then (期待する結果):
        assert!(matches!(result, Err(SessionError::WriteTimeout(d)) if d == Duration::from_secs(10)));
        assert_eq!(started.elapsed().as_secs(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_times_out_without_pong() {
        // テスト項目: pong_timeout の間 Pong が届かなければ IdleTimeout で終了する
        // given (前提条件):
        let receiver = frames_after(Vec::new());
        let started = Instant::now();

        // when (操作):
        let end = inbound_loop(
            receiver,
            identity(),
            send_message_usecase(),
            Duration::from_secs(60),
        )
        .await;

        // then (期待する結果):
        assert!(matches!(end, Err(SessionError::IdleTimeout(_))));
        assert_eq!(started.elapsed().as_secs(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_extends_the_deadline() {
        // テスト項目: Pong を受け取るたびに期限が pong_timeout だけ延びる
        // given (前提条件):
        let receiver = frames_after(vec![
            (Duration::from_secs(40), Message::Pong(Bytes::new())),
            (Duration::from_secs(40), Message::Pong(Bytes::new())),
        ]);
        let started = Instant::now();

        // when (操作):
        let end = inbound_loop(
            receiver,
            identity(),
            send_message_usecase(),
            Duration::from_secs(60),
        )
        .await;

        // then (期待する結果): 最後の Pong（80 秒）から 60 秒後に切れる
        assert!(matches!(end, Err(SessionError::IdleTimeout(_))));
        assert_eq!(started.elapsed().as_secs(), 140);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_from_client_does_not_extend_the_deadline() {
        // テスト項目: Pong 以外のフレームでは期限が延びない
        // given (前提条件):
        let receiver = frames_after(vec![(Duration::from_secs(40), Message::Ping(Bytes::new()))]);
        let started = Instant::now();

        // when (操作):
        let end = inbound_loop(
            receiver,
            identity(),
            send_message_usecase(),
            Duration::from_secs(60),
        )
        .await;

        // then (期待する結果):
        assert!(matches!(end, Err(SessionError::IdleTimeout(_))));
        assert_eq!(started.elapsed().as_secs(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_ends_on_client_close() {
        // テスト項目: クライアントの Close フレームで ClientClosed として終了する
        // given (前提条件):
        let receiver = frames_after(vec![(Duration::from_secs(1), Message::Close(None))]);

        // when (操作):
        let end = inbound_loop(
            receiver,
            identity(),
            send_message_usecase(),
            Duration::from_secs(60),
        )
        .await;

        // then (期待する結果):
        assert_eq!(end.unwrap(), SessionEnd::ClientClosed);
    }
}
