//! 推送通道适配器
//!
//! 负责一条用户级长连接的完整生命周期：
//! - `connect(user)` 幂等，已连接同一用户时不做任何事
//! - 意外断线按 `ReconnectPolicy` 指数退避重连，连接成功后计数归零
//! - 次数用尽后发出 `TransportEvent::Failed`，不再自动重试
//! - 心跳 PING 在连接期间按固定间隔发送，发送失败只记录日志
//! - `disconnect()` 同步取消连接任务和挂起的重连等待
//!
//! 每次 connect/disconnect 都会递增代数（generation），旧连接残留的事件在
//! `TransportEvents::recv` 中被丢弃。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::backoff::ReconnectPolicy;
use super::codec::{self, PushEvent};
use super::{PushConnector, PushStream, RawFrame};
use crate::error::TransportError;
use crate::notification::Notification;

/// 适配器向上层发出的事件
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// 通道已打开（首次连接或重连成功）
    Connected,
    NotificationCreated(Notification),
    NotificationRead(String),
    NotificationDeleted(String),
    /// 服务端通过通道报告的错误
    ServerError(String),
    /// 意外断线
    Disconnected { reason: String },
    /// 即将进行第 `attempt` 次重连
    Reconnecting { attempt: u32, delay: Duration },
    /// 重连次数用尽，需要人工重试
    Failed(TransportError),
}

#[derive(Debug)]
struct TransportEnvelope {
    generation: u64,
    event: TransportEvent,
}

/// 事件接收端
pub struct TransportEvents {
    rx: mpsc::UnboundedReceiver<TransportEnvelope>,
    generation: Arc<AtomicU64>,
}

impl TransportEvents {
    /// 接收下一条当前代的事件
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        loop {
            let envelope = self.rx.recv().await?;
            let current = self.generation.load(Ordering::SeqCst);
            if envelope.generation == current {
                return Some(envelope.event);
            }
            debug!(
                generation = envelope.generation,
                current, "Dropping event from superseded connection"
            );
        }
    }
}

struct ActiveConnection {
    user_id: String,
    handle: JoinHandle<()>,
}

/// 推送通道适配器
pub struct TransportAdapter {
    connector: Arc<dyn PushConnector>,
    policy: ReconnectPolicy,
    heartbeat: Duration,
    generation: Arc<AtomicU64>,
    active: Mutex<Option<ActiveConnection>>,
    tx: mpsc::UnboundedSender<TransportEnvelope>,
}

impl TransportAdapter {
    pub fn new(
        connector: Arc<dyn PushConnector>,
        policy: ReconnectPolicy,
        heartbeat: Duration,
    ) -> (Self, TransportEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let generation = Arc::new(AtomicU64::new(0));
        let adapter = Self {
            connector,
            policy,
            heartbeat,
            generation: Arc::clone(&generation),
            active: Mutex::new(None),
            tx,
        };
        (adapter, TransportEvents { rx, generation })
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveConnection>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 建立连接；同一用户的连接仍在运行时为空操作
    ///
    /// 返回是否真正启动了新连接。必须在 tokio 运行时内调用。
    pub fn connect(&self, user_id: &str) -> bool {
        let mut active = self.lock_active();
        if let Some(current) = active.as_ref() {
            if current.user_id == user_id && !current.handle.is_finished() {
                debug!(user_id, "Already connected, ignoring connect");
                return false;
            }
        }
        if let Some(previous) = active.take() {
            previous.handle.abort();
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let session = ConnectionTask {
            connector: Arc::clone(&self.connector),
            policy: self.policy,
            heartbeat: self.heartbeat,
            user_id: user_id.to_string(),
            generation,
            current: Arc::clone(&self.generation),
            tx: self.tx.clone(),
        };
        info!(
            user_id,
            transport = self.connector.name(),
            generation,
            "Starting push connection"
        );
        *active = Some(ActiveConnection {
            user_id: user_id.to_string(),
            handle: tokio::spawn(session.run()),
        });
        true
    }

    /// 断开连接并取消挂起的重连；返回之前是否有连接
    pub fn disconnect(&self) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        match self.lock_active().take() {
            Some(previous) => {
                previous.handle.abort();
                info!(user_id = %previous.user_id, "Push connection closed by client");
                true
            }
            None => false,
        }
    }

    /// 连接任务是否仍在运行（含重连等待）
    pub fn is_active(&self) -> bool {
        self.lock_active()
            .as_ref()
            .map(|c| !c.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn user_id(&self) -> Option<String> {
        self.lock_active().as_ref().map(|c| c.user_id.clone())
    }
}

impl Drop for TransportAdapter {
    fn drop(&mut self) {
        if let Some(previous) = self.lock_active().take() {
            previous.handle.abort();
        }
    }
}

struct ConnectionTask {
    connector: Arc<dyn PushConnector>,
    policy: ReconnectPolicy,
    heartbeat: Duration,
    user_id: String,
    generation: u64,
    current: Arc<AtomicU64>,
    tx: mpsc::UnboundedSender<TransportEnvelope>,
}

impl ConnectionTask {
    fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.tx.send(TransportEnvelope {
            generation: self.generation,
            event,
        });
    }

    async fn run(self) {
        let mut attempt: u32 = 0;
        loop {
            if !self.is_current() {
                return;
            }

            match self.connector.open(&self.user_id).await {
                Ok(mut stream) => {
                    attempt = 0;
                    self.emit(TransportEvent::Connected);
                    let reason = self.pump(stream.as_mut()).await;
                    stream.close().await;
                    warn!(user_id = %self.user_id, reason = %reason, "Push connection lost");
                    self.emit(TransportEvent::Disconnected { reason });
                }
                Err(e) => {
                    warn!(user_id = %self.user_id, attempt, error = %e, "Push connection failed");
                }
            }

            if !self.policy.should_retry(attempt) {
                error!(user_id = %self.user_id, attempts = attempt, "Giving up on push connection");
                self.emit(TransportEvent::Failed(TransportError::RetriesExhausted { attempts: attempt }));
                return;
            }

            let delay = self.policy.delay_for(attempt);
            attempt += 1;
            info!(user_id = %self.user_id, attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");
            self.emit(TransportEvent::Reconnecting { attempt, delay });
            tokio::time::sleep(delay).await;
        }
    }

    /// 读取连接直到断开，返回断开原因
    async fn pump(&self, stream: &mut dyn PushStream) -> String {
        let heartbeat_enabled = stream.supports_heartbeat() && !self.heartbeat.is_zero();
        let period = if self.heartbeat.is_zero() {
            Duration::from_secs(3600)
        } else {
            self.heartbeat
        };
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = stream.next_frame() => match frame {
                    None => return "closed by server".to_string(),
                    Some(Err(TransportError::Codec(message))) => {
                        warn!(user_id = %self.user_id, error = %message, "Dropping malformed frame");
                    }
                    Some(Err(e)) => return e.to_string(),
                    Some(Ok(raw)) => self.dispatch(raw),
                },
                _ = heartbeat.tick(), if heartbeat_enabled => {
                    match stream.send_text(codec::encode_ping(&self.user_id)).await {
                        Ok(()) => debug!(user_id = %self.user_id, "Heartbeat sent"),
                        Err(e) => warn!(user_id = %self.user_id, error = %e, "Heartbeat failed"),
                    }
                }
            }
        }
    }

    fn dispatch(&self, raw: RawFrame) {
        let decoded = match codec::decode_sse(raw.event.as_deref(), &raw.data) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "Dropping malformed frame");
                return;
            }
        };

        match decoded {
            Some(PushEvent::Created(record)) => self.emit(TransportEvent::NotificationCreated(record)),
            Some(PushEvent::Read(id)) => self.emit(TransportEvent::NotificationRead(id)),
            Some(PushEvent::Deleted(id)) => self.emit(TransportEvent::NotificationDeleted(id)),
            Some(PushEvent::ServerError(message)) => {
                warn!(user_id = %self.user_id, error = %message, "Server reported error");
                self.emit(TransportEvent::ServerError(message));
            }
            Some(PushEvent::Connected { client_id }) => {
                debug!(user_id = %self.user_id, client_id = ?client_id, "Server acknowledged connection");
            }
            Some(PushEvent::Pong) => debug!(user_id = %self.user_id, "Heartbeat acknowledged"),
            None => debug!(user_id = %self.user_id, event = ?raw.event, "Ignoring unhandled frame"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::time::timeout;

    type FrameSender = mpsc::UnboundedSender<Result<RawFrame, TransportError>>;

    /// 按脚本返回连接结果的测试连接器
    struct ScriptedConnector {
        script: Mutex<VecDeque<Result<FrameSenderSlot, TransportError>>>,
        opens: Arc<AtomicU64>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    /// 连接成功时把帧发送端交给测试
    type FrameSenderSlot = tokio::sync::oneshot::Sender<FrameSender>;

    struct ChannelStream {
        rx: mpsc::UnboundedReceiver<Result<RawFrame, TransportError>>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl PushStream for ChannelStream {
        async fn next_frame(&mut self) -> Option<Result<RawFrame, TransportError>> {
            self.rx.recv().await
        }

        async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(text);
            Ok(())
        }

        async fn close(&mut self) {}
    }

    #[async_trait]
    impl PushConnector for ScriptedConnector {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn open(&self, _user_id: &str) -> Result<Box<dyn PushStream>, TransportError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(slot)) => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    let _ = slot.send(tx);
                    Ok(Box::new(ChannelStream {
                        rx,
                        sent: Arc::clone(&self.sent),
                    }))
                }
                Some(Err(e)) => Err(e),
                None => Err(TransportError::Connect("no more scripted connections".into())),
            }
        }
    }

    fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(Duration::from_millis(5), Duration::from_millis(20), max_attempts)
    }

    async fn next(events: &mut TransportEvents) -> TransportEvent {
        timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for transport event")
            .expect("event channel closed")
    }

    const RECORD: &str = r#"{"id":"n1","userId":"u1","title":"t","message":"m","type":"RESERVA_CONFIRMADA","read":false,"createdAt":"2026-05-01T10:00:00Z"}"#;

    #[tokio::test]
    async fn test_frames_are_decoded_and_malformed_dropped() {
        let (slot_tx, slot_rx) = tokio::sync::oneshot::channel();
        let connector = Arc::new(ScriptedConnector {
            script: Mutex::new(VecDeque::from(vec![Ok(slot_tx)])),
            opens: Arc::new(AtomicU64::new(0)),
            sent: Arc::new(Mutex::new(Vec::new())),
        });
        let (adapter, mut events) = TransportAdapter::new(connector, fast_policy(0), Duration::from_secs(30));

        assert!(adapter.connect("u1"));
        assert_eq!(next(&mut events).await, TransportEvent::Connected);

        let frames = slot_rx.await.unwrap();
        frames.send(Ok(RawFrame::text("garbage"))).unwrap();
        frames.send(Err(TransportError::Codec("bad utf-8".into()))).unwrap();
        frames
            .send(Ok(RawFrame::text(format!(r#"{{"type":"NEW","record":{}}}"#, RECORD))))
            .unwrap();
        frames.send(Ok(RawFrame::text(r#"{"type":"READ","id":"n1"}"#))).unwrap();

        match next(&mut events).await {
            TransportEvent::NotificationCreated(n) => assert_eq!(n.id, "n1"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            next(&mut events).await,
            TransportEvent::NotificationRead("n1".into())
        );
        adapter.disconnect();
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_for_same_user() {
        let (slot_tx, _slot_rx) = tokio::sync::oneshot::channel();
        let opens = Arc::new(AtomicU64::new(0));
        let connector = Arc::new(ScriptedConnector {
            script: Mutex::new(VecDeque::from(vec![Ok(slot_tx)])),
            opens: Arc::clone(&opens),
            sent: Arc::new(Mutex::new(Vec::new())),
        });
        let (adapter, mut events) = TransportAdapter::new(connector, fast_policy(0), Duration::from_secs(30));

        assert!(adapter.connect("u1"));
        assert_eq!(next(&mut events).await, TransportEvent::Connected);
        assert!(!adapter.connect("u1"));
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert!(adapter.is_active());

        assert!(adapter.disconnect());
        assert!(!adapter.disconnect());
        assert!(!adapter.is_active());
    }

    #[tokio::test]
    async fn test_reconnects_with_backoff_then_fails() {
        let connector = Arc::new(ScriptedConnector {
            script: Mutex::new(VecDeque::new()),
            opens: Arc::new(AtomicU64::new(0)),
            sent: Arc::new(Mutex::new(Vec::new())),
        });
        let (adapter, mut events) =
            TransportAdapter::new(connector.clone(), fast_policy(3), Duration::from_secs(30));
        adapter.connect("u1");

        let policy = fast_policy(3);
        for attempt in 1..=3 {
            assert_eq!(
                next(&mut events).await,
                TransportEvent::Reconnecting {
                    attempt,
                    delay: policy.delay_for(attempt - 1)
                }
            );
        }
        assert_eq!(
            next(&mut events).await,
            TransportEvent::Failed(TransportError::RetriesExhausted { attempts: 3 })
        );
        assert_eq!(connector.opens.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_successful_reconnect_resets_attempts() {
        let (first_tx, first_rx) = tokio::sync::oneshot::channel();
        let (second_tx, _second_rx) = tokio::sync::oneshot::channel();
        let connector = Arc::new(ScriptedConnector {
            script: Mutex::new(VecDeque::from(vec![
                Ok(first_tx),
                Err(TransportError::Connect("refused".into())),
                Ok(second_tx),
            ])),
            opens: Arc::new(AtomicU64::new(0)),
            sent: Arc::new(Mutex::new(Vec::new())),
        });
        let (adapter, mut events) = TransportAdapter::new(connector, fast_policy(5), Duration::from_secs(30));
        adapter.connect("u1");

        assert_eq!(next(&mut events).await, TransportEvent::Connected);
        // 服务端关闭连接
        drop(first_rx.await.unwrap());
        assert!(matches!(next(&mut events).await, TransportEvent::Disconnected { .. }));
        assert!(matches!(
            next(&mut events).await,
            TransportEvent::Reconnecting { attempt: 1, .. }
        ));
        assert!(matches!(
            next(&mut events).await,
            TransportEvent::Reconnecting { attempt: 2, .. }
        ));
        assert_eq!(next(&mut events).await, TransportEvent::Connected);
        adapter.disconnect();
    }

    #[tokio::test]
    async fn test_heartbeat_sends_ping() {
        let (slot_tx, _slot_rx) = tokio::sync::oneshot::channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let connector = Arc::new(ScriptedConnector {
            script: Mutex::new(VecDeque::from(vec![Ok(slot_tx)])),
            opens: Arc::new(AtomicU64::new(0)),
            sent: Arc::clone(&sent),
        });
        let (adapter, mut events) =
            TransportAdapter::new(connector, fast_policy(0), Duration::from_millis(20));
        adapter.connect("u1");
        assert_eq!(next(&mut events).await, TransportEvent::Connected);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let pings = sent.lock().unwrap().clone();
        assert!(pings.len() >= 2, "expected heartbeats, got {:?}", pings);
        assert!(pings[0].contains("\"PING\""));
        adapter.disconnect();
    }

    #[tokio::test]
    async fn test_disconnect_drops_events_from_old_generation() {
        let (slot_tx, slot_rx) = tokio::sync::oneshot::channel();
        let connector = Arc::new(ScriptedConnector {
            script: Mutex::new(VecDeque::from(vec![Ok(slot_tx)])),
            opens: Arc::new(AtomicU64::new(0)),
            sent: Arc::new(Mutex::new(Vec::new())),
        });
        let (adapter, mut events) = TransportAdapter::new(connector, fast_policy(0), Duration::from_secs(30));
        adapter.connect("u1");
        assert_eq!(next(&mut events).await, TransportEvent::Connected);

        let frames = slot_rx.await.unwrap();
        adapter.disconnect();
        let _ = frames.send(Ok(RawFrame::text(r#"{"type":"READ","id":"n1"}"#)));

        let late = timeout(Duration::from_millis(100), events.recv()).await;
        assert!(late.is_err(), "stale event leaked: {:?}", late);
    }
}
