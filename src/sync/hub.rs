//! 会话中心 - 每个用户一条连接，按挂载的消费者引用计数
//!
//! 多个视图（铃铛、下拉框、面板）挂载同一用户时共享一个 `SyncController`
//! 和一条推送连接；最后一个 `SessionHandle` 释放时卸载并断开。

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use super::controller::{ControllerOptions, SyncController};
use crate::api::NotificationApi;
use crate::config::ClientConfig;
use crate::transport::{PushConnector, ReconnectPolicy, TransportAdapter};

struct Entry {
    controller: SyncController,
    refs: usize,
}

struct HubInner {
    api: Arc<dyn NotificationApi>,
    connector: Arc<dyn PushConnector>,
    options: ControllerOptions,
    reconnect: ReconnectPolicy,
    heartbeat: std::time::Duration,
    sessions: Mutex<HashMap<String, Entry>>,
}

impl HubInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self, user_id: &str) {
        let finished = {
            let mut sessions = self.lock();
            let Some(entry) = sessions.get_mut(user_id) else {
                return;
            };
            entry.refs = entry.refs.saturating_sub(1);
            debug!(user_id, refs = entry.refs, "Session handle released");
            if entry.refs > 0 {
                return;
            }
            sessions.remove(user_id)
        };

        if let Some(entry) = finished {
            entry.controller.unmount();
            info!(user_id, "Last consumer gone, session closed");
        }
    }
}

/// 会话中心
#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

impl NotificationHub {
    pub fn new(
        api: Arc<dyn NotificationApi>,
        connector: Arc<dyn PushConnector>,
        config: &ClientConfig,
    ) -> Self {
        Self::with_options(
            api,
            connector,
            ControllerOptions::from_config(config),
            config.reconnect,
            config.heartbeat_interval,
        )
    }

    pub fn with_options(
        api: Arc<dyn NotificationApi>,
        connector: Arc<dyn PushConnector>,
        options: ControllerOptions,
        reconnect: ReconnectPolicy,
        heartbeat: std::time::Duration,
    ) -> Self {
        Self {
            inner: Arc::new(HubInner {
                api,
                connector,
                options,
                reconnect,
                heartbeat,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// 挂载一个消费者；首个消费者会创建控制器并建立连接
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn acquire(&self, user_id: &str) -> SessionHandle {
        let mut sessions = self.inner.lock();
        if let Some(entry) = sessions.get_mut(user_id) {
            entry.refs += 1;
            debug!(user_id, refs = entry.refs, "Reusing session");
            return SessionHandle {
                hub: Arc::clone(&self.inner),
                user_id: user_id.to_string(),
                controller: entry.controller.clone(),
            };
        }

        let controller = SyncController::new(user_id, Arc::clone(&self.inner.api), self.inner.options.clone());
        let (adapter, events) = TransportAdapter::new(
            Arc::clone(&self.inner.connector),
            self.inner.reconnect,
            self.inner.heartbeat,
        );
        controller.mount(adapter, events);
        sessions.insert(
            user_id.to_string(),
            Entry {
                controller: controller.clone(),
                refs: 1,
            },
        );
        info!(user_id, "Session opened");

        SessionHandle {
            hub: Arc::clone(&self.inner),
            user_id: user_id.to_string(),
            controller,
        }
    }

    /// 当前某用户的消费者数量
    pub fn ref_count(&self, user_id: &str) -> usize {
        self.inner.lock().get(user_id).map(|e| e.refs).unwrap_or(0)
    }

    pub fn active_sessions(&self) -> Vec<String> {
        let mut users: Vec<String> = self.inner.lock().keys().cloned().collect();
        users.sort();
        users
    }
}

/// 消费者持有的会话句柄，Drop 时释放引用
pub struct SessionHandle {
    hub: Arc<HubInner>,
    user_id: String,
    controller: SyncController,
}

impl SessionHandle {
    pub fn controller(&self) -> &SyncController {
        &self.controller
    }
}

impl Clone for SessionHandle {
    fn clone(&self) -> Self {
        if let Some(entry) = self.hub.lock().get_mut(&self.user_id) {
            entry.refs += 1;
        }
        Self {
            hub: Arc::clone(&self.hub),
            user_id: self.user_id.clone(),
            controller: self.controller.clone(),
        }
    }
}

impl Deref for SessionHandle {
    type Target = SyncController;

    fn deref(&self) -> &Self::Target {
        &self.controller
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.hub.release(&self.user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{DropdownPage, PanelPage};
    use crate::error::{SyncError, TransportError};
    use crate::notification::{Notification, NotificationFilter};
    use crate::transport::PushStream;
    use crate::sync::SyncState;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct EmptyApi;

    #[async_trait]
    impl NotificationApi for EmptyApi {
        async fn fetch_panel(&self, _: &str, _: &NotificationFilter) -> Result<PanelPage, SyncError> {
            Ok(PanelPage::default())
        }
        async fn fetch_detail(&self, _: &str, _: &str) -> Result<Notification, SyncError> {
            Err(SyncError::Status { operation: "fetch_detail", status: 404 })
        }
        async fn mark_read(&self, _: &str, _: &str) -> Result<Option<Notification>, SyncError> {
            Ok(None)
        }
        async fn delete(&self, _: &str, _: &str) -> Result<(), SyncError> {
            Ok(())
        }
        async fn unread_count(&self, _: &str) -> Result<usize, SyncError> {
            Ok(0)
        }
        async fn fetch_dropdown(&self, _: &str) -> Result<DropdownPage, SyncError> {
            Ok(DropdownPage::default())
        }
    }

    /// 记录连接次数、永远连接失败的连接器
    struct RefusingConnector {
        opens: AtomicUsize,
    }

    #[async_trait]
    impl PushConnector for RefusingConnector {
        fn name(&self) -> &str {
            "refusing"
        }

        async fn open(&self, _user_id: &str) -> Result<Box<dyn PushStream>, TransportError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Connect("refused".into()))
        }
    }

    fn hub(connector: Arc<RefusingConnector>) -> NotificationHub {
        NotificationHub::with_options(
            Arc::new(EmptyApi),
            connector,
            ControllerOptions::default(),
            ReconnectPolicy::new(Duration::from_millis(5), Duration::from_millis(5), 0),
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn test_consumers_share_one_session() {
        let connector = Arc::new(RefusingConnector { opens: AtomicUsize::new(0) });
        let hub = hub(Arc::clone(&connector));

        let bell = hub.acquire("u1");
        let panel = hub.acquire("u1");
        assert_eq!(hub.ref_count("u1"), 2);
        assert_eq!(hub.active_sessions(), vec!["u1".to_string()]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(connector.opens.load(Ordering::SeqCst), 1);
        assert_eq!(bell.state(), SyncState::Disconnected);

        drop(bell);
        assert_eq!(hub.ref_count("u1"), 1);
        assert!(panel.is_mounted());

        let controller = panel.controller().clone();
        drop(panel);
        assert_eq!(hub.ref_count("u1"), 0);
        assert!(hub.active_sessions().is_empty());
        assert!(!controller.is_mounted());
    }

    #[tokio::test]
    async fn test_cloned_handle_counts_as_consumer() {
        let connector = Arc::new(RefusingConnector { opens: AtomicUsize::new(0) });
        let hub = hub(connector);

        let first = hub.acquire("u1");
        let second = first.clone();
        assert_eq!(hub.ref_count("u1"), 2);
        drop(first);
        assert_eq!(hub.ref_count("u1"), 1);
        drop(second);
        assert_eq!(hub.ref_count("u1"), 0);
    }
}
