//! 同步控制器 - 协调推送通道、REST 和通知存储
//!
//! # 职责
//! - 挂载时连接推送通道，每次（重新）连接后拉取全量基线
//! - 推送事件无论处于什么状态都合并进存储
//! - 乐观更新（已读、删除）先改本地再发请求，失败时精确回滚
//! - 所有异步续体在修改状态前检查 epoch，卸载后不再有任何副作用
//!
//! # 并发模型
//! 内部状态放在 `std::sync::Mutex` 中，锁从不跨越 `.await`。
//! 全量拉取期间到达的推送事件同时写入回放缓冲，快照替换后再回放，
//! 保证快照不会覆盖掉更新的推送。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::state::{ErrorBanner, SyncState, SyncUpdate};
use crate::api::NotificationApi;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, TransportError};
use crate::notification::{MergePolicy, Notification, NotificationStore, SnapshotCache, DEFAULT_PAGE_SIZE};
use crate::transport::{TransportAdapter, TransportEvent, TransportEvents};

/// 广播通道容量
const UPDATE_CAPACITY: usize = 256;

/// 控制器选项
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub merge_policy: MergePolicy,
    pub page_size: usize,
    pub cache: Option<SnapshotCache>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::default(),
            page_size: DEFAULT_PAGE_SIZE,
            cache: None,
        }
    }
}

impl ControllerOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            merge_policy: config.merge_policy,
            page_size: config.page_size,
            cache: config
                .cache_enabled
                .then(|| SnapshotCache::new(config.cache_dir())),
        }
    }

    pub fn with_cache(mut self, cache: SnapshotCache) -> Self {
        self.cache = Some(cache);
        self
    }
}

/// 全量拉取结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 快照已应用
    Applied { count: usize },
    /// 已被更新的拉取取代，或会话已变更
    Discarded,
}

/// 全部标记已读的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkAllReport {
    pub marked: Vec<String>,
    pub failed: Vec<(String, ClientError)>,
}

/// 视图使用的只读快照
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot {
    pub state: SyncState,
    pub notifications: Vec<Notification>,
    pub unread: usize,
    pub last_error: Option<ErrorBanner>,
}

/// 拉取期间需要回放的推送
#[derive(Debug, Clone)]
enum Replay {
    Upsert(Notification),
    Read(String),
    Removed(String),
}

struct Inner {
    store: NotificationStore,
    state: SyncState,
    /// 每次卸载递增，用于丢弃过期的异步结果
    epoch: u64,
    closed: bool,
    fetch_seq: u64,
    fetch_in_flight: bool,
    replay: Vec<(u64, Replay)>,
    /// 乐观已读、尚未得到服务端确认的 id
    pending_reads: HashSet<String>,
    /// 乐观删除的记录及其原位置
    pending_deletes: HashMap<String, (usize, Notification)>,
    last_error: Option<ErrorBanner>,
}

struct TransportHandle {
    adapter: TransportAdapter,
    pump: JoinHandle<()>,
}

struct Shared {
    user_id: String,
    api: Arc<dyn NotificationApi>,
    page_size: usize,
    cache: Option<SnapshotCache>,
    inner: Mutex<Inner>,
    transport: Mutex<Option<TransportHandle>>,
    updates: broadcast::Sender<SyncUpdate>,
}

/// 单用户同步控制器（可廉价克隆，共享同一状态）
#[derive(Clone)]
pub struct SyncController {
    shared: Arc<Shared>,
}

impl SyncController {
    pub fn new(user_id: impl Into<String>, api: Arc<dyn NotificationApi>, options: ControllerOptions) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let inner = Inner {
            store: NotificationStore::with_policy(options.merge_policy),
            state: SyncState::Idle,
            epoch: 0,
            closed: false,
            fetch_seq: 0,
            fetch_in_flight: false,
            replay: Vec::new(),
            pending_reads: HashSet::new(),
            pending_deletes: HashMap::new(),
            last_error: None,
        };
        Self {
            shared: Arc::new(Shared {
                user_id: user_id.into(),
                api,
                page_size: options.page_size.max(1),
                cache: options.cache,
                inner: Mutex::new(inner),
                transport: Mutex::new(None),
                updates,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_transport(&self) -> MutexGuard<'_, Option<TransportHandle>> {
        self.shared
            .transport
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn user_id(&self) -> &str {
        &self.shared.user_id
    }

    /// 订阅变更广播
    pub fn subscribe(&self) -> broadcast::Receiver<SyncUpdate> {
        self.shared.updates.subscribe()
    }

    pub fn state(&self) -> SyncState {
        self.lock().state
    }

    /// 未读数（O(1)）
    pub fn unread_count(&self) -> usize {
        self.lock().store.unread_count()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        let inner = self.lock();
        SyncSnapshot {
            state: inner.state,
            notifications: inner.store.as_slice().to_vec(),
            unread: inner.store.unread_count(),
            last_error: inner.last_error.clone(),
        }
    }

    /// 在锁内只读访问存储
    pub fn with_store<R>(&self, f: impl FnOnce(&NotificationStore) -> R) -> R {
        f(&self.lock().store)
    }

    pub fn last_error(&self) -> Option<ErrorBanner> {
        self.lock().last_error.clone()
    }

    /// 关闭错误横幅
    pub fn dismiss_error(&self) -> bool {
        self.lock().last_error.take().is_some()
    }

    pub fn is_mounted(&self) -> bool {
        self.lock_transport().is_some() && !self.lock().closed
    }

    // ========================================================================
    // 生命周期
    // ========================================================================

    /// 挂载：载入缓存快照、连接推送通道并开始消费事件
    ///
    /// 已挂载或已卸载时返回 false。必须在 tokio 运行时内调用。
    pub fn mount(&self, adapter: TransportAdapter, mut events: TransportEvents) -> bool {
        let mut transport = self.lock_transport();
        if transport.is_some() {
            debug!(user_id = %self.shared.user_id, "Already mounted");
            return false;
        }
        {
            let mut inner = self.lock();
            if inner.closed {
                return false;
            }
            self.load_cached(&mut inner);
            self.set_state(&mut inner, SyncState::Connecting);
        }

        adapter.connect(&self.shared.user_id);
        let weak = Arc::downgrade(&self.shared);
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                SyncController { shared }.handle_event(event);
            }
        });
        *transport = Some(TransportHandle { adapter, pump });
        info!(user_id = %self.shared.user_id, "Sync session mounted");
        true
    }

    /// 卸载：断开通道（只调用一次）并让所有在途请求的结果失效
    pub fn unmount(&self) -> bool {
        {
            let mut inner = self.lock();
            if inner.closed {
                return false;
            }
            inner.closed = true;
            inner.epoch += 1;
            inner.fetch_in_flight = false;
            inner.replay.clear();
            inner.pending_reads.clear();
            inner.pending_deletes.clear();
            self.set_state(&mut inner, SyncState::Idle);
        }

        if let Some(handle) = self.lock_transport().take() {
            handle.adapter.disconnect();
            handle.pump.abort();
        }
        info!(user_id = %self.shared.user_id, "Sync session unmounted");
        true
    }

    /// 手动重试（仅 Disconnected 状态有效）
    pub fn retry(&self) -> bool {
        {
            let mut inner = self.lock();
            if inner.closed || inner.state != SyncState::Disconnected {
                return false;
            }
            self.set_state(&mut inner, SyncState::Connecting);
        }
        match self.lock_transport().as_ref() {
            Some(handle) => {
                handle.adapter.connect(&self.shared.user_id);
                true
            }
            None => false,
        }
    }

    fn load_cached(&self, inner: &mut Inner) {
        let Some(cache) = &self.shared.cache else {
            return;
        };
        if !inner.store.is_empty() {
            return;
        }
        let records: Vec<Notification> = cache
            .load(&self.shared.user_id)
            .into_iter()
            .filter_map(|n| self.claim(n).ok())
            .collect();
        if records.is_empty() {
            return;
        }
        debug!(user_id = %self.shared.user_id, count = records.len(), "Loaded cached snapshot");
        inner.store.replace_all(records);
        self.notify_store(inner);
    }

    // ========================================================================
    // 推送事件
    // ========================================================================

    /// 处理一条通道事件
    ///
    /// `Connected` 会触发一次全量拉取，返回其任务句柄。
    pub fn handle_event(&self, event: TransportEvent) -> Option<JoinHandle<()>> {
        let mut inner = self.lock();
        if inner.closed {
            debug!(user_id = %self.shared.user_id, "Ignoring transport event after unmount");
            return None;
        }

        match event {
            TransportEvent::Connected => {
                self.set_state(&mut inner, SyncState::Live);
                drop(inner);
                let this = self.clone();
                return Some(tokio::spawn(async move {
                    if let Err(e) = this.fetch_all().await {
                        debug!(error = %e, "Baseline fetch after connect failed");
                    }
                }));
            }
            TransportEvent::NotificationCreated(record) => self.apply_created(&mut inner, record),
            TransportEvent::NotificationRead(id) => self.apply_read(&mut inner, &id),
            TransportEvent::NotificationDeleted(id) => self.apply_deleted(&mut inner, &id),
            TransportEvent::ServerError(message) => {
                self.raise(&mut inner, TransportError::Server(message).into());
            }
            TransportEvent::Disconnected { reason } => {
                debug!(user_id = %self.shared.user_id, reason = %reason, "Channel dropped");
            }
            TransportEvent::Reconnecting { attempt, .. } => {
                self.set_state(&mut inner, SyncState::Reconnecting { attempt });
            }
            TransportEvent::Failed(error) => {
                self.set_state(&mut inner, SyncState::Disconnected);
                self.raise(&mut inner, error.into());
            }
        }
        None
    }

    fn apply_created(&self, inner: &mut Inner, record: Notification) {
        let record = match self.claim(record) {
            Ok(record) => record,
            Err(e) => {
                warn!(user_id = %self.shared.user_id, error = %e, "Rejecting pushed notification");
                return;
            }
        };

        let arrived = (!record.read).then(|| record.clone());
        self.record_replay(inner, Replay::Upsert(record.clone()));
        let outcome = inner.store.upsert(record);
        debug!(user_id = %self.shared.user_id, ?outcome, "Merged pushed notification");

        if outcome.is_new() {
            if let Some(record) = arrived {
                let _ = self.shared.updates.send(SyncUpdate::Arrived(record));
            }
        }
        self.notify_store(inner);
    }

    fn apply_read(&self, inner: &mut Inner, id: &str) {
        inner.pending_reads.remove(id);
        self.record_replay(inner, Replay::Read(id.to_string()));
        if inner.store.mark_read(id) {
            self.notify_store(inner);
        }
    }

    fn apply_deleted(&self, inner: &mut Inner, id: &str) {
        // 服务端确认删除后，本地的回滚信息全部作废
        inner.pending_reads.remove(id);
        inner.pending_deletes.remove(id);
        self.record_replay(inner, Replay::Removed(id.to_string()));
        if inner.store.remove(id).is_some() {
            self.notify_store(inner);
        }
    }

    // ========================================================================
    // REST 操作
    // ========================================================================

    /// 拉取全量快照并替换存储
    ///
    /// 失败时存储保持不变，错误写入横幅。
    pub async fn fetch_all(&self) -> ClientResult<FetchOutcome> {
        let (epoch, seq) = {
            let mut inner = self.lock();
            self.ensure_mounted(&inner)?;
            inner.fetch_seq += 1;
            inner.fetch_in_flight = true;
            (inner.epoch, inner.fetch_seq)
        };
        debug!(user_id = %self.shared.user_id, seq, "Fetching baseline");

        let result = self
            .shared
            .api
            .fetch_all(&self.shared.user_id, self.shared.page_size)
            .await;

        let snapshot = {
            let mut inner = self.lock();
            if inner.closed || inner.epoch != epoch || inner.fetch_seq != seq {
                debug!(user_id = %self.shared.user_id, seq, "Discarding stale baseline");
                return Ok(FetchOutcome::Discarded);
            }
            inner.fetch_in_flight = false;

            let records = match result {
                Ok(records) => records,
                Err(e) => {
                    inner.replay.clear();
                    warn!(user_id = %self.shared.user_id, operation = "fetch_all", error = %e, "Baseline fetch failed");
                    let error = ClientError::from(e);
                    self.raise(&mut inner, error.clone());
                    return Err(error);
                }
            };

            let records: Vec<Notification> = records
                .into_iter()
                .filter_map(|n| match self.claim(n) {
                    Ok(n) => Some(n),
                    Err(e) => {
                        warn!(user_id = %self.shared.user_id, error = %e, "Dropping foreign record from baseline");
                        None
                    }
                })
                .collect();
            inner.store.replace_all(records);

            let replay = std::mem::take(&mut inner.replay);
            let replayed = replay.len();
            for (tag, entry) in replay {
                if tag < seq {
                    continue;
                }
                match entry {
                    Replay::Upsert(record) => {
                        inner.store.reconcile(record);
                    }
                    Replay::Read(id) => {
                        inner.store.mark_read(&id);
                    }
                    Replay::Removed(id) => {
                        inner.store.remove(&id);
                    }
                }
            }

            // 仍在途的乐观更新优先于快照
            let pending_reads: Vec<String> = inner.pending_reads.iter().cloned().collect();
            for id in pending_reads {
                inner.store.mark_read(&id);
            }
            let pending_deletes: Vec<String> = inner.pending_deletes.keys().cloned().collect();
            for id in pending_deletes {
                inner.store.remove(&id);
            }

            info!(
                user_id = %self.shared.user_id,
                count = inner.store.len(),
                unread = inner.store.unread_count(),
                replayed,
                "Baseline applied"
            );
            self.notify_store(&inner);
            inner.store.as_slice().to_vec()
        };

        if let Some(cache) = &self.shared.cache {
            if let Err(e) = cache.save(&self.shared.user_id, &snapshot) {
                warn!(user_id = %self.shared.user_id, error = %e, "Failed to write snapshot cache");
            }
        }
        Ok(FetchOutcome::Applied { count: snapshot.len() })
    }

    /// 乐观标记已读
    ///
    /// 请求失败时回滚到调用前的状态；期间若已收到推送的已读或删除，以推送为准不回滚。
    pub async fn mark_as_read(&self, id: &str) -> ClientResult<()> {
        let (epoch, optimistic) = {
            let mut inner = self.lock();
            self.ensure_mounted(&inner)?;
            if inner.store.get(id).map(|n| n.read).unwrap_or(false) {
                debug!(id, "Already read, skipping request");
                return Ok(());
            }
            let optimistic = inner.store.mark_read(id);
            if optimistic {
                inner.pending_reads.insert(id.to_string());
                self.record_replay(&mut inner, Replay::Read(id.to_string()));
                self.notify_store(&inner);
            }
            (inner.epoch, optimistic)
        };

        let result = self.shared.api.mark_read(&self.shared.user_id, id).await;

        let conflict = {
            let mut inner = self.lock();
            if inner.closed || inner.epoch != epoch {
                return result.map(|_| ()).map_err(ClientError::from);
            }
            let still_pending = inner.pending_reads.remove(id);

            let error = match result {
                Ok(updated) => {
                    // 服务端已确认，在途快照可能早于这次写入
                    self.record_replay(&mut inner, Replay::Read(id.to_string()));
                    if let Some(record) = updated.filter(|r| r.id == id) {
                        if inner.store.contains(id) {
                            if let Ok(record) = self.claim(record) {
                                inner.store.reconcile(record);
                            }
                        }
                    }
                    debug!(user_id = %self.shared.user_id, id, "Marked as read");
                    return Ok(());
                }
                Err(e) => e,
            };

            if optimistic && still_pending {
                inner
                    .replay
                    .retain(|(_, entry)| !matches!(entry, Replay::Read(r) if r == id));
                if inner.store.mark_unread(id) {
                    self.notify_store(&inner);
                }
            }
            warn!(
                user_id = %self.shared.user_id,
                id,
                operation = "mark_read",
                error = %error,
                rolled_back = optimistic && still_pending,
                "Mark as read failed"
            );

            if !error.is_conflict() {
                let error = ClientError::from(error);
                self.raise(&mut inner, error.clone());
                return Err(error);
            }
            let conflict = ClientError::Conflict {
                operation: "mark_read",
                id: id.to_string(),
                reason: error.to_string(),
            };
            self.raise(&mut inner, conflict.clone());
            conflict
        };

        self.resync_after_conflict().await;
        Err(conflict)
    }

    /// 把所有未读标记为已读（并发请求，逐条汇报失败）
    pub async fn mark_all_read(&self) -> MarkAllReport {
        let ids = self.lock().store.unread_ids();
        let results = join_all(ids.iter().map(|id| self.mark_as_read(id))).await;

        let mut report = MarkAllReport::default();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(()) => report.marked.push(id),
                Err(e) => report.failed.push((id, e)),
            }
        }
        info!(
            user_id = %self.shared.user_id,
            marked = report.marked.len(),
            failed = report.failed.len(),
            "Mark all read finished"
        );
        report
    }

    /// 乐观删除
    ///
    /// 删除前缓存原位置，普通失败时原样恢复；服务端已不存在（冲突）时不恢复，改为重新拉取。
    pub async fn delete(&self, id: &str) -> ClientResult<()> {
        let epoch = {
            let mut inner = self.lock();
            self.ensure_mounted(&inner)?;
            if let Some((index, record)) = inner.store.remove(id) {
                inner.pending_reads.remove(id);
                inner.pending_deletes.insert(id.to_string(), (index, record));
                self.record_replay(&mut inner, Replay::Removed(id.to_string()));
                self.notify_store(&inner);
            }
            inner.epoch
        };

        let result = self.shared.api.delete(&self.shared.user_id, id).await;

        let conflict = {
            let mut inner = self.lock();
            if inner.closed || inner.epoch != epoch {
                return result.map_err(ClientError::from);
            }
            let cached = inner.pending_deletes.remove(id);

            let error = match result {
                Ok(()) => {
                    self.record_replay(&mut inner, Replay::Removed(id.to_string()));
                    debug!(user_id = %self.shared.user_id, id, "Deleted");
                    return Ok(());
                }
                Err(e) => e,
            };

            if error.is_conflict() {
                warn!(user_id = %self.shared.user_id, id, operation = "delete", error = %error, "Delete rejected, record already gone");
                let conflict = ClientError::Conflict {
                    operation: "delete",
                    id: id.to_string(),
                    reason: error.to_string(),
                };
                self.raise(&mut inner, conflict.clone());
                conflict
            } else {
                let restored = match cached {
                    Some((index, record)) => {
                        inner
                            .replay
                            .retain(|(_, entry)| !matches!(entry, Replay::Removed(r) if r == id));
                        inner.store.restore(index, record)
                    }
                    None => false,
                };
                if restored {
                    self.notify_store(&inner);
                }
                warn!(user_id = %self.shared.user_id, id, operation = "delete", error = %error, restored, "Delete failed");
                let error = ClientError::from(error);
                self.raise(&mut inner, error.clone());
                return Err(error);
            }
        };

        self.resync_after_conflict().await;
        Err(conflict)
    }

    /// 打开详情：拉取单条记录，已在列表中时合并更新
    pub async fn open_detail(&self, id: &str) -> ClientResult<Notification> {
        let epoch = {
            let inner = self.lock();
            self.ensure_mounted(&inner)?;
            inner.epoch
        };

        let result = self.shared.api.fetch_detail(&self.shared.user_id, id).await;

        let mut inner = self.lock();
        let current = !inner.closed && inner.epoch == epoch;
        match result {
            Ok(record) => {
                let record = self.claim(record)?;
                if current && inner.store.contains(&record.id) {
                    inner.store.upsert(record.clone());
                    self.notify_store(&inner);
                }
                Ok(record)
            }
            Err(e) if e.is_conflict() => {
                if current && inner.store.remove(id).is_some() {
                    self.notify_store(&inner);
                }
                warn!(user_id = %self.shared.user_id, id, operation = "fetch_detail", error = %e, "Notification no longer exists");
                Err(ClientError::Conflict {
                    operation: "fetch_detail",
                    id: id.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                warn!(user_id = %self.shared.user_id, id, operation = "fetch_detail", error = %e, "Detail fetch failed");
                let error = ClientError::from(e);
                if current {
                    self.raise(&mut inner, error.clone());
                }
                Err(error)
            }
        }
    }

    /// 查询服务端未读数（诊断用，本地计数器仍是 UI 的依据）
    pub async fn server_unread_count(&self) -> ClientResult<usize> {
        let count = self.shared.api.unread_count(&self.shared.user_id).await?;
        let local = self.lock().store.unread_count();
        if count != local {
            warn!(user_id = %self.shared.user_id, server = count, local, "Unread count mismatch");
        }
        Ok(count)
    }

    async fn resync_after_conflict(&self) {
        if let Err(e) = self.fetch_all().await {
            warn!(user_id = %self.shared.user_id, error = %e, "Resync after conflict failed");
        }
    }

    // ========================================================================
    // 内部工具
    // ========================================================================

    fn ensure_mounted(&self, inner: &Inner) -> ClientResult<()> {
        if inner.closed {
            return Err(ClientError::Unmounted {
                user_id: self.shared.user_id.clone(),
            });
        }
        Ok(())
    }

    /// 校验记录归属；空 userId 归属于当前会话用户
    fn claim(&self, mut record: Notification) -> ClientResult<Notification> {
        if record.user_id.is_empty() {
            record.user_id = self.shared.user_id.clone();
            return Ok(record);
        }
        if record.user_id != self.shared.user_id {
            return Err(ClientError::ForeignRecord {
                id: record.id,
                owner: record.user_id,
                user_id: self.shared.user_id.clone(),
            });
        }
        Ok(record)
    }

    fn record_replay(&self, inner: &mut Inner, entry: Replay) {
        if inner.fetch_in_flight {
            let seq = inner.fetch_seq;
            inner.replay.push((seq, entry));
        }
    }

    fn set_state(&self, inner: &mut Inner, state: SyncState) {
        if inner.state == state {
            return;
        }
        info!(user_id = %self.shared.user_id, from = %inner.state, to = %state, "Sync state changed");
        inner.state = state;
        let _ = self.shared.updates.send(SyncUpdate::StateChanged(state));
    }

    fn notify_store(&self, inner: &Inner) {
        let _ = self.shared.updates.send(SyncUpdate::StoreChanged {
            unread: inner.store.unread_count(),
            total: inner.store.len(),
        });
    }

    fn raise(&self, inner: &mut Inner, error: ClientError) {
        let banner = ErrorBanner::new(error);
        inner.last_error = Some(banner.clone());
        let _ = self.shared.updates.send(SyncUpdate::Error(banner));
    }
}
