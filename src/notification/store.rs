//! 通知存储 - 单个用户的内存通知列表
//!
//! 列表和未读计数的唯一真相来源。同步控制器只通过这里的操作修改状态，
//! 不直接操作内部数组或计数器。
//!
//! 未读计数作为字段维护（O(1) 读取），每次记录变更时同步调整；
//! `recount()` 提供全量扫描结果用于校验。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::Notification;

/// 已存在记录被更新时的位置策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// 原位替换
    #[default]
    KeepPosition,
    /// 新记录 `created_at` 严格更新且不会把已读变回未读时，移到列表头部
    MoveToHead,
}

impl MergePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('_', "-").as_str() {
            "keep-position" | "keep" => Some(MergePolicy::KeepPosition),
            "move-to-head" | "move-to-top" | "move" => Some(MergePolicy::MoveToHead),
            _ => None,
        }
    }
}

/// upsert / reconcile 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// 新 id，已插入
    Inserted,
    /// 已存在，原位更新
    Updated,
    /// 已存在，更新并移到头部
    Moved,
    /// 已存在且现有记录更新，未做修改
    Unchanged,
}

impl UpsertOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted)
    }
}

/// 单用户通知存储
#[derive(Debug, Clone, Default)]
pub struct NotificationStore {
    items: Vec<Notification>,
    unread: usize,
    policy: MergePolicy,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: MergePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// 用 REST 全量结果替换整个列表
    ///
    /// 按 `created_at` 降序排列，重复 id 只保留较新的那条，未读数全量重算。
    pub fn replace_all(&mut self, records: Vec<Notification>) {
        let mut items: Vec<Notification> = Vec::with_capacity(records.len());
        for record in records {
            match items.iter().position(|n| n.id == record.id) {
                Some(i) => {
                    if record.supersedes(&items[i]) {
                        items[i] = record;
                    }
                }
                None => items.push(record),
            }
        }
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        self.unread = items.iter().filter(|n| !n.read).count();
        self.items = items;
        self.debug_check();
    }

    /// 插入或更新
    ///
    /// 新 id 插到头部；已存在的 id 按 `MergePolicy` 原位替换或移到头部。
    /// 已读状态单调：传入未读记录不会把已读记录变回未读。
    pub fn upsert(&mut self, record: Notification) -> UpsertOutcome {
        let Some(i) = self.position(&record.id) else {
            if !record.read {
                self.unread += 1;
            }
            self.items.insert(0, record);
            self.debug_check();
            return UpsertOutcome::Inserted;
        };

        let existing = &self.items[i];
        let regresses_read = existing.read && !record.read;
        let strictly_newer = record.created_at > existing.created_at;
        let was_unread = !existing.read;

        let mut incoming = record;
        if regresses_read {
            incoming.read = true;
            incoming.read_at = existing.read_at;
        }
        self.adjust(was_unread, !incoming.read);

        let outcome = if self.policy == MergePolicy::MoveToHead && strictly_newer && !regresses_read {
            self.items.remove(i);
            self.items.insert(0, incoming);
            UpsertOutcome::Moved
        } else {
            self.items[i] = incoming;
            UpsertOutcome::Updated
        };
        self.debug_check();
        outcome
    }

    /// 合并（取并集，保留较新的版本）
    ///
    /// 用于全量拉取后回放期间收到的推送：新 id 插到按 `created_at` 排序的位置，
    /// 已存在时只有传入记录更新（`Notification::supersedes`）才替换。
    pub fn reconcile(&mut self, record: Notification) -> UpsertOutcome {
        match self.position(&record.id) {
            None => {
                let pos = self
                    .items
                    .iter()
                    .position(|n| n.created_at < record.created_at)
                    .unwrap_or(self.items.len());
                if !record.read {
                    self.unread += 1;
                }
                self.items.insert(pos, record);
                self.debug_check();
                UpsertOutcome::Inserted
            }
            Some(i) => {
                if !record.supersedes(&self.items[i]) {
                    return UpsertOutcome::Unchanged;
                }
                let was_unread = !self.items[i].read;
                self.adjust(was_unread, !record.read);
                self.items[i] = record;
                self.debug_check();
                UpsertOutcome::Updated
            }
        }
    }

    /// 标记已读，返回是否发生了变更
    pub fn mark_read(&mut self, id: &str) -> bool {
        self.mark_read_at(id, Utc::now())
    }

    pub fn mark_read_at(&mut self, id: &str, at: DateTime<Utc>) -> bool {
        let Some(n) = self.items.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if n.read {
            return false;
        }
        n.read = true;
        n.read_at = Some(at);
        self.unread -= 1;
        self.debug_check();
        true
    }

    /// 撤销失败的乐观已读（仅回滚路径使用）
    pub fn mark_unread(&mut self, id: &str) -> bool {
        let Some(n) = self.items.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if !n.read {
            return false;
        }
        n.read = false;
        n.read_at = None;
        self.unread += 1;
        self.debug_check();
        true
    }

    /// 删除记录，返回 (原位置, 记录) 以便失败时原样恢复
    pub fn remove(&mut self, id: &str) -> Option<(usize, Notification)> {
        let i = self.position(id)?;
        let removed = self.items.remove(i);
        if !removed.read {
            self.unread -= 1;
        }
        self.debug_check();
        Some((i, removed))
    }

    /// 把删除失败的记录放回原位置（越界时放到末尾）；id 已存在时不做任何事
    pub fn restore(&mut self, index: usize, record: Notification) -> bool {
        if self.position(&record.id).is_some() {
            return false;
        }
        if !record.read {
            self.unread += 1;
        }
        let index = index.min(self.items.len());
        self.items.insert(index, record);
        self.debug_check();
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.unread = 0;
    }

    /// 维护的未读计数（O(1)）
    pub fn unread_count(&self) -> usize {
        self.unread
    }

    /// 全量扫描得到的未读数
    pub fn recount(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    /// 计数器是否与实际内容一致
    pub fn is_consistent(&self) -> bool {
        self.unread == self.recount()
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Notification] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 所有未读 id（按列表顺序）
    pub fn unread_ids(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|n| !n.read)
            .map(|n| n.id.clone())
            .collect()
    }

    fn adjust(&mut self, was_unread: bool, now_unread: bool) {
        match (was_unread, now_unread) {
            (true, false) => self.unread -= 1,
            (false, true) => self.unread += 1,
            _ => {}
        }
    }

    fn debug_check(&self) {
        debug_assert!(
            self.is_consistent(),
            "unread counter drifted: counter={} actual={}",
            self.unread,
            self.recount()
        );
    }
}
