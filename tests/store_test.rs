//! 通知存储不变量测试：任意操作序列后计数不漂移、id 不重复

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use rental_notify::notification::{MergePolicy, Notification, NotificationKind, NotificationStore};

/// 固定种子的线性同余序列，保证用例可复现
struct Sequence(u64);

impl Sequence {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

fn record(id: u64, minute: u64, read: bool) -> Notification {
    let created = Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap() + chrono::Duration::minutes(minute as i64);
    let n = Notification::new(format!("n{}", id), "u1", NotificationKind::RentalEnded, created);
    if read {
        n.mark_read_at(created + chrono::Duration::seconds(30))
    } else {
        n
    }
}

fn assert_invariants(store: &NotificationStore) {
    assert_eq!(store.unread_count(), store.recount());
    let unique: HashSet<&str> = store.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(unique.len(), store.len());
}

fn run_mixed_sequence(policy: MergePolicy, seed: u64) {
    let mut store = NotificationStore::with_policy(policy);
    let mut seq = Sequence(seed);
    let mut removed: Vec<(usize, Notification)> = Vec::new();

    for step in 0..500 {
        let id = seq.next(12);
        match seq.next(7) {
            0 => {
                store.upsert(record(id, seq.next(60), seq.next(4) == 0));
            }
            1 => {
                store.reconcile(record(id, seq.next(60), seq.next(3) == 0));
            }
            2 => {
                store.mark_read(&format!("n{}", id));
            }
            3 => {
                store.mark_unread(&format!("n{}", id));
            }
            4 => {
                if let Some(entry) = store.remove(&format!("n{}", id)) {
                    removed.push(entry);
                }
            }
            5 => {
                if let Some((index, record)) = removed.pop() {
                    store.restore(index, record);
                }
            }
            _ => {
                if step % 50 == 0 {
                    let batch = (0..seq.next(8)).map(|i| record(i, seq.next(60), i % 2 == 0)).collect();
                    store.replace_all(batch);
                    removed.clear();
                }
            }
        }
        assert_invariants(&store);
    }
}

#[test]
fn test_mixed_operations_keep_counter_exact() {
    for seed in [1, 7, 42, 2026] {
        run_mixed_sequence(MergePolicy::KeepPosition, seed);
        run_mixed_sequence(MergePolicy::MoveToHead, seed);
    }
}

#[test]
fn test_duplicate_creates_are_absorbed() {
    // Given: 同一条通知被推送三次
    let mut store = NotificationStore::new();
    for _ in 0..3 {
        store.upsert(record(1, 5, false));
    }

    // Then: 只有一条，只计一次未读
    assert_eq!(store.len(), 1);
    assert_eq!(store.unread_count(), 1);
}

#[test]
fn test_remove_then_restore_is_exact_inverse() {
    let mut store = NotificationStore::new();
    store.replace_all((0..5).map(|i| record(i, i, i == 2)).collect());
    let before = store.as_slice().to_vec();
    let unread_before = store.unread_count();

    for id in ["n0", "n2", "n4"] {
        let (index, record) = store.remove(id).unwrap();
        assert!(store.restore(index, record));
        assert_eq!(store.as_slice(), before.as_slice());
        assert_eq!(store.unread_count(), unread_before);
    }
}

#[test]
fn test_read_state_never_regresses_through_upsert() {
    let mut store = NotificationStore::new();
    store.upsert(record(1, 5, false));
    store.mark_read("n1");

    // 晚到的旧版本（未读）不会把记录变回未读
    store.upsert(record(1, 5, false));
    assert!(store.get("n1").unwrap().read);
    assert_eq!(store.unread_count(), 0);
}
