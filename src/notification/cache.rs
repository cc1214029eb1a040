//! 快照缓存 - 本地 JSONL 文件读写
//!
//! 保存最近一次成功拉取的基线，挂载时先加载，让 UI 在首次拉取完成前
//! 就能显示上次已知的状态。

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::model::Notification;

/// 单用户最多缓存的记录数
const MAX_CACHED: usize = 200;

/// 快照缓存
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    dir: PathBuf,
}

impl SnapshotCache {
    /// 默认缓存目录 `~/.config/rental-notify/cache`
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("rental-notify")
            .join("cache")
    }

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 用户对应的缓存文件路径
    pub fn path_for(&self, user_id: &str) -> PathBuf {
        let safe: String = user_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.jsonl", safe))
    }

    /// 写入快照（带文件锁，临时文件 + 原子替换）
    pub fn save(&self, user_id: &str, records: &[Notification]) -> Result<()> {
        use fs2::FileExt;

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create cache dir {}", self.dir.display()))?;

        let path = self.path_for(user_id);
        let lock_path = path.with_extension("lock");
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;
        lock.lock_exclusive()?;

        let temp_path = path.with_extension("tmp");
        let written = (|| -> Result<()> {
            let mut temp_file = File::create(&temp_path)?;
            for record in records.iter().take(MAX_CACHED) {
                writeln!(temp_file, "{}", serde_json::to_string(record)?)?;
            }
            temp_file.sync_all()?;
            fs::rename(&temp_path, &path)?;
            Ok(())
        })();

        lock.unlock()?;
        written?;

        debug!(user_id = %user_id, count = records.len().min(MAX_CACHED), "Snapshot cached");
        Ok(())
    }

    /// 读取快照；文件不存在时返回空列表，损坏的行被跳过
    pub fn load(&self, user_id: &str) -> Vec<Notification> {
        let path = self.path_for(user_id);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };

        let reader = BufReader::new(file);
        let mut skipped = 0usize;
        let records: Vec<Notification> = reader
            .lines()
            .map_while(|line| line.ok())
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(&line) {
                Ok(record) => Some(record),
                Err(_) => {
                    skipped += 1;
                    None
                }
            })
            .collect();

        if skipped > 0 {
            warn!(user_id = %user_id, skipped, "Skipped unreadable cached notifications");
        }
        records
    }

    /// 删除某用户的快照
    pub fn clear(&self, user_id: &str) -> Result<()> {
        let path = self.path_for(user_id);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::model::NotificationKind;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(id: &str) -> Notification {
        Notification::new(id, "u1", NotificationKind::DepositReceived, Utc::now())
            .with_title("Depósito recibido")
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());
        assert!(cache.load("nobody").is_empty());
    }

    #[test]
    fn test_save_then_load_preserves_order() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path().join("nested"));
        cache.save("u1", &[record("b"), record("a")]).unwrap();

        let loaded = cache.load("u1");
        let ids: Vec<&str> = loaded.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(loaded[0].title, "Depósito recibido");
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());
        cache.save("u1", &[record("a"), record("b")]).unwrap();
        cache.save("u1", &[record("c")]).unwrap();
        assert_eq!(cache.load("u1").len(), 1);
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());
        cache.save("u1", &[record("a")]).unwrap();

        let path = cache.path_for("u1");
        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str("{not json\n");
        fs::write(&path, content).unwrap();

        assert_eq!(cache.load("u1").len(), 1);
    }

    #[test]
    fn test_path_sanitizes_user_id() {
        let cache = SnapshotCache::new("/tmp/x");
        let path = cache.path_for("../etc/passwd");
        assert_eq!(path, PathBuf::from("/tmp/x/___etc_passwd.jsonl"));
    }

    #[test]
    fn test_clear_removes_snapshot() {
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());
        cache.save("u1", &[record("a")]).unwrap();
        cache.clear("u1").unwrap();
        assert!(cache.load("u1").is_empty());
        cache.clear("u1").unwrap();
    }
}
