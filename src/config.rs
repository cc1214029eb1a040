//! 客户端配置
//!
//! 读取优先级（高 → 低）：
//! 1. 命令行参数（由 CLI 层覆盖）
//! 2. 环境变量 `RENTAL_NOTIFY_*`
//! 3. 配置文件 `~/.config/rental-notify/config.json`（所有字段可选）
//! 4. 默认值

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::notification::MergePolicy;
use crate::transport::backoff::ReconnectPolicy;

/// 默认 REST 地址
pub const DEFAULT_API_URL: &str = "http://localhost:3001";
/// 默认心跳间隔
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);
/// 默认请求超时
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// 下拉框默认显示条数
pub const DEFAULT_DROPDOWN_SIZE: usize = 3;
/// Toast 默认显示时长
pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(3000);

/// 推送通道类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    WebSocket,
    Sse,
}

impl TransportKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "ws" | "wss" | "websocket" => Some(TransportKind::WebSocket),
            "sse" | "eventsource" | "event-source" => Some(TransportKind::Sse),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::WebSocket => "websocket",
            TransportKind::Sse => "sse",
        }
    }
}

/// 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST 基础 URL
    pub api_base_url: String,
    /// 推送地址（可含 `{userId}` 占位符），缺省时由 REST 地址推导
    pub push_url: Option<String>,
    pub transport: TransportKind,
    /// 当前用户
    pub user_id: Option<String>,
    /// Bearer token
    pub access_token: Option<String>,
    pub reconnect: ReconnectPolicy,
    pub heartbeat_interval: Duration,
    pub request_timeout: Duration,
    pub merge_policy: MergePolicy,
    pub dropdown_size: usize,
    pub page_size: usize,
    pub toast_duration: Duration,
    pub cache_enabled: bool,
    /// 快照缓存目录（缺省 `~/.config/rental-notify/cache`）
    pub cache_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            push_url: None,
            transport: TransportKind::default(),
            user_id: None,
            access_token: None,
            reconnect: ReconnectPolicy::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            merge_policy: MergePolicy::default(),
            dropdown_size: DEFAULT_DROPDOWN_SIZE,
            page_size: crate::notification::DEFAULT_PAGE_SIZE,
            toast_duration: DEFAULT_TOAST_DURATION,
            cache_enabled: true,
            cache_dir: None,
        }
    }
}

/// 配置文件格式
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    api_url: Option<String>,
    push_url: Option<String>,
    transport: Option<String>,
    user_id: Option<String>,
    access_token: Option<String>,
    reconnect_base_ms: Option<u64>,
    reconnect_cap_ms: Option<u64>,
    max_reconnect_attempts: Option<u32>,
    heartbeat_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    merge_policy: Option<String>,
    dropdown_size: Option<usize>,
    page_size: Option<usize>,
    toast_ms: Option<u64>,
    cache_enabled: Option<bool>,
    cache_dir: Option<PathBuf>,
}

impl ClientConfig {
    /// 默认配置文件路径
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("rental-notify")
            .join("config.json")
    }

    /// 从配置文件和环境变量自动加载
    pub fn auto_load() -> Result<Self> {
        let mut config = Self::load_file(&Self::default_path())?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// 读取配置文件；文件不存在时返回默认配置
    pub fn load_file(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        if !path.exists() {
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let file: FileConfig = serde_json::from_str(&content)
            .with_context(|| format!("parse config {}", path.display()))?;
        config.merge_file(file)?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    fn merge_file(&mut self, file: FileConfig) -> Result<()> {
        if let Some(url) = file.api_url.filter(|u| !u.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(url) = file.push_url.filter(|u| !u.is_empty()) {
            self.push_url = Some(url);
        }
        if let Some(raw) = file.transport {
            self.transport = TransportKind::parse(&raw)
                .ok_or_else(|| anyhow!("unknown transport in config: {}", raw))?;
        }
        if let Some(user) = file.user_id.filter(|u| !u.is_empty()) {
            self.user_id = Some(user);
        }
        if let Some(token) = file.access_token.filter(|t| !t.is_empty()) {
            self.access_token = Some(token);
        }

        let base = file
            .reconnect_base_ms
            .map(Duration::from_millis)
            .unwrap_or(self.reconnect.base);
        let cap = file
            .reconnect_cap_ms
            .map(Duration::from_millis)
            .unwrap_or(self.reconnect.cap);
        let attempts = file.max_reconnect_attempts.unwrap_or(self.reconnect.max_attempts);
        self.reconnect = ReconnectPolicy::new(base, cap, attempts);

        if let Some(secs) = file.heartbeat_secs.filter(|s| *s > 0) {
            self.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = file.request_timeout_secs.filter(|s| *s > 0) {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = file.merge_policy {
            self.merge_policy = MergePolicy::parse(&raw)
                .ok_or_else(|| anyhow!("unknown merge_policy in config: {}", raw))?;
        }
        if let Some(n) = file.dropdown_size.filter(|n| *n > 0) {
            self.dropdown_size = n;
        }
        if let Some(n) = file.page_size.filter(|n| *n > 0) {
            self.page_size = n;
        }
        if let Some(ms) = file.toast_ms {
            self.toast_duration = Duration::from_millis(ms);
        }
        if let Some(enabled) = file.cache_enabled {
            self.cache_enabled = enabled;
        }
        if let Some(dir) = file.cache_dir {
            self.cache_dir = Some(dir);
        }
        Ok(())
    }

    /// 应用环境变量覆盖（`lookup` 便于测试注入）
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("RENTAL_NOTIFY_API_URL") {
            self.api_base_url = url;
        }
        if let Some(url) = get("RENTAL_NOTIFY_PUSH_URL") {
            self.push_url = Some(url);
        }
        if let Some(raw) = get("RENTAL_NOTIFY_TRANSPORT") {
            self.transport = TransportKind::parse(&raw)
                .ok_or_else(|| anyhow!("unknown RENTAL_NOTIFY_TRANSPORT: {}", raw))?;
        }
        if let Some(user) = get("RENTAL_NOTIFY_USER_ID") {
            self.user_id = Some(user);
        }
        if let Some(token) = get("RENTAL_NOTIFY_TOKEN") {
            self.access_token = Some(token);
        }
        Ok(())
    }

    /// 快照缓存目录
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(crate::notification::SnapshotCache::default_dir)
    }

    /// 解析指定用户的推送地址
    ///
    /// - 显式配置：替换 `{userId}` 占位符
    /// - WebSocket：`ws(s)://<api host>/ws?userId=<id>`
    /// - SSE：`<api>/notifications/sse/<id>`
    pub fn push_url_for(&self, user_id: &str) -> Result<Url> {
        if let Some(template) = &self.push_url {
            let raw = template.replace("{userId}", user_id);
            return Url::parse(&raw).with_context(|| format!("invalid push url: {}", raw));
        }

        let mut url = Url::parse(&self.api_base_url)
            .with_context(|| format!("invalid api url: {}", self.api_base_url))?;
        match self.transport {
            TransportKind::WebSocket => {
                let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
                url.set_scheme(scheme)
                    .map_err(|_| anyhow!("cannot derive websocket url from {}", self.api_base_url))?;
                url.path_segments_mut()
                    .map_err(|_| anyhow!("api url cannot be a base: {}", self.api_base_url))?
                    .pop_if_empty()
                    .push("ws");
                url.query_pairs_mut().append_pair("userId", user_id);
            }
            TransportKind::Sse => {
                url.path_segments_mut()
                    .map_err(|_| anyhow!("api url cannot be a base: {}", self.api_base_url))?
                    .pop_if_empty()
                    .extend(["notifications", "sse", user_id]);
            }
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:3001");
        assert_eq!(config.transport, TransportKind::WebSocket);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.dropdown_size, 3);
        assert_eq!(config.page_size, 20);
        assert_eq!(config.merge_policy, MergePolicy::KeepPosition);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ClientConfig::load_file(&dir.path().join("none.json")).unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_file_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "api_url": "https://api.rentacar.test",
                "transport": "sse",
                "user_id": "u-42",
                "reconnect_base_ms": 500,
                "reconnect_cap_ms": 8000,
                "max_reconnect_attempts": 3,
                "merge_policy": "move-to-head",
                "dropdown_size": 5
            }"#,
        )
        .unwrap();

        let config = ClientConfig::load_file(&path).unwrap();
        assert_eq!(config.api_base_url, "https://api.rentacar.test");
        assert_eq!(config.transport, TransportKind::Sse);
        assert_eq!(config.user_id.as_deref(), Some("u-42"));
        assert_eq!(config.reconnect.base, Duration::from_millis(500));
        assert_eq!(config.reconnect.cap, Duration::from_millis(8000));
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.merge_policy, MergePolicy::MoveToHead);
        assert_eq!(config.dropdown_size, 5);
        assert_eq!(config.page_size, 20);
    }

    #[test]
    fn test_file_rejects_unknown_transport() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"transport": "carrier-pigeon"}"#).unwrap();
        assert!(ClientConfig::load_file(&path).is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("RENTAL_NOTIFY_API_URL", "http://env.test:8080"),
            ("RENTAL_NOTIFY_USER_ID", "u-env"),
            ("RENTAL_NOTIFY_TRANSPORT", "eventsource"),
            ("RENTAL_NOTIFY_TOKEN", ""),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.api_base_url, "http://env.test:8080");
        assert_eq!(config.user_id.as_deref(), Some("u-env"));
        assert_eq!(config.transport, TransportKind::Sse);
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_push_url_derivation() {
        let mut config = ClientConfig {
            api_base_url: "https://api.rentacar.test/".to_string(),
            ..Default::default()
        };
        let ws = config.push_url_for("u1").unwrap();
        assert_eq!(ws.as_str(), "wss://api.rentacar.test/ws?userId=u1");

        config.transport = TransportKind::Sse;
        let sse = config.push_url_for("u1").unwrap();
        assert_eq!(sse.as_str(), "https://api.rentacar.test/notifications/sse/u1");

        config.push_url = Some("ws://push.test/stream/{userId}".to_string());
        let explicit = config.push_url_for("u9").unwrap();
        assert_eq!(explicit.as_str(), "ws://push.test/stream/u9");
    }
}
