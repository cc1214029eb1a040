//! 重连退避策略
//!
//! `delay = min(base * 2^attempt, cap)`，尝试次数用尽后放弃并上报终止错误；
//! 每次连接成功后计数归零（由适配器负责）。

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认初始延迟
pub const DEFAULT_BASE: Duration = Duration::from_secs(1);
/// 默认延迟上限
pub const DEFAULT_CAP: Duration = Duration::from_secs(30);
/// 默认最大重连次数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// 指数退避重连策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            cap: DEFAULT_CAP,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap: cap.max(base),
            max_attempts,
        }
    }

    /// 第 `attempt` 次重连（从 0 开始）前的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.cap)
            .min(self.cap)
    }

    /// 已失败 `attempt` 次后是否还应继续重试
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_observed_values() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base, Duration::from_secs(1));
        assert_eq!(policy.cap, Duration::from_secs(30));
        assert_eq!(policy.max_attempts, 5);
    }

    #[test]
    fn test_delay_doubles_then_caps() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..7).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn test_delay_does_not_overflow() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(64), Duration::from_secs(30));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_should_retry_bounded() {
        let policy = ReconnectPolicy::new(Duration::from_millis(10), Duration::from_millis(50), 3);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_cap_never_below_base() {
        let policy = ReconnectPolicy::new(Duration::from_secs(5), Duration::from_secs(1), 1);
        assert_eq!(policy.cap, Duration::from_secs(5));
        assert_eq!(policy.delay_for(3), Duration::from_secs(5));
    }
}
