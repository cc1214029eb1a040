//! 全局参数与命令上下文

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Args;

use crate::api::HttpNotificationApi;
use crate::config::{ClientConfig, TransportKind};
use crate::sync::{ControllerOptions, SyncController};
use crate::transport::{PushConnector, SseConnector, WsConnector};

/// 所有子命令共享的参数（优先级高于环境变量和配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// REST 基础 URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// 推送地址（可含 {userId} 占位符）
    #[arg(long, global = true)]
    pub push_url: Option<String>,

    /// 用户 ID
    #[arg(long, short, global = true)]
    pub user: Option<String>,

    /// 推送通道: websocket, sse
    #[arg(long, global = true)]
    pub transport: Option<String>,

    /// Bearer token
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// 配置文件路径（默认 ~/.config/rental-notify/config.json）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl GlobalArgs {
    /// 按 参数 > 环境变量 > 配置文件 > 默认值 解析配置
    pub fn resolve(&self) -> Result<ClientConfig> {
        let path = self.config.clone().unwrap_or_else(ClientConfig::default_path);
        let mut config = ClientConfig::load_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        self.apply(&mut config)?;
        Ok(config)
    }

    fn apply(&self, config: &mut ClientConfig) -> Result<()> {
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(url) = &self.push_url {
            config.push_url = Some(url.clone());
        }
        if let Some(user) = &self.user {
            config.user_id = Some(user.clone());
        }
        if let Some(raw) = &self.transport {
            config.transport =
                TransportKind::parse(raw).ok_or_else(|| anyhow!("不支持的推送通道: {}，可选: websocket, sse", raw))?;
        }
        if let Some(token) = &self.token {
            config.access_token = Some(token.clone());
        }
        Ok(())
    }
}

/// 命令执行上下文
pub struct CliContext {
    pub config: ClientConfig,
    pub user_id: String,
    pub api: Arc<HttpNotificationApi>,
}

impl CliContext {
    pub fn new(args: &GlobalArgs) -> Result<Self> {
        let config = args.resolve()?;
        let user_id = config
            .user_id
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| anyhow!("缺少用户 ID：使用 --user 或设置 RENTAL_NOTIFY_USER_ID"))?;
        let api = HttpNotificationApi::new(&config).context("创建 REST 客户端失败")?;
        Ok(Self {
            config,
            user_id,
            api: Arc::new(api),
        })
    }

    /// 不挂载推送通道的一次性控制器
    pub fn controller(&self) -> SyncController {
        SyncController::new(
            self.user_id.clone(),
            self.api.clone(),
            ControllerOptions::from_config(&self.config),
        )
    }

    pub fn connector(&self) -> Result<Arc<dyn PushConnector>> {
        Ok(match self.config.transport {
            TransportKind::WebSocket => Arc::new(WsConnector::new(&self.config)),
            TransportKind::Sse => Arc::new(SseConnector::new(&self.config).context("创建 SSE 客户端失败")?),
        })
    }
}
