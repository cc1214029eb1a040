//! watch 命令 - 挂载实时会话，打印状态变化、Toast 和角标

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::context::CliContext;
use super::output::format_cards;
use crate::sync::{NotificationHub, SyncState, SyncUpdate};
use crate::view::{ToastQueue, ViewBinder};

/// Toast 过期检查间隔
const TOAST_TICK: Duration = Duration::from_millis(250);

pub async fn handle_watch(ctx: &CliContext) -> Result<()> {
    let hub = NotificationHub::new(ctx.api.clone(), ctx.connector()?, &ctx.config);
    let session = hub.acquire(&ctx.user_id);
    let mut updates = session.subscribe();

    let binder = ViewBinder::new(ctx.config.dropdown_size);
    let mut toasts = ToastQueue::new(ctx.config.toast_duration);
    let mut tick = tokio::time::interval(TOAST_TICK);

    info!(user_id = %ctx.user_id, transport = ctx.config.transport.as_str(), "Watching notifications");
    println!("{}", binder.badge(&session).render());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    // 断线后只在用户按回车时重试
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                println!();
                break;
            }
            line = input.next_line(), if input_open => match line {
                Ok(Some(_)) => {
                    if session.state() == SyncState::Disconnected && session.retry() {
                        info!(user_id = %ctx.user_id, "Retrying push connection");
                    }
                }
                Ok(None) => input_open = false,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin, manual retry disabled");
                    input_open = false;
                }
            },
            _ = tick.tick() => {
                for toast in toasts.expire(Utc::now()) {
                    tracing::debug!(id = %toast.id, "Toast dismissed");
                }
            }
            update = updates.recv() => match update {
                Ok(SyncUpdate::StateChanged(state)) => {
                    println!("{}", binder.badge(&session).render());
                    if state == SyncState::Disconnected {
                        println!("连接已断开，按回车重试，按 Ctrl+C 退出");
                    }
                }
                Ok(SyncUpdate::Arrived(record)) => {
                    if let Some(toast) = toasts.push(&record, Utc::now()) {
                        println!("\n🔔 {}\n   {}", toast.title, toast.body);
                    }
                }
                Ok(SyncUpdate::StoreChanged { .. }) => {
                    let dropdown = binder.dropdown(&session);
                    println!("{}", binder.badge(&session).render());
                    if !dropdown.is_empty() {
                        println!("{}", format_cards(&dropdown.items, true));
                    }
                }
                Ok(SyncUpdate::Error(banner)) => {
                    println!("⚠ {}", banner.message());
                    session.dismiss_error();
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Update stream lagged, redrawing");
                    println!("{}", binder.badge(&session).render());
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    drop(session);
    info!(user_id = %ctx.user_id, "Watch stopped");
    Ok(())
}
