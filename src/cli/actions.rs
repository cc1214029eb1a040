//! 变更命令: read / read-all / delete

use anyhow::{anyhow, Result};
use serde::Serialize;

use super::context::CliContext;
use super::output::format_json;

#[derive(Debug, Serialize)]
struct ActionOutput<'a> {
    action: &'a str,
    id: &'a str,
    unread: usize,
}

/// read：标记单条已读
pub async fn handle_read(ctx: &CliContext, id: &str, json: bool) -> Result<()> {
    let controller = ctx.controller();
    controller.fetch_all().await?;
    controller.mark_as_read(id).await?;

    let unread = controller.unread_count();
    if json {
        println!("{}", format_json(&ActionOutput { action: "read", id, unread }));
    } else {
        println!("已标记为已读: {}（剩余未读 {}）", id, unread);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ReadAllOutput {
    marked: Vec<String>,
    failed: Vec<FailedItem>,
}

#[derive(Debug, Serialize)]
struct FailedItem {
    id: String,
    error: String,
}

/// read-all：全部标记已读
pub async fn handle_read_all(ctx: &CliContext, json: bool) -> Result<()> {
    let controller = ctx.controller();
    controller.fetch_all().await?;
    let report = controller.mark_all_read().await;

    let output = ReadAllOutput {
        marked: report.marked,
        failed: report
            .failed
            .into_iter()
            .map(|(id, e)| FailedItem { id, error: e.to_string() })
            .collect(),
    };
    if json {
        println!("{}", format_json(&output));
    } else {
        println!("已标记 {} 条为已读", output.marked.len());
        for item in &output.failed {
            println!("  ✗ {}: {}", item.id, item.error);
        }
    }

    if output.failed.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("{} 条通知标记失败", output.failed.len()))
    }
}

/// delete：删除单条
pub async fn handle_delete(ctx: &CliContext, id: &str, json: bool) -> Result<()> {
    let controller = ctx.controller();
    controller.fetch_all().await?;
    controller.delete(id).await?;

    let unread = controller.unread_count();
    if json {
        println!("{}", format_json(&ActionOutput { action: "delete", id, unread }));
    } else {
        println!("已删除: {}", id);
    }
    Ok(())
}
