//! 只读命令: list / dropdown / count / detail

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Args;
use serde::Serialize;

use super::context::CliContext;
use super::output::{format_cards, format_json};
use crate::api::NotificationApi;
use crate::notification::{NotificationFilter, NotificationKind, Priority};
use crate::view::{DetailView, NotificationCard, ViewBinder};

/// list 命令参数
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// 只显示未读
    #[arg(long)]
    pub unread: bool,

    /// 通知类型，例如 RESERVA_CANCELADA
    #[arg(long = "type")]
    pub kind: Option<String>,

    /// 优先级: alta, media, baja
    #[arg(long)]
    pub priority: Option<String>,

    /// 关联对象类型，例如 RESERVA
    #[arg(long)]
    pub entity: Option<String>,

    /// 起始日期 (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// 截止日期 (YYYY-MM-DD，含当天)
    #[arg(long)]
    pub to: Option<String>,

    /// 页码（从 1 开始）
    #[arg(long, default_value = "1")]
    pub page: usize,

    /// 每页条数（默认取配置）
    #[arg(long)]
    pub limit: Option<usize>,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

impl ListArgs {
    pub fn to_filter(&self, default_limit: usize) -> Result<NotificationFilter> {
        let mut filter = NotificationFilter::new().page(self.page, self.limit.unwrap_or(default_limit));
        if self.unread {
            filter = filter.unread_only();
        }
        if let Some(raw) = &self.kind {
            let kind = NotificationKind::parse(raw);
            if kind == NotificationKind::Unspecified && !raw.eq_ignore_ascii_case("NO_ESPECIFICADO") {
                return Err(anyhow!("未知的通知类型: {}", raw));
            }
            filter = filter.kind(kind);
        }
        if let Some(raw) = &self.priority {
            let priority = Priority::parse(raw).ok_or_else(|| anyhow!("未知的优先级: {}，可选: alta, media, baja", raw))?;
            filter = filter.priority(priority);
        }
        if let Some(entity) = &self.entity {
            filter = filter.entity_type(entity.clone());
        }
        let from = self.from.as_deref().map(|d| parse_day(d, false)).transpose()?;
        let to = self.to.as_deref().map(|d| parse_day(d, true)).transpose()?;
        if from.is_some() || to.is_some() {
            filter = filter.between(from, to);
        }
        Ok(filter)
    }
}

/// 解析日期；`end_of_day` 为 true 时取当天最后一秒
fn parse_day(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("日期格式应为 YYYY-MM-DD: {}", raw))?;
    let time = if end_of_day {
        day.and_hms_opt(23, 59, 59)
    } else {
        day.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .ok_or_else(|| anyhow!("无效日期: {}", raw))
}

/// list：拉取完整基线后在本地筛选分页
pub async fn handle_list(ctx: &CliContext, args: ListArgs) -> Result<()> {
    let filter = args.to_filter(ctx.config.page_size)?;
    let controller = ctx.controller();
    controller.fetch_all().await?;

    let binder = ViewBinder::new(ctx.config.dropdown_size);
    let view = binder.panel(&controller, &filter);

    if args.json {
        println!("{}", format_json(&view));
        return Ok(());
    }
    if view.items.is_empty() {
        println!("没有符合条件的通知");
        return Ok(());
    }
    println!(
        "通知 {} 条（未读 {}），第 {}/{} 页:\n",
        view.total, view.unread, view.page, view.pages
    );
    println!("{}", format_cards(&view.items, true));
    Ok(())
}

#[derive(Args, Debug, Clone, Default)]
pub struct DropdownArgs {
    /// 直接使用服务端下拉框接口
    #[arg(long)]
    pub remote: bool,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// dropdown：铃铛下拉框的最近几条
pub async fn handle_dropdown(ctx: &CliContext, args: DropdownArgs) -> Result<()> {
    let binder = ViewBinder::new(ctx.config.dropdown_size);

    let view = if args.remote {
        let page = ctx.api.fetch_dropdown(&ctx.user_id).await?;
        let now = Utc::now();
        crate::view::DropdownView {
            items: page
                .notifications
                .iter()
                .map(|n| NotificationCard::build(n, binder.images(), now))
                .collect(),
            total_unread: page.total_unread,
            has_more: page.has_more,
        }
    } else {
        let controller = ctx.controller();
        controller.fetch_all().await?;
        binder.dropdown(&controller)
    };

    if args.json {
        println!("{}", format_json(&view));
        return Ok(());
    }
    println!("{}\n", crate::view::BellBadge::new(view.total_unread, crate::sync::SyncState::Idle).render());
    if view.is_empty() {
        println!("暂无通知");
    } else {
        println!("{}", format_cards(&view.items, true));
    }
    if view.has_more {
        println!("\n... 使用 `rnotify list` 查看全部");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CountOutput {
    local: usize,
    server: usize,
    badge: Option<String>,
}

/// count：本地计数与服务端计数
pub async fn handle_count(ctx: &CliContext, json: bool) -> Result<()> {
    let controller = ctx.controller();
    controller.fetch_all().await?;
    let server = controller.server_unread_count().await?;
    let badge = ViewBinder::new(ctx.config.dropdown_size).badge(&controller);

    let output = CountOutput {
        local: controller.unread_count(),
        server,
        badge: badge.label.clone(),
    };
    if json {
        println!("{}", format_json(&output));
    } else {
        println!("未读: {} (服务端 {})", output.local, output.server);
    }
    Ok(())
}

/// detail：单条详情
pub async fn handle_detail(ctx: &CliContext, id: &str, json: bool) -> Result<()> {
    let controller = ctx.controller();
    let record = controller.open_detail(id).await?;
    let view = DetailView::build(&record, ViewBinder::new(ctx.config.dropdown_size).images());

    if json {
        println!("{}", format_json(&view));
    } else {
        println!("{}", view.render());
    }
    Ok(())
}
