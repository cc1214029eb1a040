//! Rental Notify CLI
//!
//! 租车平台通知同步客户端：实时推送 + REST 管理

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use rental_notify::cli::{self, CliContext, DropdownArgs, GlobalArgs, ListArgs};

#[derive(Parser)]
#[command(name = "rnotify")]
#[command(about = "Rental Notify - 租车平台通知同步客户端")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 挂载实时会话，打印新通知和未读角标
    Watch,
    /// 列出通知（支持筛选和分页）
    List(ListArgs),
    /// 显示铃铛下拉框（最近几条）
    Dropdown(DropdownArgs),
    /// 显示未读数
    Count {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 查看通知详情
    Detail {
        /// 通知 ID
        id: String,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 标记为已读
    Read {
        /// 通知 ID
        id: String,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 全部标记为已读
    ReadAll {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 删除通知
    Delete {
        /// 通知 ID
        id: String,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=rental_notify=debug rnotify watch --user u1
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rental_notify=info,rnotify=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let args = Cli::parse();
    let ctx = CliContext::new(&args.global)?;

    match args.command {
        Commands::Watch => cli::handle_watch(&ctx).await?,
        Commands::List(list) => cli::handle_list(&ctx, list).await?,
        Commands::Dropdown(dropdown) => cli::handle_dropdown(&ctx, dropdown).await?,
        Commands::Count { json } => cli::handle_count(&ctx, json).await?,
        Commands::Detail { id, json } => cli::handle_detail(&ctx, &id, json).await?,
        Commands::Read { id, json } => cli::handle_read(&ctx, &id, json).await?,
        Commands::ReadAll { json } => cli::handle_read_all(&ctx, json).await?,
        Commands::Delete { id, json } => cli::handle_delete(&ctx, &id, json).await?,
    }

    Ok(())
}
