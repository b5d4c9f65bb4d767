//! Prometheus Config Reloader 主程序入口
//!
//! 在 ECS 任务中作为 Prometheus 的边车运行

use anyhow::{Context, Result};
use clap::Parser;
use prometheus_config_reloader::aws::AwsSession;
use prometheus_config_reloader::cli::Args;
use prometheus_config_reloader::config::ReloaderSettings;
use prometheus_config_reloader::daemon::setup_signal_handlers;
use prometheus_config_reloader::logging::{LogConfig, LoggingSystem};
use prometheus_config_reloader::{Backends, Reloader};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志系统
    let log_config = LogConfig {
        level: args.log_level.clone().into(),
        file_path: args.log_file.clone(),
        json_format: args.log_json,
        ..Default::default()
    };
    let logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("{} v{} 启动", prometheus_config_reloader::APP_NAME, prometheus_config_reloader::VERSION);
    if let Some(path) = &logging_system.config().file_path {
        info!("日志写入文件: {}", path.display());
    }

    if let Err(e) = run(&args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 服务主逻辑
async fn run(args: &Args) -> Result<()> {
    let settings = ReloaderSettings::from_args(args).context("读取启动配置失败")?;

    let session = AwsSession::from_env(args.aws_region.as_deref(), args.aws_endpoint_url.as_deref())
        .context("初始化AWS会话失败")?;
    let backends = Backends::aws(Arc::new(session));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    setup_signal_handlers(shutdown_tx)
        .await
        .context("设置信号处理器失败")?;

    Reloader::new(settings, backends)
        .run(shutdown_rx)
        .await
        .context("配置重载失败")?;

    Ok(())
}
