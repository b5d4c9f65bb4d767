//! Prometheus Config Reloader - Prometheus 配置同步边车
//!
//! 从 S3 或 SSM Parameter Store 拉取 Prometheus 配置写入本地目录，
//! 并周期性地根据 AWS Cloud Map 重新生成 `cloudmap.json` 抓取目标文件：
//! - 启动时一次性加载主配置
//! - 原子替换抓取目标文件
//! - 可配置的后台重载间隔
//! - 结构化日志记录

pub mod app;
pub mod aws;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod publish;
pub mod reloader;
pub mod source;

// 重新导出主要类型
pub use app::{Backends, Reloader};
pub use config::ReloaderSettings;
pub use error::ReloaderError;
pub use publish::AtomicPublisher;

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
