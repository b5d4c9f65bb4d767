//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口。所有参数都可以通过环境变量提供，
//! 这是在ECS任务中作为sidecar运行时的常用方式。

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Prometheus 配置重载器 - 从 S3 或 SSM 同步 Prometheus 配置文件
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "prometheus-config-reloader",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置来源类型（s3 或 ssm）
    #[arg(long, value_name = "KIND", help = "配置来源类型: s3 或 ssm", env = "CONFIG_SOURCE")]
    pub source: Option<String>,

    /// 主配置文件的远端位置
    #[arg(
        long,
        value_name = "LOCATION",
        help = "主配置文件位置（s3://bucket/key 或 SSM 参数路径）",
        env = "SOURCE_PROMETHEUS_CONFIG_FILE_PATH"
    )]
    pub config_path: Option<String>,

    /// 命名空间列表的远端位置
    #[arg(
        long,
        value_name = "LOCATION",
        help = "CloudMap 命名空间列表位置",
        env = "SOURCE_PROMETHEUS_SCRAPE_CONFIGS_PATH"
    )]
    pub scrape_configs_path: Option<String>,

    /// 本地配置目录
    #[arg(long, value_name = "DIR", help = "配置文件写入目录", env = "CONFIG_FILE_DIR")]
    pub config_dir: Option<String>,

    /// 本地主配置文件名
    #[arg(long, value_name = "NAME", help = "主配置文件名", env = "CONFIG_FILE_NAME")]
    pub config_name: Option<String>,

    /// 重载间隔（秒），0 表示禁用
    #[arg(
        long,
        value_name = "SECONDS",
        help = "抓取配置重载间隔（秒），0 表示禁用",
        env = "CONFIG_RELOAD_FREQUENCY",
        allow_hyphen_values = true
    )]
    pub reload_frequency: Option<String>,

    /// 按路径加载 SSM 下的全部参数
    #[arg(
        long,
        help = "按路径加载 SSM 参数，每个参数写为单独文件",
        env = "CONFIG_LOAD_BY_PATH"
    )]
    pub load_by_path: bool,

    /// 日志级别
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        help = "日志级别",
        env = "RELOADER_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// 是否输出JSON格式日志
    #[arg(long, help = "输出JSON格式日志", env = "RELOADER_LOG_JSON")]
    pub log_json: bool,

    /// 日志文件路径
    #[arg(
        long,
        value_name = "PATH",
        help = "日志写入文件而不是控制台",
        env = "RELOADER_LOG_FILE"
    )]
    pub log_file: Option<PathBuf>,

    /// AWS 区域
    #[arg(long, value_name = "REGION", help = "AWS 区域", env = "AWS_REGION")]
    pub aws_region: Option<String>,

    /// AWS 端点覆盖（用于兼容S3的存储或本地测试）
    #[arg(long, value_name = "URL", help = "AWS 服务端点覆盖", env = "AWS_ENDPOINT_URL")]
    pub aws_endpoint_url: Option<String>,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Debug, PartialEq, Default)]
pub enum LogLevel {
    /// 调试级别
    Debug,
    /// 信息级别
    #[default]
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "prometheus-config-reloader",
            "--source",
            "s3",
            "--config-path",
            "s3://cfg-bucket/prometheus.yml",
            "--reload-frequency",
            "-5",
            "--log-level",
            "debug",
            "--log-file",
            "/var/log/reloader.log",
        ])
        .unwrap();

        assert_eq!(args.source.as_deref(), Some("s3"));
        assert_eq!(
            args.config_path.as_deref(),
            Some("s3://cfg-bucket/prometheus.yml")
        );
        assert_eq!(args.reload_frequency.as_deref(), Some("-5"));
        assert_eq!(args.log_level, LogLevel::Debug);
        assert!(!args.load_by_path);
        assert_eq!(args.log_file, Some(PathBuf::from("/var/log/reloader.log")));
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(log::LevelFilter::from(LogLevel::Warn), log::LevelFilter::Warn);
        assert_eq!(LogLevel::Error.to_string(), "error");
    }
}
