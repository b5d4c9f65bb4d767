//! 运行配置
//!
//! 把命令行参数/环境变量校验为不可变的运行配置

use crate::cli::Args;
use crate::error::ConfigError;
use crate::reloader::ReloadInterval;
use crate::source::{SourceKind, SourceLocation};
use std::path::PathBuf;
use tracing::info;

/// 默认配置目录
pub const DEFAULT_CONFIG_DIR: &str = "/etc/config/";
/// 默认主配置文件名
pub const DEFAULT_CONFIG_NAME: &str = "config.yml";
/// 默认重载间隔（秒）
pub const DEFAULT_RELOAD_FREQUENCY: &str = "30";

/// 主配置加载方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// 单个条目写为 `config_name`
    SingleFile,
    /// 参数路径下的每个参数写为单独文件
    ByPath,
}

/// 运行配置
#[derive(Debug, Clone, PartialEq)]
pub struct ReloaderSettings {
    /// 主配置来源位置
    pub primary: SourceLocation,
    /// 命名空间列表来源位置
    pub scrape: Option<SourceLocation>,
    /// 目标目录
    pub config_dir: PathBuf,
    /// 主配置文件名
    pub config_name: String,
    /// 抓取配置重载间隔
    pub reload_interval: ReloadInterval,
    /// 主配置加载方式
    pub load_mode: LoadMode,
}

impl ReloaderSettings {
    /// 从命令行参数构造运行配置
    ///
    /// # 参数
    /// * `args` - 已解析的命令行参数
    ///
    /// # 返回
    /// * `Result<Self, ConfigError>` - 校验后的配置，缺少必需项或取值非法时返回错误
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let kind: SourceKind = args
            .source
            .as_deref()
            .ok_or(ConfigError::MissingVar {
                var: "CONFIG_SOURCE",
            })?
            .parse()?;

        let primary_raw = args
            .config_path
            .as_deref()
            .ok_or(ConfigError::MissingVar {
                var: "SOURCE_PROMETHEUS_CONFIG_FILE_PATH",
            })?;
        let primary = SourceLocation::parse(kind, primary_raw)?;

        let scrape = match args.scrape_configs_path.as_deref() {
            Some(raw) => Some(SourceLocation::parse(kind, raw)?),
            None => {
                info!("缺少 'SOURCE_PROMETHEUS_SCRAPE_CONFIGS_PATH' 环境变量，跳过抓取配置");
                None
            }
        };

        let config_dir = with_default(&args.config_dir, "CONFIG_FILE_DIR", DEFAULT_CONFIG_DIR);
        let config_name = with_default(&args.config_name, "CONFIG_FILE_NAME", DEFAULT_CONFIG_NAME);
        let reload_frequency = with_default(
            &args.reload_frequency,
            "CONFIG_RELOAD_FREQUENCY",
            DEFAULT_RELOAD_FREQUENCY,
        );
        let reload_interval = ReloadInterval::parse(&reload_frequency)?;

        let load_mode = if args.load_by_path {
            if kind != SourceKind::Ssm {
                return Err(ConfigError::Unsupported(format!(
                    "按路径加载只支持 ssm 来源，当前为 {kind}"
                )));
            }
            LoadMode::ByPath
        } else {
            LoadMode::SingleFile
        };

        Ok(Self {
            primary,
            scrape,
            config_dir: PathBuf::from(config_dir),
            config_name,
            reload_interval,
            load_mode,
        })
    }
}

/// 取参数值，缺省时记录并使用默认值
fn with_default(value: &Option<String>, var: &str, default: &str) -> String {
    match value {
        Some(v) => v.clone(),
        None => {
            info!("使用 '{}' 的默认值: {}", var, default);
            default.to_string()
        }
    }
}
