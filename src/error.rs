//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use std::path::PathBuf;
use thiserror::Error;

/// 配置重载器的主要错误类型
#[derive(Error, Debug)]
pub enum ReloaderError {
    /// 远端拉取错误
    #[error("拉取错误: {0}")]
    Fetch(#[from] FetchError),

    /// 本地写入错误
    #[error("写入错误: {0}")]
    Write(#[from] WriteError),

    /// 启动配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 完整性错误
    #[error("完整性错误: {0}")]
    Integrity(#[from] IntegrityError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 远端读取错误类型
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP传输失败
    #[error("请求远端服务失败: {0}")]
    Transport(#[from] reqwest::Error),

    /// 远端服务返回错误状态
    #[error("{service} 返回错误状态 {status}: {message}")]
    Service {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// 响应无法解析
    #[error("解析 {service} 响应失败: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    /// 远端条目不存在
    #[error("远端条目不存在: {item}")]
    NotFound { item: String },

    /// 凭证获取失败
    #[error("获取AWS凭证失败: {0}")]
    Credentials(String),
}

/// 本地文件写入错误类型
#[derive(Error, Debug)]
pub enum WriteError {
    /// 临时文件创建失败
    #[error("在 {dir} 中创建临时文件失败: {source}")]
    CreateTemp {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 内容写入失败
    #[error("写入文件 {path} 失败: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 权限设置失败
    #[error("设置文件权限 {path} 失败: {source}")]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 重命名到目标路径失败
    #[error("移动 {from} 到 {to} 失败: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 启动配置错误类型
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    /// 缺少必需的环境变量
    #[error("缺少 '{var}' 环境变量")]
    MissingVar { var: &'static str },

    /// 未知的配置来源
    #[error("未知的配置来源 '{value}'，允许的值: 's3', 'ssm'")]
    UnknownSource { value: String },

    /// 无效的来源位置
    #[error("无法解析位置 {location:?}: {reason}")]
    InvalidLocation { location: String, reason: String },

    /// 无效的重载间隔
    #[error("无效的重载间隔 {value:?}，应为不超过一年的整数秒")]
    InvalidInterval { value: String },

    /// 不支持的组合
    #[error("不支持的配置: {0}")]
    Unsupported(String),
}

/// 完整性错误类型
#[derive(Error, Debug, PartialEq)]
pub enum IntegrityError {
    /// 按路径加载后没有找到主配置文件
    #[error("未找到主配置文件: {path} 下没有 prometheus.yml 或 prometheus.yaml (已获取: {found:?})")]
    PrimaryConfigNotFound { path: String, found: Vec<String> },
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ReloaderError>;
