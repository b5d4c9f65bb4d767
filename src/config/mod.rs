//! 配置管理模块
//!
//! 提供启动参数校验和运行配置

pub mod settings;

// 重新导出主要类型
pub use settings::{LoadMode, ReloaderSettings, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_NAME};
