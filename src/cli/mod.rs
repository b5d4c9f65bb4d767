//! 命令行接口模块
//!
//! 提供CLI参数与环境变量解析

pub mod args;

// 重新导出主要类型
pub use args::{Args, LogLevel};
