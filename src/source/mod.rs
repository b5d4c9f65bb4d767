//! 配置来源模块
//!
//! 提供统一的远端配置拉取接口，屏蔽 S3 与 SSM 的差异

pub mod client;
pub mod location;
pub mod store;

// 重新导出主要类型
pub use client::{ObjectStoreClient, Parameter, ParameterPage, ParameterStoreClient};
pub use location::{clean_path, SourceKind, SourceLocation};
pub use store::{ConfigSource, MissingValuePolicy, ObjectStoreSource, ParameterStoreSource, PrefixFetch};
