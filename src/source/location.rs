//! 配置来源位置
//!
//! 将启动参数中的位置字符串解析为不可变的来源描述

use crate::error::ConfigError;
use crate::source::client::{ObjectStoreClient, ParameterStoreClient};
use crate::source::store::{ConfigSource, MissingValuePolicy, ObjectStoreSource, ParameterStoreSource};
use percent_encoding::percent_decode_str;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

/// 后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// 对象存储（S3）
    S3,
    /// 参数存储（SSM Parameter Store）
    Ssm,
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s3" => Ok(SourceKind::S3),
            "ssm" => Ok(SourceKind::Ssm),
            other => Err(ConfigError::UnknownSource {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::S3 => write!(f, "s3"),
            SourceKind::Ssm => write!(f, "ssm"),
        }
    }
}

/// 远端条目位置
///
/// 启动时创建一次，此后只读。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// 对象存储中的一个对象
    ObjectStore {
        /// 存储桶
        container: String,
        /// 对象键，即位置URL的路径部分
        item_key: String,
    },
    /// 参数存储中的一个参数或参数路径
    ParameterStore {
        /// 已规范化的参数路径
        path: String,
    },
}

impl SourceLocation {
    /// 按后端类型解析位置字符串
    ///
    /// # 参数
    /// * `kind` - 后端类型
    /// * `raw` - 位置字符串，S3 为 `s3://bucket/key`，SSM 为参数路径
    pub fn parse(kind: SourceKind, raw: &str) -> Result<Self, ConfigError> {
        match kind {
            SourceKind::S3 => Self::parse_object_store(raw),
            SourceKind::Ssm => {
                if raw.trim().is_empty() {
                    return Err(ConfigError::InvalidLocation {
                        location: raw.to_string(),
                        reason: "参数路径为空".to_string(),
                    });
                }
                Ok(SourceLocation::ParameterStore {
                    path: clean_path(raw),
                })
            }
        }
    }

    fn parse_object_store(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidLocation {
            location: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;

        let container = url.host_str().unwrap_or_default().to_string();
        if container.is_empty() {
            return Err(invalid("缺少存储桶名称"));
        }

        let item_key = percent_decode_str(url.path())
            .decode_utf8()
            .map_err(|e| invalid(&e.to_string()))?
            .into_owned();
        if item_key.trim_start_matches('/').is_empty() {
            return Err(invalid("缺少对象键"));
        }

        Ok(SourceLocation::ObjectStore {
            container,
            item_key,
        })
    }

    /// 后端类型
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceLocation::ObjectStore { .. } => SourceKind::S3,
            SourceLocation::ParameterStore { .. } => SourceKind::Ssm,
        }
    }

    /// 使用注入的客户端构造配置来源
    ///
    /// `policy` 只影响参数存储来源。
    pub fn to_source(
        &self,
        object_store: &Arc<dyn ObjectStoreClient>,
        parameter_store: &Arc<dyn ParameterStoreClient>,
        policy: MissingValuePolicy,
    ) -> Arc<dyn ConfigSource> {
        match self {
            SourceLocation::ObjectStore {
                container,
                item_key,
            } => Arc::new(ObjectStoreSource::new(
                Arc::clone(object_store),
                container.clone(),
                item_key.clone(),
            )),
            SourceLocation::ParameterStore { path } => Arc::new(
                ParameterStoreSource::new(Arc::clone(parameter_store), path.clone())
                    .with_policy(policy),
            ),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::ObjectStore {
                container,
                item_key,
            } => write!(f, "s3://{}/{}", container, item_key.trim_start_matches('/')),
            SourceLocation::ParameterStore { path } => write!(f, "ssm:{}", path),
        }
    }
}

/// 按 POSIX 路径语义规范化
///
/// 合并重复分隔符，去掉末尾分隔符，并解析 `.` 与 `..`。空字符串返回 `"."`。
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
