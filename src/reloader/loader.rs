//! 初始加载器
//!
//! 启动时一次性拉取主配置并写入目标目录

use crate::error::{IntegrityError, Result};
use crate::publish::AtomicPublisher;
use crate::source::{ConfigSource, PrefixFetch};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 可识别的主配置文件名
pub const PRIMARY_CONFIG_NAMES: [&str; 2] = ["prometheus.yml", "prometheus.yaml"];

/// 初始加载器
#[derive(Debug, Clone, Default)]
pub struct InitialLoader {
    /// 文件发布器
    publisher: AtomicPublisher,
}

impl InitialLoader {
    /// 创建新的初始加载器
    pub fn new(publisher: AtomicPublisher) -> Self {
        Self { publisher }
    }

    /// 拉取单个条目并写入 `directory/filename`
    ///
    /// # 参数
    /// * `source` - 主配置来源
    /// * `directory` - 目标目录
    /// * `filename` - 目标文件名
    ///
    /// # 返回
    /// * `Result<PathBuf>` - 写入的文件路径，任何失败都应视为致命错误
    pub async fn load(
        &self,
        source: &dyn ConfigSource,
        directory: &Path,
        filename: &str,
    ) -> Result<PathBuf> {
        let content = source.fetch().await?;
        let path = self.publisher.write_direct(directory, filename, &content)?;

        info!(
            "已加载初始配置 {} -> {} ({} 字节)",
            source.describe(),
            path.display(),
            content.len()
        );
        Ok(path)
    }

    /// 拉取路径下的全部条目，每个条目按基础名写为单独文件
    ///
    /// 全部写入后检查是否存在主配置文件，不存在则返回完整性错误。
    pub async fn load_by_prefix(
        &self,
        source: &dyn PrefixFetch,
        prefix: &str,
        directory: &Path,
    ) -> Result<Vec<PathBuf>> {
        let parameters = source.fetch_by_prefix().await?;

        let mut written = Vec::with_capacity(parameters.len());
        let mut found = Vec::with_capacity(parameters.len());

        for parameter in &parameters {
            let name = base_name(&parameter.name);
            if name.is_empty() {
                warn!("跳过没有基础名的参数: {}", parameter.name);
                continue;
            }

            let path = self
                .publisher
                .write_direct(directory, name, &parameter.value)?;
            info!("已写入参数 {} -> {}", parameter.name, path.display());

            written.push(path);
            found.push(name.to_string());
        }

        if !found
            .iter()
            .any(|name| PRIMARY_CONFIG_NAMES.contains(&name.as_str()))
        {
            return Err(IntegrityError::PrimaryConfigNotFound {
                path: prefix.to_string(),
                found,
            }
            .into());
        }

        info!("已从 {} 加载 {} 个配置文件", prefix, written.len());
        Ok(written)
    }
}

/// 取参数名的最后一段
fn base_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
