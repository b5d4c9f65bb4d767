//! 抓取配置刷新器
//!
//! 拉取命名空间列表，交给服务发现生成 file_sd 文档，再原子发布为 `cloudmap.json`

use crate::discovery::{split_namespaces, ScrapeConfigBuilder};
use crate::error::Result;
use crate::publish::AtomicPublisher;
use crate::source::ConfigSource;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

/// 抓取配置文件名
pub const SCRAPE_CONFIG_FILE_NAME: &str = "cloudmap.json";

/// 刷新失败的处理方式，由调用点决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// 返回错误，由调用方终止进程
    Fatal,
    /// 记录日志后继续，磁盘上保留上一次的文件
    LogAndContinue,
}

/// 抓取配置刷新器
pub struct ScrapeConfigRefresher {
    /// 命名空间列表来源
    namespace_source: Arc<dyn ConfigSource>,
    /// 服务发现
    discovery: Arc<dyn ScrapeConfigBuilder>,
    /// 文件发布器
    publisher: AtomicPublisher,
    /// 目标目录
    directory: PathBuf,
}

impl ScrapeConfigRefresher {
    /// 创建新的刷新器
    ///
    /// # 参数
    /// * `namespace_source` - 命名空间列表来源
    /// * `discovery` - 服务发现
    /// * `publisher` - 文件发布器
    /// * `directory` - 目标目录
    pub fn new(
        namespace_source: Arc<dyn ConfigSource>,
        discovery: Arc<dyn ScrapeConfigBuilder>,
        publisher: AtomicPublisher,
        directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            namespace_source,
            discovery,
            publisher,
            directory: directory.into(),
        }
    }

    /// 执行一次刷新
    ///
    /// # 返回
    /// * `Result<PathBuf>` - 发布的文件路径
    pub async fn refresh(&self) -> Result<PathBuf> {
        let raw = self.namespace_source.fetch().await?;
        let namespaces = split_namespaces(&raw);
        debug!(
            "从 {} 获取命名空间: {:?}",
            self.namespace_source.describe(),
            namespaces
        );

        let document = self.discovery.build_scrape_config(&namespaces).await?;

        let path = self
            .publisher
            .publish(&self.directory, SCRAPE_CONFIG_FILE_NAME, &document)?;
        Ok(path)
    }

    /// 按调用点的严重程度执行一次刷新
    ///
    /// `LogAndContinue` 下失败只记录日志并返回 `Ok(None)`。
    pub async fn refresh_with(&self, severity: Severity) -> Result<Option<PathBuf>> {
        match self.refresh().await {
            Ok(path) => {
                info!("已重新加载 CloudMap 配置: {}", path.display());
                Ok(Some(path))
            }
            Err(e) if severity == Severity::LogAndContinue => {
                error!("刷新 CloudMap 配置失败，保留上一次的文件: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, ReloaderError};
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// 可以切换成功/失败的命名空间来源
    struct ToggleSource {
        value: String,
        failing: AtomicBool,
    }

    #[async_trait]
    impl ConfigSource for ToggleSource {
        async fn fetch(&self) -> std::result::Result<String, FetchError> {
            if self.failing.load(Ordering::SeqCst) {
                Err(FetchError::Service {
                    service: "ssm",
                    status: 503,
                    message: "unavailable".to_string(),
                })
            } else {
                Ok(self.value.clone())
            }
        }

        fn describe(&self) -> String {
            "toggle".to_string()
        }
    }

    /// 记录收到的命名空间，并输出带序号的文档
    #[derive(Default)]
    struct RecordingDiscovery {
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl ScrapeConfigBuilder for RecordingDiscovery {
        async fn build_scrape_config(
            &self,
            namespaces: &[String],
        ) -> std::result::Result<String, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen.lock().unwrap().push(namespaces.to_vec());
            Ok(format!("[{{\"generation\": {n}}}]"))
        }
    }

    fn refresher(
        dir: &Path,
        value: &str,
    ) -> (ScrapeConfigRefresher, Arc<ToggleSource>, Arc<RecordingDiscovery>) {
        let source = Arc::new(ToggleSource {
            value: value.to_string(),
            failing: AtomicBool::new(false),
        });
        let discovery = Arc::new(RecordingDiscovery::default());
        let refresher = ScrapeConfigRefresher::new(
            source.clone(),
            discovery.clone(),
            AtomicPublisher::new(),
            dir,
        );
        (refresher, source, discovery)
    }

    #[tokio::test]
    async fn test_refresh_publishes_cloudmap_json() {
        let dir = TempDir::new().unwrap();
        let (refresher, _, discovery) = refresher(dir.path(), "a,,b");

        let path = refresher.refresh().await.unwrap();

        assert_eq!(path, dir.path().join(SCRAPE_CONFIG_FILE_NAME));
        assert_eq!(fs::read_to_string(path).unwrap(), "[{\"generation\": 1}]");
        assert_eq!(
            discovery.seen.lock().unwrap()[0],
            vec!["a".to_string(), String::new(), "b".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_tick_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join(SCRAPE_CONFIG_FILE_NAME);
        let (refresher, source, _) = refresher(dir.path(), "svc");

        // 第 N-1 次成功
        let first = refresher.refresh_with(Severity::LogAndContinue).await.unwrap();
        assert!(first.is_some());
        assert_eq!(fs::read_to_string(&target).unwrap(), "[{\"generation\": 1}]");

        // 第 N 次拉取失败
        source.failing.store(true, Ordering::SeqCst);
        let second = refresher.refresh_with(Severity::LogAndContinue).await.unwrap();
        assert!(second.is_none());
        assert_eq!(fs::read_to_string(&target).unwrap(), "[{\"generation\": 1}]");

        // 第 N+1 次恢复
        source.failing.store(false, Ordering::SeqCst);
        refresher.refresh_with(Severity::LogAndContinue).await.unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "[{\"generation\": 2}]");
    }

    #[tokio::test]
    async fn test_fatal_severity_returns_error() {
        let dir = TempDir::new().unwrap();
        let (refresher, source, discovery) = refresher(dir.path(), "svc");
        source.failing.store(true, Ordering::SeqCst);

        let result = refresher.refresh_with(Severity::Fatal).await;

        assert!(matches!(result, Err(ReloaderError::Fetch(_))));
        assert_eq!(discovery.calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join(SCRAPE_CONFIG_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_publish_failure_severity() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        let (refresher, _, _) = refresher(&missing, "svc");

        assert!(matches!(
            refresher.refresh_with(Severity::Fatal).await,
            Err(ReloaderError::Write(_))
        ));
        assert!(refresher
            .refresh_with(Severity::LogAndContinue)
            .await
            .unwrap()
            .is_none());
    }
}
