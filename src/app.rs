//! 应用编排
//!
//! 串联启动加载、启动刷新和后台重载，并在收到关闭信号后退出

use crate::aws::{AwsSession, CloudMapDiscovery, S3Client, SsmClient};
use crate::config::{LoadMode, ReloaderSettings};
use crate::daemon::wait_for_shutdown;
use crate::discovery::ScrapeConfigBuilder;
use crate::error::{ConfigError, Result};
use crate::publish::AtomicPublisher;
use crate::reloader::{InitialLoader, ReloadScheduler, ScrapeConfigRefresher, Severity};
use crate::source::{
    MissingValuePolicy, ObjectStoreClient, ParameterStoreClient, ParameterStoreSource,
    SourceLocation,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// 远端协作方集合
#[derive(Clone)]
pub struct Backends {
    /// 对象存储客户端
    pub object_store: Arc<dyn ObjectStoreClient>,
    /// 参数存储客户端
    pub parameter_store: Arc<dyn ParameterStoreClient>,
    /// 服务发现
    pub discovery: Arc<dyn ScrapeConfigBuilder>,
}

impl Backends {
    /// 基于同一个 AWS 会话创建全部客户端
    pub fn aws(session: Arc<AwsSession>) -> Self {
        Self {
            object_store: Arc::new(S3Client::new(Arc::clone(&session))),
            parameter_store: Arc::new(SsmClient::new(Arc::clone(&session))),
            discovery: Arc::new(CloudMapDiscovery::new(session)),
        }
    }
}

/// 配置重载器
pub struct Reloader {
    /// 运行配置
    settings: ReloaderSettings,
    /// 远端协作方
    backends: Backends,
    /// 文件发布器
    publisher: AtomicPublisher,
}

impl Reloader {
    /// 创建新的重载器
    pub fn new(settings: ReloaderSettings, backends: Backends) -> Self {
        Self {
            settings,
            backends,
            publisher: AtomicPublisher::new(),
        }
    }

    /// 加载主配置
    ///
    /// 失败为致命错误，调用方应直接退出。
    pub async fn load_primary(&self) -> Result<()> {
        let loader = InitialLoader::new(self.publisher.clone());
        let directory = &self.settings.config_dir;

        match self.settings.load_mode {
            LoadMode::SingleFile => {
                let source = self
                    .settings
                    .primary
                    .to_source(
                        &self.backends.object_store,
                        &self.backends.parameter_store,
                        MissingValuePolicy::Strict,
                    );
                loader
                    .load(source.as_ref(), directory, &self.settings.config_name)
                    .await?;
            }
            LoadMode::ByPath => {
                let SourceLocation::ParameterStore { path } = &self.settings.primary else {
                    return Err(ConfigError::Unsupported(format!(
                        "按路径加载只支持 ssm 来源，当前为 {}",
                        self.settings.primary.kind()
                    ))
                    .into());
                };
                let source =
                    ParameterStoreSource::new(Arc::clone(&self.backends.parameter_store), path.clone());
                loader.load_by_prefix(&source, path, directory).await?;
            }
        }

        Ok(())
    }

    /// 创建抓取配置刷新器，未配置命名空间来源时返回 `None`
    ///
    /// 命名空间参数缺失时按空列表处理。
    pub fn scrape_refresher(&self) -> Option<ScrapeConfigRefresher> {
        let location = self.settings.scrape.as_ref()?;
        let namespace_source = location.to_source(
            &self.backends.object_store,
            &self.backends.parameter_store,
            MissingValuePolicy::BestEffort,
        );

        Some(ScrapeConfigRefresher::new(
            namespace_source,
            Arc::clone(&self.backends.discovery),
            self.publisher.clone(),
            self.settings.config_dir.clone(),
        ))
    }

    /// 运行重载器
    ///
    /// 依次执行主配置加载、启动刷新；重载间隔有效时启动后台重载，
    /// 直到收到关闭信号。没有后台任务时加载完成即返回。
    ///
    /// # 参数
    /// * `shutdown_rx` - 关闭信号接收器
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        // 启动期间到达的关闭信号也要送到后台任务
        let scheduler_rx = shutdown_rx.resubscribe();

        info!("加载主配置: {}", self.settings.primary);
        self.load_primary().await?;

        let Some(refresher) = self.scrape_refresher() else {
            info!("未配置抓取配置来源，初始加载完成后退出");
            return Ok(());
        };

        refresher.refresh_with(Severity::Fatal).await?;

        if !self.settings.reload_interval.is_enabled() {
            info!("后台重载已禁用，初始加载完成后退出");
            return Ok(());
        }

        let refresher = Arc::new(refresher);
        let handle = ReloadScheduler::new(self.settings.reload_interval)
            .delay_first_run()
            .spawn(
                move || {
                    let refresher = Arc::clone(&refresher);
                    async move {
                        // LogAndContinue 不会返回错误
                        let _ = refresher.refresh_with(Severity::LogAndContinue).await;
                    }
                },
                scheduler_rx,
            );

        wait_for_shutdown(shutdown_rx).await;

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("后台重载任务异常退出: {}", e);
            }
        }

        info!("配置重载器已停止");
        Ok(())
    }
}
