//! 重载调度器模块
//!
//! 按固定间隔在后台任务中重复执行刷新动作

use crate::error::ConfigError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// 允许的最大重载间隔（秒），一年
pub const MAX_RELOAD_SECONDS: i64 = 365 * 24 * 60 * 60;

/// 重载间隔
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadInterval {
    /// 不启动后台重载
    Disabled,
    /// 固定间隔
    Every(Duration),
}

impl ReloadInterval {
    /// 解析以秒为单位的间隔字符串
    ///
    /// 零或负数表示禁用，非整数或超过 [`MAX_RELOAD_SECONDS`] 为配置错误。
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidInterval {
            value: raw.to_string(),
        };
        let seconds: i64 = raw.trim().parse().map_err(|_| invalid())?;

        if seconds > MAX_RELOAD_SECONDS {
            return Err(invalid());
        }
        if seconds <= 0 {
            Ok(ReloadInterval::Disabled)
        } else {
            Ok(ReloadInterval::Every(Duration::from_secs(seconds as u64)))
        }
    }

    /// 是否启用
    pub fn is_enabled(&self) -> bool {
        matches!(self, ReloadInterval::Every(_))
    }
}

/// 重载调度器
#[derive(Debug, Clone)]
pub struct ReloadScheduler {
    /// 执行间隔
    interval: ReloadInterval,
    /// 是否跳过启动时的立即执行
    delay_first_run: bool,
}

impl ReloadScheduler {
    /// 创建新的调度器
    pub fn new(interval: ReloadInterval) -> Self {
        Self {
            interval,
            delay_first_run: false,
        }
    }

    /// 第一次执行推迟到一个完整间隔之后
    ///
    /// 调用方已经在启动时同步执行过一次时使用。
    pub fn delay_first_run(mut self) -> Self {
        self.delay_first_run = true;
        self
    }

    /// 启动后台调度任务
    ///
    /// # 参数
    /// * `action` - 每次触发时执行的动作
    /// * `shutdown_rx` - 关闭信号接收器
    ///
    /// # 返回
    /// * `Option<JoinHandle<()>>` - 间隔被禁用时返回 `None`，不会启动任何任务
    pub fn spawn<F, Fut>(
        &self,
        action: F,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Option<JoinHandle<()>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = match self.interval {
            ReloadInterval::Disabled => {
                info!("重载间隔为 0，不启动后台重载");
                return None;
            }
            ReloadInterval::Every(period) => period,
        };

        let mut ticker = if self.delay_first_run {
            let Some(start) = Instant::now().checked_add(period) else {
                error!("重载间隔 {:?} 超出时钟范围，不启动后台重载", period);
                return None;
            };
            interval_at(start, period)
        } else {
            interval(period)
        };
        // 慢动作错过的触发直接丢弃，不排队补跑
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("启动后台重载，间隔: {:?}", period);

        Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("重载触发");
                        action().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("后台重载已停止");
                        break;
                    }
                }
            }
        }))
    }
}
