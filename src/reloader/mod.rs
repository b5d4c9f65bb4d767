//! 重载模块
//!
//! 包含启动加载、抓取配置刷新和周期调度

pub mod loader;
pub mod refresher;
pub mod scheduler;

// 重新导出主要类型
pub use loader::{InitialLoader, PRIMARY_CONFIG_NAMES};
pub use refresher::{ScrapeConfigRefresher, Severity, SCRAPE_CONFIG_FILE_NAME};
pub use scheduler::{ReloadInterval, ReloadScheduler};
