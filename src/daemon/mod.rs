//! 进程生命周期模块
//!
//! 提供信号处理和优雅关闭支持

pub mod signal_handler;

pub use signal_handler::{setup_signal_handlers, wait_for_shutdown};
