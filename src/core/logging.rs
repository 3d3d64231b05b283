//! 日志初始化
//!
//! 库本身只通过 `tracing` 宏输出诊断信息；宿主应用可选择调用
//! [`init_logging`] 安装一个 fmt 订阅者。

use tracing_subscriber::EnvFilter;

use crate::config::{LogLevel, LoggingConfig};

/// 初始化日志系统
///
/// `RUST_LOG` 环境变量优先；未设置时使用配置中的日志级别。
/// 重复调用是安全的（`try_init` 会忽略已安装的订阅者）。
pub fn init_logging(config: &LoggingConfig) {
    if !config.log_to_console {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
    tracing::debug!(target: "bridge", "Logging initialized at level {:?}", config.level);
}

impl LogLevel {
    /// 转换为 `EnvFilter` 指令
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
