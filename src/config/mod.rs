//! 统一配置系统
//!
//! 提供TOML/JSON配置文件、环境变量覆盖和默认值

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::impl_default;

/// 桥接配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 批次解析失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushErrorPolicy {
    /// 记录日志并丢弃整个批次
    Drop,
    /// 丢弃批次并向脚本抛出异常
    Throw,
}

impl std::str::FromStr for FlushErrorPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "throw" => Ok(Self::Throw),
            other => Err(ConfigError::ParseError(format!(
                "unknown flush error policy '{other}'"
            ))),
        }
    }
}

/// 桥接主配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// 暴露给脚本的 `__DEV__` 标志
    #[serde(default = "default_true")]
    pub dev_mode: bool,

    /// 初始化时是否加载内置的 bootstrap 脚本（消息队列与模块代理）
    #[serde(default = "default_true")]
    pub load_bootstrap: bool,

    /// 批次解析失败时的处理策略
    #[serde(default = "default_flush_error_policy")]
    pub flush_error_policy: FlushErrorPolicy,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_true() -> bool {
    true
}

fn default_flush_error_policy() -> FlushErrorPolicy {
    FlushErrorPolicy::Drop
}

impl_default!(BridgeConfig {
    dev_mode: true,
    load_bootstrap: true,
    flush_error_policy: FlushErrorPolicy::Drop,
    logging: LoggingConfig::default(),
});

impl BridgeConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("BRIDGE_DEV_MODE") {
            self.dev_mode = val.parse().unwrap_or(self.dev_mode);
        }
        if let Ok(val) = env::var("BRIDGE_LOAD_BOOTSTRAP") {
            self.load_bootstrap = val.parse().unwrap_or(self.load_bootstrap);
        }
        if let Ok(val) = env::var("BRIDGE_FLUSH_ERROR_POLICY") {
            match val.parse() {
                Ok(policy) => self.flush_error_policy = policy,
                Err(e) => tracing::warn!(target: "bridge.config", "Ignoring override: {}", e),
            }
        }
        if let Ok(val) = env::var("BRIDGE_LOG_LEVEL") {
            match val.parse() {
                Ok(level) => self.logging.level = level,
                Err(e) => tracing::warn!(target: "bridge.config", "Ignoring override: {}", e),
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.logging.validate()
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./bridge.toml
    /// 2. ./bridge.json
    /// 3. <用户配置目录>/script_bridge/bridge.toml
    /// 4. 使用默认配置
    ///
    /// 找到配置后再应用环境变量覆盖。
    pub fn load_or_default() -> Self {
        let mut config = Self::locate().unwrap_or_else(|| {
            tracing::info!(target: "bridge.config", "Using default configuration");
            Self::default()
        });
        config.apply_env_overrides();
        config
    }

    fn locate() -> Option<Self> {
        if let Ok(config) = Self::from_toml_file("bridge.toml") {
            tracing::info!(target: "bridge.config", "Loaded config from bridge.toml");
            return Some(config);
        }

        if let Ok(config) = Self::from_json_file("bridge.json") {
            tracing::info!(target: "bridge.config", "Loaded config from bridge.json");
            return Some(config);
        }

        let config_path = dirs::config_dir()?
            .join("script_bridge")
            .join("bridge.toml");
        match Self::from_toml_file(&config_path) {
            Ok(config) => {
                tracing::info!(target: "bridge.config", "Loaded config from {:?}", config_path);
                Some(config)
            }
            Err(_) => None,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 是否输出到控制台
    pub log_to_console: bool,

    /// 是否把脚本 console 输出转发到宿主日志
    #[serde(default = "default_true")]
    pub forward_script_console: bool,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    log_to_console: true,
    forward_script_console: true,
});

impl LoggingConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.log_to_console && self.level == LogLevel::Trace {
            return Err(ConfigError::ValidationError(
                "trace level requires console output".to_string(),
            ));
        }
        Ok(())
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ConfigError::ParseError(format!("unknown log level '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.dev_mode);
        assert_eq!(config.flush_error_policy, FlushErrorPolicy::Drop);
    }

    #[test]
    fn test_toml_serialization() {
        let config = BridgeConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: BridgeConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.dev_mode, parsed.dev_mode);
        assert_eq!(config.logging.level, parsed.logging.level);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = BridgeConfig::from_toml_str("flush_error_policy = \"throw\"\n").unwrap();
        assert_eq!(parsed.flush_error_policy, FlushErrorPolicy::Throw);
        assert!(parsed.load_bootstrap);
        assert_eq!(parsed.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_json_parsing() {
        let parsed =
            BridgeConfig::from_json_str(r#"{"dev_mode": false, "load_bootstrap": false}"#)
                .unwrap();
        assert!(!parsed.dev_mode);
        assert!(!parsed.load_bootstrap);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = BridgeConfig::from_toml_str("dev_mode = [").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        let mut config = BridgeConfig::default();
        config.flush_error_policy = FlushErrorPolicy::Throw;
        config.save_toml(&path).unwrap();

        let loaded = BridgeConfig::from_toml_file(&path).unwrap();
        assert_eq!(loaded.flush_error_policy, FlushErrorPolicy::Throw);
    }

    #[test]
    fn test_missing_file_is_file_error() {
        let err = BridgeConfig::from_toml_file("/nonexistent/bridge.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileError(_)));
    }

    #[test]
    fn test_policy_and_level_parsing() {
        assert_eq!("THROW".parse::<FlushErrorPolicy>().unwrap(), FlushErrorPolicy::Throw);
        assert!("explode".parse::<FlushErrorPolicy>().is_err());
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    }

    #[test]
    fn test_validation_rejects_silent_trace() {
        let mut config = BridgeConfig::default();
        config.logging.log_to_console = false;
        config.logging.level = LogLevel::Trace;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }
}
