//! 统一错误处理模块
//!
//! 提供桥接层范围内的统一错误类型定义
//!
//! ## 错误类型分层
//!
//! - **桥接层错误** (`core::error`): 信封解析、标识符解析、脚本执行、模块注册
//! - **模块层错误** (`modules::ModuleError`): 模块实现内部产生的失败
//!
//! 解析器与注册表的失败都在各自边界内被吸收，转换为日志或错误回调，
//! 不会让批处理循环展开。

use thiserror::Error;

use crate::config::ConfigError;

/// 桥接层核心错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// 信封文本不符合四段语法
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// 模块 ID 或方法 ID 无法解析
    #[error("Invalid module ID ({module_id}) or method ID ({method_id})")]
    InvalidIdentifier { module_id: i32, method_id: i32 },

    /// 模块在 invoke 期间同步失败
    #[error("Exception in module method {module}.{method}: {reason}")]
    ModuleInvocationFailure {
        module: String,
        method: String,
        reason: String,
    },

    /// 脚本引擎报告的异常
    #[error("Script execution error: {message}")]
    ScriptExecution {
        message: String,
        stack: Option<String>,
    },

    /// 模块名称冲突
    #[error("Module '{0}' already exists, skipping registration")]
    DuplicateModuleRegistration(String),

    /// 回调处理器只能设置一次
    #[error("Callback handler already set")]
    CallbackHandlerAlreadySet,

    /// 适配器初始化失败（无法创建脚本上下文）
    #[error("Initialization error: {0}")]
    Init(String),

    /// 适配器已销毁或尚未就绪
    #[error("Invalid executor state: {0}")]
    InvalidState(String),

    /// 全局名称已被桥接层占用
    #[error("Global '{0}' is reserved by the bridge")]
    ReservedGlobal(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl BridgeError {
    /// 构造一个信封格式错误
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEnvelope(reason.into())
    }

    /// 把脚本异常格式化为单个字符串（消息 + 可选堆栈）
    pub fn script_report(&self) -> String {
        match self {
            Self::ScriptExecution {
                message,
                stack: Some(stack),
            } if !stack.is_empty() => format!("{message}\nStack Trace:\n{stack}"),
            Self::ScriptExecution { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<ConfigError> for BridgeError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<rquickjs::Error> for BridgeError {
    fn from(err: rquickjs::Error) -> Self {
        Self::ScriptExecution {
            message: err.to_string(),
            stack: None,
        }
    }
}

/// 桥接层结果类型别名
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_identifier_message() {
        let err = BridgeError::InvalidIdentifier {
            module_id: 999,
            method_id: 0,
        };
        assert_eq!(err.to_string(), "Invalid module ID (999) or method ID (0)");
    }

    #[test]
    fn test_script_report_with_stack() {
        let err = BridgeError::ScriptExecution {
            message: "ReferenceError: foo is not defined".to_string(),
            stack: Some("    at <eval> (bundle.js:1)".to_string()),
        };
        let report = err.script_report();
        assert!(report.starts_with("ReferenceError"));
        assert!(report.contains("Stack Trace:"));
    }

    #[test]
    fn test_script_report_without_stack() {
        let err = BridgeError::ScriptExecution {
            message: "boom".to_string(),
            stack: None,
        };
        assert_eq!(err.script_report(), "boom");
    }

    #[test]
    fn test_config_error_conversion() {
        let err: BridgeError = ConfigError::ValidationError("bad level".to_string()).into();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
