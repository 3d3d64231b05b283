//! Native 模块系统
//!
//! 定义宿主侧模块的能力契约（[`NativeModule`]）、模块向脚本回传结果的
//! 唯一通道（[`ModuleCallbacks`]），以及模块注册表。
//!
//! 模块作者须知：
//! - `methods()` 的顺序就是方法 ID，进程生命周期内必须稳定
//! - 每个调用最多回调一次
//! - `call_id == NO_CALLBACK` 表示脚本不关心结果，此时不要发送回调

use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use crate::bindings::protocol::{CallId, NO_CALLBACK};
use crate::core::error::{BridgeError, BridgeResult};

pub mod device_info;
pub mod registry;

pub use device_info::{DeviceInfoModule, DeviceInfoProvider, HostDeviceInfo};
pub use registry::{ModuleConfigEntry, ModuleRegistry};

/// 模块层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("Method '{method}' not found in {module}")]
    UnknownMethod { module: String, method: String },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Sync call not supported for {module}.{method}")]
    SyncNotSupported { module: String, method: String },

    #[error("{0}")]
    Failed(String),
}

pub type ModuleResult<T> = Result<T, ModuleError>;

/// 回调处理器：把 (callId, result, isError) 交给下游（通常是脚本适配器）
pub type CallbackHandler = Box<dyn Fn(CallId, &str, bool) + Send + Sync>;

/// 模块向脚本回传结果的句柄
///
/// 由注册表在注册时交给模块；所有克隆共享同一个只能设置一次的处理器。
/// 没有安装处理器时，结果会被记录警告后丢弃。
#[derive(Clone, Default)]
pub struct ModuleCallbacks {
    handler: Arc<OnceLock<CallbackHandler>>,
}

impl ModuleCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 安装处理器；第二次调用返回错误，已安装的处理器保持不变
    pub fn set_handler(&self, handler: CallbackHandler) -> BridgeResult<()> {
        self.handler
            .set(handler)
            .map_err(|_| BridgeError::CallbackHandlerAlreadySet)
    }

    pub fn has_handler(&self) -> bool {
        self.handler.get().is_some()
    }

    /// 发送成功结果
    pub fn send_success(&self, call_id: CallId, result: &str) {
        self.deliver(call_id, result, false);
    }

    /// 发送错误结果
    pub fn send_error(&self, call_id: CallId, error: &str) {
        self.deliver(call_id, error, true);
    }

    fn deliver(&self, call_id: CallId, payload: &str, is_error: bool) {
        match self.handler.get() {
            Some(handler) => handler(call_id, payload, is_error),
            None => tracing::warn!(
                target: "bridge.registry",
                "No callback handler set, cannot send {} for call {}: {}",
                if is_error { "error" } else { "result" },
                call_id,
                payload
            ),
        }
    }
}

impl std::fmt::Debug for ModuleCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCallbacks")
            .field("has_handler", &self.has_handler())
            .finish()
    }
}

/// Native 模块能力契约
pub trait NativeModule: Send + Sync {
    /// 模块名称，注册表的唯一键
    fn name(&self) -> &str;

    /// 导出的方法名；位置即方法 ID
    fn methods(&self) -> Vec<String>;

    /// 暴露给脚本的常量（JSON 对象）
    fn constants(&self) -> Option<Map<String, Value>> {
        None
    }

    /// 以 Promise 形式暴露的方法名
    fn promise_methods(&self) -> Vec<String> {
        Vec::new()
    }

    /// 支持同步调用的方法名
    fn sync_methods(&self) -> Vec<String> {
        Vec::new()
    }

    /// 注册时调用，模块保存回调句柄以便稍后完成调用
    fn attach(&mut self, _callbacks: ModuleCallbacks) {}

    /// 异步调用入口
    ///
    /// 没有同步返回值；结果通过 [`ModuleCallbacks`] 送达。
    /// 返回 `Err` 等同于同步抛出异常，注册表会把它转换成错误回调。
    fn invoke(&self, method: &str, params: &str, call_id: CallId) -> ModuleResult<()>;

    /// 同步调用入口，只对 `sync_methods()` 中声明的方法调用
    fn invoke_sync(&self, method: &str, _params: &str) -> ModuleResult<String> {
        Err(ModuleError::SyncNotSupported {
            module: self.name().to_string(),
            method: method.to_string(),
        })
    }
}

/// 如果脚本请求了结果则发送成功回调
pub fn reply_success(callbacks: &ModuleCallbacks, call_id: CallId, result: &str) {
    if call_id != NO_CALLBACK {
        callbacks.send_success(call_id, result);
    }
}

/// 如果脚本请求了结果则发送错误回调
pub fn reply_error(callbacks: &ModuleCallbacks, call_id: CallId, error: &str) {
    if call_id != NO_CALLBACK {
        callbacks.send_error(call_id, error);
    }
}
