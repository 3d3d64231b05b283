//! 模块注册表
//!
//! 管理所有已注册的 Native 模块，分配稳定的模块 ID / 方法 ID，
//! 并把解码后的调用路由到对应模块。
//!
//! - 模块 ID 等于注册顺序中的位置，从 0 开始，永不复用
//! - 方法 ID 等于注册时 `methods()` 返回序列中的位置
//! - 所有失败都在注册表边界内转换为错误回调或空结果，不会向批处理循环传播

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use super::{CallbackHandler, ModuleCallbacks, ModuleError, NativeModule};
use crate::bindings::protocol::{BridgeMessage, CallId};
use crate::core::error::{BridgeError, BridgeResult};

/// 注册表内部的模块描述
struct ModuleEntry {
    name: String,
    methods: Vec<String>,
    promise_method_ids: Vec<usize>,
    sync_method_ids: Vec<usize>,
    module: Box<dyn NativeModule>,
}

/// 暴露给脚本的单个模块配置：
/// `[moduleName, constants, methodNames, promiseMethodIds, syncMethodIds]`
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleConfigEntry {
    pub name: String,
    pub constants: Option<Map<String, Value>>,
    pub methods: Vec<String>,
    pub promise_method_ids: Vec<usize>,
    pub sync_method_ids: Vec<usize>,
}

impl ModuleConfigEntry {
    /// 编码为配置元组的 JSON 形式
    pub fn to_json(&self) -> Value {
        Value::Array(vec![
            Value::String(self.name.clone()),
            self.constants
                .clone()
                .map(Value::Object)
                .unwrap_or(Value::Null),
            Value::from(self.methods.clone()),
            Value::from(self.promise_method_ids.clone()),
            Value::from(self.sync_method_ids.clone()),
        ])
    }
}

#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<ModuleEntry>,
    modules_by_name: HashMap<String, usize>,
    callbacks: ModuleCallbacks,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用初始模块列表创建注册表
    pub fn with_modules(modules: Vec<Box<dyn NativeModule>>) -> Self {
        let mut registry = Self::new();
        registry.register_modules(modules);
        registry
    }

    /// 注册模块
    ///
    /// 新模块追加到末尾并获得下一个 ID。与已注册模块同名的模块被丢弃
    /// （已有模块保留），记录警告但不报错。返回实际新增的模块数量。
    pub fn register_modules(&mut self, modules: Vec<Box<dyn NativeModule>>) -> usize {
        let start_index = self.modules.len();

        for mut module in modules {
            let name = module.name().to_string();
            if self.modules_by_name.contains_key(&name) {
                let err = BridgeError::DuplicateModuleRegistration(name);
                tracing::warn!(target: "bridge.registry", "{}", err);
                continue;
            }

            module.attach(self.callbacks.clone());
            let entry = Self::describe(name, module);
            self.modules.push(entry);
        }

        self.update_module_names_from_index(start_index);

        let added = self.modules.len() - start_index;
        tracing::info!(
            target: "bridge.registry",
            "Registered {} new modules, total: {}",
            added,
            self.modules.len()
        );
        added
    }

    /// 注册单个模块，重名时返回错误
    pub fn register<M: NativeModule + 'static>(&mut self, module: M) -> BridgeResult<usize> {
        let name = module.name().to_string();
        if self.modules_by_name.contains_key(&name) {
            return Err(BridgeError::DuplicateModuleRegistration(name));
        }
        self.register_modules(vec![Box::new(module)]);
        Ok(self.modules.len() - 1)
    }

    fn describe(name: String, module: Box<dyn NativeModule>) -> ModuleEntry {
        let methods = module.methods();
        let position = |method: &String| methods.iter().position(|m| m == method);

        let mut promise_method_ids = Vec::new();
        for method in module.promise_methods() {
            match position(&method) {
                Some(id) => promise_method_ids.push(id),
                None => tracing::warn!(
                    target: "bridge.registry",
                    "Promise method '{}' is not exported by '{}'",
                    method,
                    name
                ),
            }
        }

        let mut sync_method_ids = Vec::new();
        for method in module.sync_methods() {
            match position(&method) {
                Some(id) if promise_method_ids.contains(&id) => tracing::warn!(
                    target: "bridge.registry",
                    "Method '{}.{}' cannot be both promise and sync, keeping promise",
                    name,
                    method
                ),
                Some(id) => sync_method_ids.push(id),
                None => tracing::warn!(
                    target: "bridge.registry",
                    "Sync method '{}' is not exported by '{}'",
                    method,
                    name
                ),
            }
        }

        ModuleEntry {
            name,
            methods,
            promise_method_ids,
            sync_method_ids,
            module,
        }
    }

    /// 增量更新名称映射，只处理新增的条目
    fn update_module_names_from_index(&mut self, start_index: usize) {
        for (id, entry) in self.modules.iter().enumerate().skip(start_index) {
            self.modules_by_name.insert(entry.name.clone(), id);
            tracing::debug!(target: "bridge.registry", "Mapped module '{}' to ID {}", entry.name, id);
        }
    }

    /// 按 ID 顺序返回模块名称
    pub fn module_names(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.name.clone()).collect()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn has_module(&self, module_id: i32) -> bool {
        self.entry(module_id).is_some()
    }

    pub fn module_id(&self, name: &str) -> Option<usize> {
        self.modules_by_name.get(name).copied()
    }

    pub fn module_name(&self, module_id: i32) -> Option<&str> {
        self.entry(module_id).map(|m| m.name.as_str())
    }

    /// 注册时记录的方法名序列
    pub fn method_names(&self, module_id: i32) -> Vec<String> {
        self.entry(module_id)
            .map(|m| m.methods.clone())
            .unwrap_or_default()
    }

    pub fn method_count(&self, module_id: i32) -> usize {
        self.entry(module_id).map_or(0, |m| m.methods.len())
    }

    /// 构建暴露给脚本的模块配置，按注册顺序
    pub fn module_config(&self) -> Vec<ModuleConfigEntry> {
        self.modules
            .iter()
            .map(|entry| ModuleConfigEntry {
                name: entry.name.clone(),
                constants: entry.module.constants(),
                methods: entry.methods.clone(),
                promise_method_ids: entry.promise_method_ids.clone(),
                sync_method_ids: entry.sync_method_ids.clone(),
            })
            .collect()
    }

    /// 设置回调处理器；只能设置一次，第二次返回错误且不生效
    pub fn set_callback_handler(&self, handler: CallbackHandler) -> BridgeResult<()> {
        match self.callbacks.set_handler(handler) {
            Ok(()) => {
                tracing::debug!(target: "bridge.registry", "Callback handler set successfully");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    target: "bridge.registry",
                    "Callback handler already set, ignoring duplicate call"
                );
                Err(err)
            }
        }
    }

    pub fn send_success_callback(&self, call_id: CallId, result: &str) {
        self.callbacks.send_success(call_id, result);
    }

    pub fn send_error_callback(&self, call_id: CallId, error: &str) {
        self.callbacks.send_error(call_id, error);
    }

    /// 调用 Native 方法
    ///
    /// ID 无效、模块返回错误或 panic 时，都会以 `call_id` 发送一个错误回调，
    /// 从不向调用者传播。
    pub fn call_native_method(&self, module_id: i32, method_id: i32, params: &str, call_id: CallId) {
        tracing::debug!(
            target: "bridge.registry",
            "Calling method - Module ID: {}, Method ID: {}, Call ID: {}",
            module_id,
            method_id,
            call_id
        );

        let (entry, method) = match self.resolve(module_id, method_id) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::warn!(target: "bridge.registry", "{}", err);
                self.send_error_callback(call_id, &err.to_string());
                return;
            }
        };

        tracing::debug!(
            target: "bridge.registry",
            "Invoking method '{}' on module '{}'",
            method,
            entry.name
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            entry.module.invoke(method, params, call_id)
        }));

        let failure = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        let err = BridgeError::ModuleInvocationFailure {
            module: entry.name.clone(),
            method: method.to_string(),
            reason: failure,
        };
        tracing::error!(target: "bridge.registry", "{}", err);
        self.send_error_callback(call_id, &err.to_string());
    }

    /// 同步调用 Native 方法
    ///
    /// 只有模块声明为同步的方法才会被调用；其余情况（包括 ID 无效和模块失败）
    /// 返回空字符串并记录警告。
    pub fn call_serializable_native_hook(&self, module_id: i32, method_id: i32, params: &str) -> String {
        tracing::debug!(
            target: "bridge.registry",
            "Calling serializable native hook - Module ID: {}, Method ID: {}",
            module_id,
            method_id
        );

        let (entry, method) = match self.resolve(module_id, method_id) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::warn!(target: "bridge.registry", "{}", err);
                return String::new();
            }
        };

        if !entry.sync_method_ids.contains(&(method_id as usize)) {
            let err = ModuleError::SyncNotSupported {
                module: entry.name.clone(),
                method: method.to_string(),
            };
            tracing::warn!(target: "bridge.registry", "{}", err);
            return String::new();
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry.module.invoke_sync(method, params)));
        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                tracing::error!(
                    target: "bridge.registry",
                    "Exception in sync module method {}.{}: {}",
                    entry.name,
                    method,
                    err
                );
                String::new()
            }
            Err(payload) => {
                tracing::error!(
                    target: "bridge.registry",
                    "Panic in sync module method {}.{}: {}",
                    entry.name,
                    method,
                    panic_message(payload.as_ref())
                );
                String::new()
            }
        }
    }

    /// 按数组顺序分发一个批次中的所有调用
    pub fn dispatch(&self, message: &BridgeMessage) {
        let total = message.call_count();
        tracing::debug!(target: "bridge.registry", "Processing bridge message with {} calls", total);
        for (i, call) in message.calls().enumerate() {
            tracing::trace!(
                target: "bridge.registry",
                "Call {}/{}: Module={}, Method={}, Params={}, CallId={}",
                i + 1,
                total,
                call.module_id,
                call.method_id,
                call.params,
                call.callback_id
            );
            self.call_native_method(call.module_id, call.method_id, call.params, call.callback_id);
        }
    }

    fn entry(&self, module_id: i32) -> Option<&ModuleEntry> {
        usize::try_from(module_id)
            .ok()
            .and_then(|id| self.modules.get(id))
    }

    fn resolve(&self, module_id: i32, method_id: i32) -> BridgeResult<(&ModuleEntry, &str)> {
        let invalid = || BridgeError::InvalidIdentifier {
            module_id,
            method_id,
        };
        let entry = self.entry(module_id).ok_or_else(invalid)?;
        let method = usize::try_from(method_id)
            .ok()
            .and_then(|id| entry.methods.get(id))
            .ok_or_else(invalid)?;
        Ok((entry, method.as_str()))
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.module_names())
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown exception in module method".to_string()
    }
}
