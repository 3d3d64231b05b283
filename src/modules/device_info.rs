//! DeviceInfo 模块
//!
//! 与 react-native-device-info 兼容的参考模块，演示三种方法形态：
//!
//! | 方法 | 形态 |
//! |---|---|
//! | `getUniqueId` | promise |
//! | `getSystemVersion` | sync |
//! | `getDeviceId` | sync |
//! | `getModel` | 回调 |
//! | `getSystemName` | 回调 |
//!
//! 平台相关的查询通过 [`DeviceInfoProvider`] 注入，默认使用 [`HostDeviceInfo`]。
//! 所有结果都以 JSON 文本形式回传。

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::{reply_error, reply_success, ModuleCallbacks, ModuleError, ModuleResult, NativeModule};
use crate::bindings::protocol::CallId;

/// 平台设备信息查询接口
pub trait DeviceInfoProvider: Send + Sync {
    /// 设备唯一标识
    fn unique_id(&self) -> String;
    /// 系统版本
    fn system_version(&self) -> String;
    /// 设备型号
    fn model(&self) -> String;
    /// 系统名称（macOS / iOS / Android / Linux ...）
    fn system_name(&self) -> String;
    /// 设备标识（主机名或硬件标识）
    fn device_id(&self) -> String;
}

/// 基于当前宿主进程环境的默认实现
#[derive(Debug, Clone, Default)]
pub struct HostDeviceInfo;

impl HostDeviceInfo {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceInfoProvider for HostDeviceInfo {
    fn unique_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.system_name().as_bytes());
        hasher.update(b"|");
        hasher.update(self.device_id().as_bytes());
        hasher.update(b"|");
        hasher.update(std::env::consts::ARCH.as_bytes());
        hasher.update(b"|");
        hasher.update(num_cpus::get().to_le_bytes());
        hex::encode(hasher.finalize())
    }

    fn system_version(&self) -> String {
        if let Ok(version) = std::env::var("BRIDGE_SYSTEM_VERSION") {
            return version;
        }
        // Linux 下内核版本可直接读取
        std::fs::read_to_string("/proc/sys/kernel/osrelease")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn model(&self) -> String {
        format!("{} ({} cores)", std::env::consts::ARCH, num_cpus::get())
    }

    fn system_name(&self) -> String {
        match std::env::consts::OS {
            "macos" => "macOS",
            "ios" => "iOS",
            "android" => "Android",
            "linux" => "Linux",
            "windows" => "Windows",
            other => other,
        }
        .to_string()
    }

    fn device_id(&self) -> String {
        ["HOSTNAME", "COMPUTERNAME"]
            .iter()
            .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| "localhost".to_string())
    }
}

const GET_UNIQUE_ID: &str = "getUniqueId";
const GET_SYSTEM_VERSION: &str = "getSystemVersion";
const GET_DEVICE_ID: &str = "getDeviceId";
const GET_MODEL: &str = "getModel";
const GET_SYSTEM_NAME: &str = "getSystemName";

pub struct DeviceInfoModule {
    provider: Arc<dyn DeviceInfoProvider>,
    callbacks: ModuleCallbacks,
}

impl DeviceInfoModule {
    /// 使用宿主环境信息创建模块
    pub fn new() -> Self {
        Self::with_provider(Arc::new(HostDeviceInfo::new()))
    }

    pub fn with_provider(provider: Arc<dyn DeviceInfoProvider>) -> Self {
        Self {
            provider,
            callbacks: ModuleCallbacks::new(),
        }
    }

    fn query(&self, method: &str) -> Option<String> {
        let value = match method {
            GET_UNIQUE_ID => self.provider.unique_id(),
            GET_SYSTEM_VERSION => self.provider.system_version(),
            GET_DEVICE_ID => self.provider.device_id(),
            GET_MODEL => self.provider.model(),
            GET_SYSTEM_NAME => self.provider.system_name(),
            _ => return None,
        };
        Some(Value::String(value).to_string())
    }

    fn unknown(&self, method: &str) -> ModuleError {
        ModuleError::UnknownMethod {
            module: self.name().to_string(),
            method: method.to_string(),
        }
    }
}

impl Default for DeviceInfoModule {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeModule for DeviceInfoModule {
    fn name(&self) -> &str {
        "DeviceInfo"
    }

    fn methods(&self) -> Vec<String> {
        [
            GET_UNIQUE_ID,
            GET_SYSTEM_VERSION,
            GET_DEVICE_ID,
            GET_MODEL,
            GET_SYSTEM_NAME,
        ]
        .iter()
        .map(|m| m.to_string())
        .collect()
    }

    fn constants(&self) -> Option<Map<String, Value>> {
        let mut constants = Map::new();
        constants.insert("systemName".into(), Value::String(self.provider.system_name()));
        constants.insert(
            "systemVersion".into(),
            Value::String(self.provider.system_version()),
        );
        constants.insert("model".into(), Value::String(self.provider.model()));
        Some(constants)
    }

    fn promise_methods(&self) -> Vec<String> {
        vec![GET_UNIQUE_ID.to_string()]
    }

    fn sync_methods(&self) -> Vec<String> {
        vec![GET_SYSTEM_VERSION.to_string(), GET_DEVICE_ID.to_string()]
    }

    fn attach(&mut self, callbacks: ModuleCallbacks) {
        self.callbacks = callbacks;
    }

    fn invoke(&self, method: &str, _params: &str, call_id: CallId) -> ModuleResult<()> {
        tracing::debug!(target: "module.device_info", "Invoking {} (callId: {})", method, call_id);
        match self.query(method) {
            Some(result) => {
                reply_success(&self.callbacks, call_id, &result);
                Ok(())
            }
            None => {
                let err = self.unknown(method);
                reply_error(&self.callbacks, call_id, &err.to_string());
                tracing::warn!(target: "module.device_info", "{}", err);
                Ok(())
            }
        }
    }

    fn invoke_sync(&self, method: &str, _params: &str) -> ModuleResult<String> {
        tracing::debug!(target: "module.device_info", "Sync invoke {}", method);
        self.query(method).ok_or_else(|| self.unknown(method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::protocol::NO_CALLBACK;
    use crate::modules::ModuleRegistry;
    use std::sync::Mutex;

    struct FakeDevice;

    impl DeviceInfoProvider for FakeDevice {
        fn unique_id(&self) -> String {
            "fake-uuid".into()
        }
        fn system_version(&self) -> String {
            "14.2".into()
        }
        fn model(&self) -> String {
            "Pixel".into()
        }
        fn system_name(&self) -> String {
            "Android".into()
        }
        fn device_id(&self) -> String {
            "walleye".into()
        }
    }

    fn registry_with_fake() -> (ModuleRegistry, Arc<Mutex<Vec<(CallId, String, bool)>>>) {
        let mut registry = ModuleRegistry::new();
        registry
            .register(DeviceInfoModule::with_provider(Arc::new(FakeDevice)))
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry
            .set_callback_handler(Box::new(move |id, result, err| {
                sink.lock().unwrap().push((id, result.to_string(), err));
            }))
            .unwrap();
        (registry, seen)
    }

    #[test]
    fn test_method_ids_and_capabilities() {
        let (registry, _) = registry_with_fake();
        let config = registry.module_config();
        assert_eq!(config[0].name, "DeviceInfo");
        assert_eq!(config[0].methods[2], "getDeviceId");
        assert_eq!(config[0].promise_method_ids, vec![0]);
        assert_eq!(config[0].sync_method_ids, vec![1, 2]);
    }

    #[test]
    fn test_constants() {
        let module = DeviceInfoModule::with_provider(Arc::new(FakeDevice));
        let constants = module.constants().unwrap();
        assert_eq!(constants["systemName"], "Android");
        assert_eq!(constants["systemVersion"], "14.2");
        assert_eq!(constants["model"], "Pixel");
    }

    #[test]
    fn test_async_results_are_json_strings() {
        let (registry, seen) = registry_with_fake();
        registry.call_native_method(0, 0, "[]", 1);
        registry.call_native_method(0, 3, "[]", 2);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], (1, "\"fake-uuid\"".to_string(), false));
        assert_eq!(seen[1], (2, "\"Pixel\"".to_string(), false));
    }

    #[test]
    fn test_sync_hook() {
        let (registry, _) = registry_with_fake();
        assert_eq!(registry.call_serializable_native_hook(0, 1, "[]"), "\"14.2\"");
        assert_eq!(registry.call_serializable_native_hook(0, 2, "[]"), "\"walleye\"");
        // getModel 不是同步方法
        assert_eq!(registry.call_serializable_native_hook(0, 3, "[]"), "");
    }

    #[test]
    fn test_sentinel_call_is_silent() {
        let (registry, seen) = registry_with_fake();
        registry.call_native_method(0, 4, "[]", NO_CALLBACK);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_method_replies_error() {
        let module = DeviceInfoModule::with_provider(Arc::new(FakeDevice));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callbacks = ModuleCallbacks::new();
        callbacks
            .set_handler(Box::new(move |id, r, e| sink.lock().unwrap().push((id, r.to_string(), e))))
            .unwrap();
        let mut module = module;
        module.attach(callbacks);

        module.invoke("getBatteryLevel", "[]", 5).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].2);
        assert!(seen[0].1.contains("getBatteryLevel"));
        assert!(module.invoke_sync("getBatteryLevel", "[]").is_err());
    }

    #[test]
    fn test_host_unique_id_is_stable_hex() {
        let host = HostDeviceInfo::new();
        let id = host.unique_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, host.unique_id());
        assert!(!host.system_name().is_empty());
    }
}
