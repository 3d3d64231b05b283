//! Script-side bootstrap assets and the global names both sides agree on.
//!
//! The adapter loads these into a fresh context when
//! `BridgeConfig::load_bootstrap` is set. Hosts that ship their own message
//! queue can turn that off, but must provide the same globals.

/// Message queue object on the script side.
pub const BATCHED_BRIDGE: &str = "__fbBatchedBridge";
/// Module configuration global read by the proxy builder.
pub const MODULE_CONFIG: &str = "__fbBatchedBridgeConfig";
/// Function that (re)builds `NativeModules` from [`MODULE_CONFIG`].
pub const INIT_NATIVE_MODULES: &str = "__fbInitializeNativeModules";

/// Host entry points installed as globals.
pub const FLUSH_QUEUE_HOOK: &str = "nativeFlushQueueImmediate";
pub const SYNC_CALL_HOOK: &str = "nativeCallSyncHook";
pub const LOGGING_HOOK: &str = "nativeLoggingHook";

/// Methods called on [`BATCHED_BRIDGE`] by the host.
pub const INVOKE_CALLBACK: &str = "invokeCallbackAndReturnFlushedQueue";
pub const CALL_FUNCTION: &str = "callFunctionReturnFlushedQueue";

/// Globals owned by the bridge; hosts may not replace them.
pub fn is_reserved_global(name: &str) -> bool {
    [
        BATCHED_BRIDGE,
        MODULE_CONFIG,
        INIT_NATIVE_MODULES,
        FLUSH_QUEUE_HOOK,
        SYNC_CALL_HOOK,
        LOGGING_HOOK,
    ]
    .contains(&name)
}

/// A script asset with the label used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapScript {
    pub label: &'static str,
    pub source: &'static str,
}

pub const MESSAGE_QUEUE: BootstrapScript = BootstrapScript {
    label: "MessageQueue.js",
    source: include_str!("assets/message_queue.js"),
};

pub const NATIVE_MODULES: BootstrapScript = BootstrapScript {
    label: "NativeModules.js",
    source: include_str!("assets/native_modules.js"),
};

/// Assets in load order; the module builder needs the queue.
pub fn scripts() -> [BootstrapScript; 2] {
    [MESSAGE_QUEUE, NATIVE_MODULES]
}
