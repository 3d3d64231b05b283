//! JavaScript Binding Adapter using rquickjs
//!
//! Owns one QuickJS runtime/context pair, installs the bridge's host entry
//! points as globals and delivers module results back into script code.
//!
//! Host functions capture an `Arc` of the executor's shared state, so any
//! number of executors can coexist in one process. Module results are
//! queued on a channel and never delivered inside the flush that produced
//! them: the executor drains the queue after the outermost script entry
//! returns, one callback at a time, so a callback that issues the next
//! native call does not grow the native stack. Results produced outside a
//! script entry are delivered by [`JsBridgeExecutor::pump_callbacks`].

use crossbeam_channel::{unbounded, Receiver};
use rquickjs::convert::Coerced;
use rquickjs::function::{Rest, This};
use rquickjs::{Array, Context, Ctx, Exception, FromJs, Function, IntoJs, Object, Runtime, Value};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::Level;

use super::bootstrap::{
    self, BATCHED_BRIDGE, CALL_FUNCTION, FLUSH_QUEUE_HOOK, INIT_NATIVE_MODULES, INVOKE_CALLBACK,
    LOGGING_HOOK, MODULE_CONFIG, SYNC_CALL_HOOK,
};
use super::parser;
use super::protocol::CallId;
use crate::config::{BridgeConfig, FlushErrorPolicy};
use crate::core::error::{BridgeError, BridgeResult};
use crate::core::utils::truncate_for_log;
use crate::modules::{ModuleConfigEntry, ModuleRegistry, NativeModule};

/// Receives script exceptions raised while loading scripts or delivering callbacks.
pub type ExceptionHandler = Box<dyn Fn(&BridgeError) + Send + Sync>;

/// Executor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Uninitialized,
    ContextReady,
    ModulesRegistered,
    ConfigInjected,
    Running,
    Destroyed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingCallback {
    call_id: CallId,
    payload: String,
    is_error: bool,
}

/// State reachable from host functions.
struct BridgeShared {
    registry: RwLock<ModuleRegistry>,
    pending: Receiver<PendingCallback>,
    exception_handler: RwLock<Option<ExceptionHandler>>,
    flush_error_policy: FlushErrorPolicy,
}

impl BridgeShared {
    fn registry(&self) -> RwLockReadGuard<'_, ModuleRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, ModuleRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, err: &BridgeError) {
        tracing::error!(target: "bridge.js", "{}", err.script_report());
        let handler = self
            .exception_handler
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handler) = handler.as_ref() {
            handler(err);
        }
    }

    /// `nativeFlushQueueImmediate(queue)`
    fn flush_queue<'js>(&self, ctx: &Ctx<'js>, queue: Value<'js>) -> rquickjs::Result<()> {
        let text = stringify(ctx, queue)?.unwrap_or_default();
        self.process_queue(ctx, &text)
    }

    /// Parse a queue and dispatch it in array order. Results stay queued.
    fn process_queue(&self, ctx: &Ctx<'_>, text: &str) -> rquickjs::Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        let message = match parser::parse(text) {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(
                    target: "bridge.js",
                    "Dropping batch: {} ({})",
                    err,
                    truncate_for_log(text, 200)
                );
                return match self.flush_error_policy {
                    FlushErrorPolicy::Drop => Ok(()),
                    FlushErrorPolicy::Throw => Err(Exception::throw_message(ctx, &err.to_string())),
                };
            }
        };

        if !message.is_empty() {
            tracing::debug!(target: "bridge.js", "Dispatching {} calls", message.call_count());
            self.registry().dispatch(&message);
        }
        Ok(())
    }

    fn deliver_pending(&self, ctx: &Ctx<'_>) -> usize {
        let mut delivered = 0;
        while let Ok(pending) = self.pending.try_recv() {
            self.invoke_callback(ctx, &pending);
            delivered += 1;
        }
        delivered
    }

    /// The single path by which results reach script code.
    fn invoke_callback(&self, ctx: &Ctx<'_>, pending: &PendingCallback) {
        tracing::debug!(
            target: "bridge.js",
            "Invoking callback {} (error: {})",
            pending.call_id,
            pending.is_error
        );
        if let Err(err) = self.try_invoke_callback(ctx, pending) {
            let err = take_error(ctx, err);
            self.report(&err);
        }
    }

    fn try_invoke_callback<'js>(&self, ctx: &Ctx<'js>, pending: &PendingCallback) -> rquickjs::Result<()> {
        let Some(bridge) = ctx.globals().get::<_, Option<Object<'js>>>(BATCHED_BRIDGE)? else {
            tracing::warn!(
                target: "bridge.js",
                "Cannot deliver callback {}: {} is not installed",
                pending.call_id,
                BATCHED_BRIDGE
            );
            return Ok(());
        };
        let invoke: Function<'js> = bridge.get(INVOKE_CALLBACK)?;
        let args = callback_args(ctx, pending)?;
        let returned: Value<'js> = invoke.call((This(bridge), pending.call_id, args))?;
        self.process_returned_queue(ctx, returned)
    }

    fn process_returned_queue<'js>(&self, ctx: &Ctx<'js>, returned: Value<'js>) -> rquickjs::Result<()> {
        if returned.is_null() || returned.is_undefined() {
            return Ok(());
        }
        let text = stringify(ctx, returned)?.unwrap_or_default();
        self.process_queue(ctx, &text)
    }

    /// `nativeCallSyncHook(moduleId, methodId, args)`
    fn call_sync<'js>(
        &self,
        ctx: &Ctx<'js>,
        module_id: i32,
        method_id: i32,
        args: Value<'js>,
    ) -> rquickjs::Result<Value<'js>> {
        let params = if args.is_undefined() {
            "[]".to_string()
        } else {
            stringify(ctx, args)?.unwrap_or_else(|| "[]".to_string())
        };
        let result = self
            .registry()
            .call_serializable_native_hook(module_id, method_id, &params);
        if result.is_empty() {
            return Ok(Value::new_null(ctx.clone()));
        }
        payload_to_value(ctx, &result)
    }

    fn call_function<'js>(
        &self,
        ctx: &Ctx<'js>,
        module: &str,
        method: &str,
        args_json: &str,
    ) -> rquickjs::Result<()> {
        let bridge: Object<'js> = ctx.globals().get(BATCHED_BRIDGE)?;
        let call: Function<'js> = bridge.get(CALL_FUNCTION)?;
        let args = ctx.json_parse(args_json)?;
        let returned: Value<'js> = call.call((This(bridge), module, method, args))?;
        self.process_returned_queue(ctx, returned)
    }
}

/// Canonical text form of a script value (`JSON.stringify`).
fn stringify<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<Option<String>> {
    match ctx.json_stringify(value)? {
        Some(text) => Ok(Some(text.to_string()?)),
        None => Ok(None),
    }
}

/// Results are JSON text when the module produced JSON, plain strings otherwise.
fn payload_to_value<'js>(ctx: &Ctx<'js>, payload: &str) -> rquickjs::Result<Value<'js>> {
    if serde_json::from_str::<serde_json::Value>(payload).is_ok() {
        ctx.json_parse(payload)
    } else {
        payload.into_js(ctx)
    }
}

/// `[error]` or `[null, result]`
///
/// The message queue tells the two apart by a non-null first slot, so an
/// error payload that decodes to `null` is passed as its raw text.
fn callback_args<'js>(ctx: &Ctx<'js>, pending: &PendingCallback) -> rquickjs::Result<Array<'js>> {
    let args = Array::new(ctx.clone())?;
    let payload = payload_to_value(ctx, &pending.payload)?;
    if pending.is_error {
        if payload.is_null() || payload.is_undefined() {
            args.set(0, pending.payload.as_str())?;
        } else {
            args.set(0, payload)?;
        }
    } else {
        args.set(0, Value::new_null(ctx.clone()))?;
        args.set(1, payload)?;
    }
    Ok(args)
}

fn take_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> BridgeError {
    if matches!(err, rquickjs::Error::Exception) {
        script_error(ctx, ctx.catch())
    } else {
        err.into()
    }
}

fn script_error<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> BridgeError {
    if let Some(exception) = value.as_exception() {
        return BridgeError::ScriptExecution {
            message: exception
                .message()
                .unwrap_or_else(|| "Unknown script error".to_string()),
            stack: exception.stack().filter(|s| !s.is_empty()),
        };
    }
    let message = Coerced::<String>::from_js(ctx, value)
        .map(|c| c.0)
        .unwrap_or_else(|_| "Unknown script error".to_string());
    BridgeError::ScriptExecution {
        message,
        stack: None,
    }
}

/// 日志级别映射：数字级别 (0 trace, 1 info, 2 warn, 3 error) 或文本级别
pub fn script_log_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "0" | "trace" => Level::TRACE,
        "2" | "warn" | "warning" => Level::WARN,
        "3" | "error" => Level::ERROR,
        "debug" => Level::DEBUG,
        _ => Level::INFO,
    }
}

macro_rules! script_event {
    ($target:literal, $level:expr, $message:expr) => {{
        let level = $level;
        if level == Level::ERROR {
            tracing::error!(target: $target, "{}", $message);
        } else if level == Level::WARN {
            tracing::warn!(target: $target, "{}", $message);
        } else if level == Level::DEBUG {
            tracing::debug!(target: $target, "{}", $message);
        } else if level == Level::TRACE {
            tracing::trace!(target: $target, "{}", $message);
        } else {
            tracing::info!(target: $target, "{}", $message);
        }
    }};
}

fn install_globals<'js>(
    ctx: &Ctx<'js>,
    shared: &Arc<BridgeShared>,
    config: &BridgeConfig,
) -> rquickjs::Result<()> {
    let globals = ctx.globals();
    globals.set("global", globals.clone())?;
    globals.set("__DEV__", config.dev_mode)?;

    // ==================== Console API ====================
    let console_obj = Object::new(ctx.clone())?;
    let forward = config.logging.forward_script_console;
    for (name, level) in [
        ("log", Level::INFO),
        ("info", Level::INFO),
        ("debug", Level::DEBUG),
        ("trace", Level::TRACE),
        ("warn", Level::WARN),
        ("error", Level::ERROR),
    ] {
        console_obj.set(
            name,
            Function::new(ctx.clone(), move |args: Rest<Coerced<String>>| {
                if forward {
                    let msg = args.0.iter().map(|a| a.0.as_str()).collect::<Vec<_>>().join(" ");
                    script_event!("script.console", level, msg);
                }
            })?,
        )?;
    }
    globals.set("console", console_obj)?;

    // ==================== Bridge entry points ====================
    let bridge = Arc::clone(shared);
    globals.set(
        FLUSH_QUEUE_HOOK,
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, queue: Value<'js>| {
            bridge.flush_queue(&ctx, queue)
        })?,
    )?;

    let bridge = Arc::clone(shared);
    globals.set(
        SYNC_CALL_HOOK,
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, module_id: i32, method_id: i32, args: Value<'js>| {
                bridge.call_sync(&ctx, module_id, method_id, args)
            },
        )?,
    )?;

    globals.set(
        LOGGING_HOOK,
        Function::new(ctx.clone(), |level: Coerced<String>, message: Coerced<String>| {
            script_event!("script.log", script_log_level(&level.0), message.0);
        })?,
    )?;

    Ok(())
}

/// 宿主自定义全局函数：参数按 JSON 解码，返回值按 JSON 编码
pub type HostFunctionResult = BridgeResult<serde_json::Value>;

fn install_host_function<'js, F>(ctx: &Ctx<'js>, name: &str, callback: F) -> rquickjs::Result<()>
where
    F: Fn(Vec<serde_json::Value>) -> HostFunctionResult + Send + Sync + 'static,
{
    let function = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
            let mut decoded = Vec::with_capacity(args.0.len());
            for arg in args.0 {
                let value = match stringify(&ctx, arg)? {
                    Some(text) => serde_json::from_str(&text).unwrap_or(serde_json::Value::Null),
                    None => serde_json::Value::Null,
                };
                decoded.push(value);
            }
            match callback(decoded) {
                Ok(result) => ctx.json_parse(result.to_string()),
                Err(err) => Err(Exception::throw_message(&ctx, &err.to_string())),
            }
        },
    )?;
    ctx.globals().set(name, function)
}

/// JavaScript side of the bridge.
///
/// ```ignore
/// let mut executor = JsBridgeExecutor::new(BridgeConfig::default())?;
/// executor.initialize()?;
/// executor.register_modules(vec![Box::new(DeviceInfoModule::new())])?;
/// executor.inject_module_config()?;
/// executor.load_script(bundle, "index.bundle.js")?;
/// ```
pub struct JsBridgeExecutor {
    // context 必须先于 runtime 释放
    context: Option<Context>,
    runtime: Option<Runtime>,
    shared: Arc<BridgeShared>,
    config: BridgeConfig,
    state: ExecutorState,
}

impl JsBridgeExecutor {
    /// 创建执行器；脚本上下文在 [`initialize`](Self::initialize) 中创建
    pub fn new(config: BridgeConfig) -> BridgeResult<Self> {
        config.validate()?;

        let (tx, rx) = unbounded();
        let registry = ModuleRegistry::new();
        registry.set_callback_handler(Box::new(move |call_id, payload, is_error| {
            let _ = tx.send(PendingCallback {
                call_id,
                payload: payload.to_string(),
                is_error,
            });
        }))?;

        let shared = Arc::new(BridgeShared {
            registry: RwLock::new(registry),
            pending: rx,
            exception_handler: RwLock::new(None),
            flush_error_policy: config.flush_error_policy,
        });

        Ok(Self {
            context: None,
            runtime: None,
            shared,
            config,
            state: ExecutorState::Uninitialized,
        })
    }

    /// 创建脚本上下文，安装全局对象与宿主入口，按配置加载 bootstrap 脚本
    pub fn initialize(&mut self) -> BridgeResult<()> {
        if self.state != ExecutorState::Uninitialized {
            return Err(BridgeError::InvalidState(format!(
                "initialize called in state {:?}",
                self.state
            )));
        }

        let runtime = Runtime::new().map_err(|e| BridgeError::Init(e.to_string()))?;
        let context = Context::full(&runtime).map_err(|e| BridgeError::Init(e.to_string()))?;

        context
            .with(|ctx| {
                install_globals(&ctx, &self.shared, &self.config).map_err(|e| take_error(&ctx, e))
            })
            .map_err(|e| BridgeError::Init(e.to_string()))?;

        if self.config.load_bootstrap {
            for script in bootstrap::scripts() {
                tracing::debug!(target: "bridge.js", "Loading bootstrap {}", script.label);
                context
                    .with(|ctx| {
                        ctx.eval::<(), _>(script.source)
                            .map_err(|e| take_error(&ctx, e))
                    })
                    .map_err(|e| BridgeError::Init(format!("{}: {}", script.label, e.script_report())))?;
            }
        }

        self.runtime = Some(runtime);
        self.context = Some(context);
        self.state = ExecutorState::ContextReady;
        tracing::info!(target: "bridge.js", "JavaScript context initialized");
        Ok(())
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// 注册模块，返回实际新增的数量
    ///
    /// 在配置注入后注册的模块，需要再次调用 [`inject_module_config`](Self::inject_module_config)
    /// 才能在脚本侧使用。
    pub fn register_modules(&mut self, modules: Vec<Box<dyn NativeModule>>) -> BridgeResult<usize> {
        self.ensure_alive()?;
        let added = self.shared.registry_mut().register_modules(modules);
        if added > 0 && self.state != ExecutorState::Uninitialized {
            self.state = ExecutorState::ModulesRegistered;
        }
        Ok(added)
    }

    pub fn module_names(&self) -> Vec<String> {
        self.shared.registry().module_names()
    }

    /// 在注册表上执行只读查询
    pub fn with_registry<R>(&self, f: impl FnOnce(&ModuleRegistry) -> R) -> R {
        f(&self.shared.registry())
    }

    /// 把模块配置注入为 `__fbBatchedBridgeConfig`，并重建 `NativeModules`
    pub fn inject_module_config(&mut self) -> BridgeResult<()> {
        let context = self.context()?;

        let entries: Vec<serde_json::Value> = self
            .shared
            .registry()
            .module_config()
            .iter()
            .map(ModuleConfigEntry::to_json)
            .collect();
        let module_count = entries.len();
        let config_json = serde_json::json!({ "remoteModuleConfig": entries }).to_string();

        context.with(|ctx| {
            let inject = || -> rquickjs::Result<()> {
                let value = ctx.json_parse(config_json.as_str())?;
                let globals = ctx.globals();
                globals.set(MODULE_CONFIG, value)?;
                if let Some(init) = globals.get::<_, Option<Function>>(INIT_NATIVE_MODULES)? {
                    init.call::<_, ()>(())?;
                }
                Ok(())
            };
            inject().map_err(|e| take_error(&ctx, e))
        })?;

        self.state = ExecutorState::ConfigInjected;
        tracing::info!(target: "bridge.js", "Injected config for {} modules", module_count);
        Ok(())
    }

    /// 执行脚本
    ///
    /// 脚本异常交给异常处理器（没有处理器时只记录日志），不会作为错误返回。
    pub fn load_script(&mut self, source: &str, label: &str) -> BridgeResult<()> {
        let context = self.context()?;
        tracing::info!(target: "bridge.js", "Loading script {} ({} bytes)", label, source.len());

        let outcome = context.with(|ctx| {
            ctx.eval::<(), _>(source)
                .map_err(|e| take_error(&ctx, e))
        });
        if let Err(err) = outcome {
            tracing::error!(target: "bridge.js", "Script {} threw", label);
            self.shared.report(&err);
        }
        self.settle();

        if self.state == ExecutorState::ConfigInjected {
            self.state = ExecutorState::Running;
        }
        Ok(())
    }

    /// 求值表达式并返回其 JSON 文本（`undefined` 返回 `None`）
    pub fn eval_to_json(&self, expression: &str) -> BridgeResult<Option<String>> {
        let context = self.context()?;
        context.with(|ctx| {
            let value: Value = ctx.eval(expression).map_err(|e| take_error(&ctx, e))?;
            stringify(&ctx, value).map_err(|e| take_error(&ctx, e))
        })
    }

    pub fn set_exception_handler<F>(&self, handler: F)
    where
        F: Fn(&BridgeError) + Send + Sync + 'static,
    {
        *self
            .shared
            .exception_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(handler));
    }

    /// 安装宿主自定义的全局函数
    ///
    /// 参数以 JSON 值传入（`undefined` 与函数变为 `null`），返回值以 JSON 值
    /// 回到脚本；返回错误时脚本侧抛出 `Error`。同名全局会被覆盖。
    pub fn install_global_function<F>(&self, name: &str, callback: F) -> BridgeResult<()>
    where
        F: Fn(Vec<serde_json::Value>) -> HostFunctionResult + Send + Sync + 'static,
    {
        let context = self.context()?;
        if bootstrap::is_reserved_global(name) {
            return Err(BridgeError::ReservedGlobal(name.to_string()));
        }
        context.with(|ctx| {
            install_host_function(&ctx, name, callback).map_err(|e| take_error(&ctx, e))
        })?;
        tracing::debug!(target: "bridge.js", "Installed global function {}", name);
        Ok(())
    }

    /// 向脚本投递一个结果
    ///
    /// 供宿主在脚本帧之外使用；flush 期间产生的结果由适配器自行投递。
    pub fn invoke_callback(&self, call_id: CallId, result: &str, is_error: bool) -> BridgeResult<()> {
        let context = self.context()?;
        let pending = PendingCallback {
            call_id,
            payload: result.to_string(),
            is_error,
        };
        context.with(|ctx| self.shared.invoke_callback(&ctx, &pending));
        self.settle();
        Ok(())
    }

    /// 投递所有在脚本帧之外产生的模块结果，返回投递数量
    ///
    /// 回调中发起的新调用所产生的结果也在这里一并投递。
    pub fn pump_callbacks(&self) -> BridgeResult<usize> {
        self.context()?;
        let delivered = self.settle();
        if delivered > 0 {
            tracing::debug!(target: "bridge.js", "Pumped {} callbacks", delivered);
        }
        Ok(delivered)
    }

    /// 调用脚本侧已注册的可调用模块方法（`callFunctionReturnFlushedQueue`）
    pub fn call_function(&self, module: &str, method: &str, args_json: &str) -> BridgeResult<()> {
        let context = self.context()?;
        match serde_json::from_str::<serde_json::Value>(args_json) {
            Ok(serde_json::Value::Array(_)) => {}
            Ok(_) => return Err(BridgeError::malformed("call arguments must be a JSON array")),
            Err(e) => return Err(BridgeError::malformed(format!("call arguments: {e}"))),
        }

        context.with(|ctx| {
            if let Err(err) = self.shared.call_function(&ctx, module, method, args_json) {
                let err = take_error(&ctx, err);
                self.shared.report(&err);
            }
        });
        self.settle();
        Ok(())
    }

    /// 释放脚本上下文并清空注册表；之后所有操作都返回 `InvalidState`
    pub fn destroy(&mut self) {
        if self.state == ExecutorState::Destroyed {
            return;
        }
        self.context = None;
        self.runtime = None;
        *self.shared.registry_mut() = ModuleRegistry::new();
        while self.shared.pending.try_recv().is_ok() {}
        self.state = ExecutorState::Destroyed;
        tracing::info!(target: "bridge.js", "JavaScript executor destroyed");
    }

    fn ensure_alive(&self) -> BridgeResult<()> {
        if self.state == ExecutorState::Destroyed {
            return Err(BridgeError::InvalidState("executor destroyed".to_string()));
        }
        Ok(())
    }

    fn context(&self) -> BridgeResult<&Context> {
        self.ensure_alive()?;
        self.context
            .as_ref()
            .ok_or_else(|| BridgeError::InvalidState("context not initialized".to_string()))
    }

    /// 交替投递排队的结果与执行 promise 任务，直到两者都为空
    ///
    /// 每个回调都从这里单独进入脚本，回调链再长也不会嵌套。
    fn settle(&self) -> usize {
        let Some(context) = self.context.as_ref() else {
            return 0;
        };
        let mut delivered = 0;
        loop {
            let batch = context.with(|ctx| self.shared.deliver_pending(&ctx));
            let jobs = self.run_pending_jobs();
            delivered += batch;
            if batch == 0 && jobs == 0 {
                return delivered;
            }
        }
    }

    fn run_pending_jobs(&self) -> usize {
        let (Some(runtime), Some(context)) = (self.runtime.as_ref(), self.context.as_ref()) else {
            return 0;
        };
        let mut executed = 0;
        loop {
            match runtime.execute_pending_job() {
                Ok(true) => executed += 1,
                Ok(false) => return executed,
                Err(_) => {
                    executed += 1;
                    let err = context.with(|ctx| {
                        let value = ctx.catch();
                        script_error(&ctx, value)
                    });
                    self.shared.report(&err);
                }
            }
        }
    }
}

impl Drop for JsBridgeExecutor {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for JsBridgeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsBridgeExecutor")
            .field("state", &self.state)
            .field("modules", &self.module_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn ready() -> JsBridgeExecutor {
        let mut executor = JsBridgeExecutor::new(BridgeConfig::default()).unwrap();
        executor.initialize().unwrap();
        executor
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(script_log_level("0"), Level::TRACE);
        assert_eq!(script_log_level("1"), Level::INFO);
        assert_eq!(script_log_level("2"), Level::WARN);
        assert_eq!(script_log_level("3"), Level::ERROR);
        assert_eq!(script_log_level("error"), Level::ERROR);
        assert_eq!(script_log_level("Warn"), Level::WARN);
        assert_eq!(script_log_level("debug"), Level::DEBUG);
        assert_eq!(script_log_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_lifecycle() {
        let mut executor = JsBridgeExecutor::new(BridgeConfig::default()).unwrap();
        assert_eq!(executor.state(), ExecutorState::Uninitialized);
        assert!(matches!(
            executor.load_script("1", "early.js"),
            Err(BridgeError::InvalidState(_))
        ));

        executor.initialize().unwrap();
        assert_eq!(executor.state(), ExecutorState::ContextReady);
        assert!(executor.initialize().is_err());

        executor.inject_module_config().unwrap();
        assert_eq!(executor.state(), ExecutorState::ConfigInjected);
        executor.load_script("var x = 1;", "main.js").unwrap();
        assert_eq!(executor.state(), ExecutorState::Running);

        executor.destroy();
        assert_eq!(executor.state(), ExecutorState::Destroyed);
        assert!(executor.module_names().is_empty());
        assert!(matches!(
            executor.load_script("1", "late.js"),
            Err(BridgeError::InvalidState(_))
        ));
        assert!(executor.pump_callbacks().is_err());
    }

    #[test]
    fn test_standard_globals() {
        let executor = ready();
        assert_eq!(executor.eval_to_json("__DEV__").unwrap().as_deref(), Some("true"));
        assert_eq!(
            executor.eval_to_json("global === globalThis").unwrap().as_deref(),
            Some("true")
        );
        assert_eq!(
            executor
                .eval_to_json("typeof nativeFlushQueueImmediate + typeof nativeCallSyncHook + typeof nativeLoggingHook")
                .unwrap()
                .as_deref(),
            Some("\"functionfunctionfunction\"")
        );
        assert_eq!(
            executor.eval_to_json("typeof __fbBatchedBridge").unwrap().as_deref(),
            Some("\"object\"")
        );
        assert_eq!(executor.eval_to_json("undefined").unwrap(), None);
    }

    #[test]
    fn test_console_and_logging_hook_do_not_throw() {
        let executor = ready();
        let out = executor
            .eval_to_json("console.log('a', 1, {b: 2}); console.error('x'); nativeLoggingHook(2, 'warned'); nativeLoggingHook('error', 'bad'); 'ok'")
            .unwrap();
        assert_eq!(out.as_deref(), Some("\"ok\""));
    }

    #[test]
    fn test_without_bootstrap() {
        let config = BridgeConfig {
            load_bootstrap: false,
            ..BridgeConfig::default()
        };
        let mut executor = JsBridgeExecutor::new(config).unwrap();
        executor.initialize().unwrap();
        assert_eq!(
            executor.eval_to_json("typeof __fbBatchedBridge").unwrap().as_deref(),
            Some("\"undefined\"")
        );
        // 没有消息队列时结果被记录后丢弃
        executor.invoke_callback(1, "\"x\"", false).unwrap();
        executor.inject_module_config().unwrap();
        assert_eq!(
            executor
                .eval_to_json("__fbBatchedBridgeConfig.remoteModuleConfig.length")
                .unwrap()
                .as_deref(),
            Some("0")
        );
    }

    #[test]
    fn test_script_exception_goes_to_handler() {
        let mut executor = ready();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        executor.set_exception_handler(move |err| sink.lock().unwrap().push(err.clone()));

        executor
            .load_script("function fail() { throw new Error('boom'); }\nfail();", "fail.js")
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            BridgeError::ScriptExecution { message, .. } => assert!(message.contains("boom")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_install_global_function() {
        let executor = ready();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        executor
            .install_global_function("hostSum", move |args| {
                sink.lock().unwrap().push(args.clone());
                let sum: i64 = args.iter().filter_map(serde_json::Value::as_i64).sum();
                Ok(serde_json::json!({ "sum": sum, "argc": args.len() }))
            })
            .unwrap();
        executor
            .install_global_function("hostFail", |_| Err(BridgeError::malformed("bad input")))
            .unwrap();

        assert_eq!(
            executor.eval_to_json("hostSum(1, 2, 3)").unwrap().as_deref(),
            Some(r#"{"argc":3,"sum":6}"#)
        );
        executor.eval_to_json("hostSum({a: [1]}, undefined)").unwrap();
        assert_eq!(
            calls.lock().unwrap()[1],
            vec![serde_json::json!({ "a": [1] }), serde_json::Value::Null]
        );

        let caught = executor
            .eval_to_json("try { hostFail(); 'no' } catch (e) { e.message }")
            .unwrap()
            .unwrap();
        assert!(caught.contains("bad input"));
    }

    #[test]
    fn test_install_global_function_guards() {
        let executor = ready();
        assert!(matches!(
            executor.install_global_function(FLUSH_QUEUE_HOOK, |_| Ok(serde_json::Value::Null)),
            Err(BridgeError::ReservedGlobal(_))
        ));

        let mut early = JsBridgeExecutor::new(BridgeConfig::default()).unwrap();
        assert!(matches!(
            early.install_global_function("x", |_| Ok(serde_json::Value::Null)),
            Err(BridgeError::InvalidState(_))
        ));
        early.destroy();
    }

    #[test]
    fn test_invalid_call_function_args() {
        let executor = ready();
        assert!(matches!(
            executor.call_function("M", "m", "{"),
            Err(BridgeError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            executor.call_function("M", "m", "{}"),
            Err(BridgeError::MalformedEnvelope(_))
        ));
    }
}
