//! # Script Bridge
//!
//! A miniature native/script bridge: script code running in an embedded
//! QuickJS context calls host modules through batched call envelopes, and
//! host modules deliver results back through a single callback path.
//!
//! ## Features
//!
//! - **Batched Call Protocol**: compact four-array envelope with a hand-written parser
//! - **Module Registry**: stable module/method IDs, promise and sync method declaration
//! - **JavaScript Adapter**: rquickjs context with flush, sync and logging entry points
//! - **Reference Module**: `DeviceInfo` behind a pluggable provider
//!
//! ### Example
//!
//! ```ignore
//! use script_bridge::bindings::JsBridgeExecutor;
//! use script_bridge::config::BridgeConfig;
//! use script_bridge::modules::DeviceInfoModule;
//!
//! let mut executor = JsBridgeExecutor::new(BridgeConfig::load_or_default())?;
//! executor.initialize()?;
//! executor.register_modules(vec![Box::new(DeviceInfoModule::new())])?;
//! executor.inject_module_config()?;
//! executor.load_script(
//!     "NativeModules.DeviceInfo.getUniqueId().then(id => console.log(id));",
//!     "main.js",
//! )?;
//! ```
//!
//! ## Modules
//!
//! - [`core`]: errors, logging, helpers
//! - [`config`]: bridge configuration
//! - [`bindings`]: envelope protocol, parser and the JavaScript adapter
//! - [`modules`]: module contract, registry and the DeviceInfo module

/// Core infrastructure: errors, logging initialisation, helpers
pub mod core;
/// Configuration system
pub mod config;
/// Batched call protocol, parser and script adapter
pub mod bindings;
/// Native module contract, registry and reference modules
pub mod modules;

pub use bindings::{parse, BridgeMessage, ExecutorState, JsBridgeExecutor};
pub use config::BridgeConfig;
pub use crate::core::{BridgeError, BridgeResult};
pub use modules::{ModuleRegistry, NativeModule};
