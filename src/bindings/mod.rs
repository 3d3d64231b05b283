//! Language Binding Layer
//!
//! Everything between script code and the module registry: the batched call
//! envelope, its parser, and the embedded JavaScript adapter.
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Script Context                          │
//! │  ┌──────────────────┐      ┌──────────────────────────┐     │
//! │  │  NativeModules   │─────>│  __fbBatchedBridge       │     │
//! │  │  (proxies)       │      │  (MessageQueue)          │     │
//! │  └──────────────────┘      └────────────┬─────────────┘     │
//! │                                         │ flush / sync      │
//! │                                         v                   │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │          JsBridgeExecutor (host entry points)        │   │
//! │  └───────────────────────┬─────────────────────────────┘   │
//! │                          │ envelope text                    │
//! │                          v                                  │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │        parser::parse -> BridgeMessage                │   │
//! │  └───────────────────────┬─────────────────────────────┘   │
//! │                          │                                  │
//! │                          v                                  │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │     ModuleRegistry -> NativeModule::invoke           │   │
//! │  └───────────────────────┬─────────────────────────────┘   │
//! │                          │ (callId, result, isError)        │
//! │                          v                                  │
//! │        invokeCallbackAndReturnFlushedQueue (re-entry)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod bootstrap;
pub mod js;
pub mod parser;
pub mod protocol;

pub use js::{ExecutorState, HostFunctionResult, JsBridgeExecutor};
pub use parser::parse;
pub use protocol::*;
