//! Batched Call Protocol
//!
//! This protocol defines the language-agnostic envelope exchanged between
//! script code and the host: one flushed batch of calls, encoded as four
//! positionally aligned arrays.
//!
//! ```text
//! [ [moduleId, ...], [methodId, ...], [ [param, ...], ... ], [callbackId|null, ...] ]
//! ```

use std::fmt::Write as _;

use crate::core::error::{BridgeError, BridgeResult};

/// Correlation token chosen by script code for an asynchronous call.
pub type CallId = i32;

/// Callback id marking a call that expects no result.
pub const NO_CALLBACK: CallId = -1;

/// A decoded batch of calls.
///
/// Constructed fresh per parse, immutable afterwards. The four sequences are
/// guaranteed to have equal length; [`BridgeMessage::new`] rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BridgeMessage {
    module_ids: Vec<i32>,
    method_ids: Vec<i32>,
    params: Vec<String>,
    callback_ids: Vec<CallId>,
}

/// One call of a batch, borrowed from its [`BridgeMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeCall<'a> {
    pub module_id: i32,
    pub method_id: i32,
    /// Serialized parameter payload, forwarded to the module unchanged.
    pub params: &'a str,
    pub callback_id: CallId,
}

impl BridgeCall<'_> {
    /// Whether the script asked for a result.
    pub fn wants_callback(&self) -> bool {
        self.callback_id != NO_CALLBACK
    }
}

impl BridgeMessage {
    /// Build a message, validating the equal-length invariant.
    pub fn new(
        module_ids: Vec<i32>,
        method_ids: Vec<i32>,
        params: Vec<String>,
        callback_ids: Vec<CallId>,
    ) -> BridgeResult<Self> {
        let len = module_ids.len();
        if method_ids.len() != len || params.len() != len || callback_ids.len() != len {
            return Err(BridgeError::malformed(format!(
                "array lengths don't match: moduleIds={}, methodIds={}, params={}, callbackIds={}",
                len,
                method_ids.len(),
                params.len(),
                callback_ids.len()
            )));
        }
        Ok(Self {
            module_ids,
            method_ids,
            params,
            callback_ids,
        })
    }

    /// An empty batch (`[[],[],[],[]]`).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn module_ids(&self) -> &[i32] {
        &self.module_ids
    }

    pub fn method_ids(&self) -> &[i32] {
        &self.method_ids
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn callback_ids(&self) -> &[CallId] {
        &self.callback_ids
    }

    /// Number of calls in the batch.
    pub fn call_count(&self) -> usize {
        self.module_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.module_ids.is_empty()
    }

    /// Calls in array order.
    pub fn calls(&self) -> impl Iterator<Item = BridgeCall<'_>> + '_ {
        (0..self.call_count()).map(move |i| BridgeCall {
            module_id: self.module_ids[i],
            method_id: self.method_ids[i],
            params: &self.params[i],
            callback_id: self.callback_ids[i],
        })
    }

    /// Encode the batch back to envelope text.
    ///
    /// Params are emitted verbatim, so a param that is already array text
    /// (the normal case) round-trips through [`crate::bindings::parse`].
    /// A bare string-literal param does not: the parser stores it unquoted
    /// (`"hello"` becomes `hello`) and it is written back as `hello`.
    /// Sentinel callback ids are written as `null`.
    pub fn to_wire(&self) -> String {
        let mut out = String::with_capacity(16 + self.params.iter().map(String::len).sum::<usize>());
        out.push('[');
        write_int_array(&mut out, &self.module_ids, false);
        out.push(',');
        write_int_array(&mut out, &self.method_ids, false);
        out.push_str(",[");
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(param);
        }
        out.push_str("],");
        write_int_array(&mut out, &self.callback_ids, true);
        out.push(']');
        out
    }

    /// Generate a synthetic batch for load testing the parser.
    ///
    /// Module ids cycle through 1..=10, method ids through 1..=5, every call gets
    /// `params_per_call` string params, and the first half of the calls request a
    /// callback (ids starting at 100).
    pub fn synthetic(call_count: usize, params_per_call: usize) -> Self {
        let mut module_ids = Vec::with_capacity(call_count);
        let mut method_ids = Vec::with_capacity(call_count);
        let mut params = Vec::with_capacity(call_count);
        let mut callback_ids = Vec::with_capacity(call_count);

        for i in 0..call_count {
            module_ids.push((i % 10 + 1) as i32);
            method_ids.push((i % 5 + 1) as i32);

            let mut param = String::from("[");
            for j in 0..params_per_call {
                if j > 0 {
                    param.push(',');
                }
                let _ = write!(param, "\"param{i}_{j}\"");
            }
            param.push(']');
            params.push(param);

            callback_ids.push(if i < call_count / 2 {
                (i + 100) as CallId
            } else {
                NO_CALLBACK
            });
        }

        Self {
            module_ids,
            method_ids,
            params,
            callback_ids,
        }
    }
}

fn write_int_array(out: &mut String, values: &[i32], sentinel_as_null: bool) {
    out.push('[');
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if sentinel_as_null && *value == NO_CALLBACK {
            out.push_str("null");
        } else {
            let _ = write!(out, "{value}");
        }
    }
    out.push(']');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_mismatched_lengths() {
        let err = BridgeMessage::new(
            vec![0, 1],
            vec![0, 1],
            vec!["[]".into(), "[]".into()],
            vec![1],
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::MalformedEnvelope(_)));
    }

    #[test]
    fn test_calls_iterate_in_order() {
        let msg = BridgeMessage::new(
            vec![2, 0],
            vec![1, 3],
            vec!["[\"a\"]".into(), "[]".into()],
            vec![7, NO_CALLBACK],
        )
        .unwrap();
        let calls: Vec<_> = msg.calls().collect();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].module_id, 2);
        assert_eq!(calls[0].params, "[\"a\"]");
        assert!(calls[0].wants_callback());
        assert!(!calls[1].wants_callback());
    }

    #[test]
    fn test_empty_to_wire() {
        assert_eq!(BridgeMessage::empty().to_wire(), "[[],[],[],[]]");
    }

    #[test]
    fn test_to_wire_writes_null_sentinel() {
        let msg = BridgeMessage::new(
            vec![0],
            vec![1],
            vec!["[\"hello\"]".into()],
            vec![NO_CALLBACK],
        )
        .unwrap();
        assert_eq!(msg.to_wire(), "[[0],[1],[[\"hello\"]],[null]]");
    }

    #[test]
    fn test_synthetic_shape() {
        let msg = BridgeMessage::synthetic(4, 2);
        assert_eq!(msg.call_count(), 4);
        assert_eq!(msg.module_ids(), &[1, 2, 3, 4]);
        assert_eq!(msg.method_ids(), &[1, 2, 3, 4]);
        assert_eq!(msg.params()[1], "[\"param1_0\",\"param1_1\"]");
        assert_eq!(msg.callback_ids(), &[100, 101, -1, -1]);
    }
}
