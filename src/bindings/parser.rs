//! Envelope parser for the batched call protocol.
//!
//! A recursive-descent scanner for the bridge's restricted grammar. It is not a
//! JSON parser: params are kept as raw text and handed to modules untouched,
//! only the integer segments are actually decoded. Callers only depend on
//! [`parse`], so the scanner can be swapped for a general decoder plus a
//! schema check without touching them.
//!
//! Structural characters (`[`, `]`, `{`, `}`, `"`, `,`, `\`) are ASCII, so all
//! scanning is done on bytes and every slice boundary falls on a char boundary.

use crate::bindings::protocol::{BridgeMessage, CallId, NO_CALLBACK};
use crate::core::error::{BridgeError, BridgeResult};
use crate::core::utils::truncate_for_log;

const SEGMENT_COUNT: usize = 4;

/// Decode one envelope into a [`BridgeMessage`].
///
/// Fails with [`BridgeError::MalformedEnvelope`] when the outer brackets are
/// missing, the segment count is not four, brackets are unbalanced, a string
/// literal is unterminated, or the decoded sequences differ in length.
pub fn parse(text: &str) -> BridgeResult<BridgeMessage> {
    tracing::trace!(target: "bridge.parser", "Parsing envelope: {}", truncate_for_log(text, 100));

    let trimmed = text.trim();
    let inner = array_interior(trimmed)
        .ok_or_else(|| BridgeError::malformed("envelope is not an array"))?;

    let segments = split_elements(inner)?;
    if segments.len() != SEGMENT_COUNT {
        return Err(BridgeError::malformed(format!(
            "expected {} arrays, got {}",
            SEGMENT_COUNT,
            segments.len()
        )));
    }

    let module_ids = parse_int_array(segments[0])?;
    let method_ids = parse_int_array(segments[1])?;
    let params = parse_param_array(segments[2])?;
    let callback_ids = parse_int_array(segments[3])?;

    let message = BridgeMessage::new(module_ids, method_ids, params, callback_ids)?;
    tracing::trace!(
        target: "bridge.parser",
        "Parsed envelope with {} calls",
        message.call_count()
    );
    Ok(message)
}

/// Given the index of a `[`, return the index of its matching `]`.
///
/// Bracket characters inside double-quoted literals are ignored.
pub fn find_matching_bracket(text: &str, open: usize) -> BridgeResult<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'[') {
        return Err(BridgeError::malformed(format!(
            "expected '[' at position {open}"
        )));
    }

    let mut depth = 0usize;
    let mut pos = open;
    while pos < bytes.len() {
        match bytes[pos] {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(pos);
                }
            }
            b'"' => {
                pos = find_closing_quote(bytes, pos)?;
            }
            _ => {}
        }
        pos += 1;
    }

    Err(BridgeError::malformed(format!(
        "unmatched '[' at position {open}"
    )))
}

/// Given the index of an opening `"`, return the literal's content and the
/// index of its closing quote.
///
/// A backslash consumes the following character verbatim: escapes are kept
/// as written, not decoded.
pub fn parse_string_literal(text: &str, open: usize) -> BridgeResult<(&str, usize)> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'"') {
        return Err(BridgeError::malformed(format!(
            "expected '\"' at position {open}"
        )));
    }
    let close = find_closing_quote(bytes, open)?;
    Ok((&text[open + 1..close], close))
}

/// Whether `token` is an optional `-` followed by one or more ASCII digits.
pub fn is_integer(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn find_closing_quote(bytes: &[u8], open: usize) -> BridgeResult<usize> {
    let mut pos = open + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'"' => return Ok(pos),
            _ => pos += 1,
        }
    }
    Err(BridgeError::malformed(format!(
        "unterminated string literal starting at position {open}"
    )))
}

/// The text between an array's outer brackets, if `text` is exactly one array.
fn array_interior(text: &str) -> Option<&str> {
    if !text.starts_with('[') || !text.ends_with(']') {
        return None;
    }
    match find_matching_bracket(text, 0) {
        Ok(close) if close == text.len() - 1 => Some(&text[1..close]),
        _ => None,
    }
}

/// Split an array interior on its top-level commas.
///
/// Tracks bracket/brace depth and string state so commas inside nested arrays,
/// objects or literals never split. Elements are returned trimmed; an empty
/// interior yields no elements, an empty element is rejected.
fn split_elements(inner: &str) -> BridgeResult<Vec<&str>> {
    let bytes = inner.as_bytes();
    let mut elements = Vec::new();
    if inner.trim().is_empty() {
        return Ok(elements);
    }

    let mut start = 0usize;
    let mut depth = 0i32;
    let mut pos = 0usize;
    while pos < bytes.len() {
        match bytes[pos] {
            b'[' => {
                pos = find_matching_bracket(inner, pos)?;
            }
            b'{' => depth += 1,
            b'}' => depth -= 1,
            b']' => {
                return Err(BridgeError::malformed(format!(
                    "unexpected ']' at position {pos}"
                )))
            }
            b'"' => {
                pos = find_closing_quote(bytes, pos)?;
            }
            b',' if depth == 0 => {
                elements.push(non_empty(&inner[start..pos])?);
                start = pos + 1;
            }
            _ => {}
        }
        pos += 1;
    }
    if depth != 0 {
        return Err(BridgeError::malformed("unbalanced braces"));
    }
    elements.push(non_empty(&inner[start..])?);
    Ok(elements)
}

fn non_empty(element: &str) -> BridgeResult<&str> {
    let element = element.trim();
    if element.is_empty() {
        return Err(BridgeError::malformed("empty array element"));
    }
    Ok(element)
}

fn require_array(segment: &str) -> BridgeResult<&str> {
    array_interior(segment).ok_or_else(|| {
        BridgeError::malformed(format!(
            "expected an array, got '{}'",
            truncate_for_log(segment, 40)
        ))
    })
}

/// Decode an integer segment. `null`/`undefined` map to the sentinel; any other
/// non-integer token is logged and coerced to the sentinel.
fn parse_int_array(segment: &str) -> BridgeResult<Vec<i32>> {
    let inner = require_array(segment)?;
    let tokens = split_elements(inner)?;
    Ok(tokens.into_iter().map(parse_int_token).collect())
}

fn parse_int_token(token: &str) -> CallId {
    if token == "null" || token == "undefined" {
        return NO_CALLBACK;
    }
    if is_integer(token) {
        if let Ok(value) = token.parse::<i32>() {
            return value;
        }
    }
    tracing::warn!(
        target: "bridge.parser",
        "Non-integer element '{}' in int array, treating as {}",
        truncate_for_log(token, 40),
        NO_CALLBACK
    );
    NO_CALLBACK
}

/// Decode the params segment: nested arrays are kept as raw text, string
/// literals are unquoted, any other token is kept as written.
fn parse_param_array(segment: &str) -> BridgeResult<Vec<String>> {
    let inner = require_array(segment)?;
    split_elements(inner)?
        .into_iter()
        .map(|element| {
            if element.starts_with('"') {
                let (content, close) = parse_string_literal(element, 0)?;
                if close != element.len() - 1 {
                    return Err(BridgeError::malformed(format!(
                        "trailing characters after string literal '{}'",
                        truncate_for_log(element, 40)
                    )));
                }
                Ok(content.to_string())
            } else {
                Ok(element.to_string())
            }
        })
        .collect()
}
