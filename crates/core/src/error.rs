//! The `error` value payload and its closed code set.
//!
//! Loosely grounded on `crates/runtime/src/serialize.rs`'s `SerializeError`:
//! a plain enum with a hand-written `Display`/`std::error::Error` impl, no
//! `thiserror`. `CelError` is both the runtime `error` value's payload *and*
//! the `Err` side of ordinary fallible operations inside this crate — a
//! builder rejecting a field or a checked string constructor rejecting bad
//! UTF-8 returns the same type the evaluator would wrap into an `error`
//! value, so the two are freely convertible.

use std::fmt;

/// The closed error code set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Type mismatch in a builder/conversion; malformed UTF-8 in a checked
    /// string constructor; duplicate map key.
    InvalidArgument,
    /// Missing map key on `get`; missing field; unknown enum name.
    NotFound,
    /// Duration/timestamp outside bounds; narrowing numeric overflow; list
    /// index out of bounds.
    OutOfRange,
    /// Operation unsupported by a value (e.g. `serialize` of an opaque).
    Unimplemented,
    /// Invariant violation; should not occur in a correctly built pipeline.
    Internal,
    /// Attribute resolution deferred — carried inside `unknown`, not
    /// normally surfaced as a bare `error`, but available for hosts that
    /// choose to report a stalled resolution as an error instead.
    Unavailable,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidArgument => "invalid argument",
            ErrorCode::NotFound => "not found",
            ErrorCode::OutOfRange => "out of range",
            ErrorCode::Unimplemented => "unimplemented",
            ErrorCode::Internal => "internal",
            ErrorCode::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// An optional structured payload, keyed by a URL, carried alongside an
/// error's code and message — used for markers such as "missing attribute"
/// or "unknown function result" when a host chooses to surface a deferred
/// resolution through the `error` channel rather than `unknown`.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorPayload {
    pub type_url: String,
    pub data: Vec<u8>,
}

/// The `error` value's payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CelError {
    pub code: ErrorCode,
    pub message: String,
    pub payload: Option<ErrorPayload>,
}

impl CelError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> CelError {
        CelError {
            code,
            message: message.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, type_url: impl Into<String>, data: Vec<u8>) -> CelError {
        self.payload = Some(ErrorPayload {
            type_url: type_url.into(),
            data,
        });
        self
    }

    pub fn invalid_argument(message: impl Into<String>) -> CelError {
        CelError::new(ErrorCode::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> CelError {
        CelError::new(ErrorCode::NotFound, message)
    }

    pub fn out_of_range(message: impl Into<String>) -> CelError {
        CelError::new(ErrorCode::OutOfRange, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> CelError {
        CelError::new(ErrorCode::Unimplemented, message)
    }

    pub fn internal(message: impl Into<String>) -> CelError {
        CelError::new(ErrorCode::Internal, message)
    }

    pub fn unavailable(message: impl Into<String>) -> CelError {
        CelError::new(ErrorCode::Unavailable, message)
    }
}

impl fmt::Display for CelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CelError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_code_and_message() {
        let e = CelError::not_found("no such key: b");
        assert_eq!(e.to_string(), "not found: no such key: b");
    }

    #[test]
    fn payload_is_optional() {
        let e = CelError::invalid_argument("bad utf8");
        assert!(e.payload.is_none());
        let e = e.with_payload("type.googleapis.com/x", vec![1, 2, 3]);
        assert!(e.payload.is_some());
    }
}
