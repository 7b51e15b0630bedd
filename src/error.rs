//! Error types for Aural

use crate::backend::{AudioBackend, ErrorScope, code};
use thiserror::Error;
use uuid::Uuid;

/// Classified backend failure, derived from the raw error code and the scope
/// it was reported on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    InvalidName,
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    OutOfMemory,
    InvalidDevice,
    InvalidContext,
    Unknown,
}

#[derive(Error, Debug)]
pub enum AuralError {
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("backend resources exhausted: {0}")]
    ResourceExhausted(String),

    #[error("backend error {code:#06x} ({kind:?}, {scope:?} scope): {message}")]
    Backend {
        scope: ErrorScope,
        kind: BackendErrorKind,
        code: i32,
        message: String,
    },

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("no such source: {0}")]
    NoSuchSource(Uuid),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, AuralError>;

/// Translates a raw backend error code into a typed error. Device-scoped codes
/// overlap numerically with context-scoped ones; the scope disambiguates.
pub fn backend_error(scope: ErrorScope, error_code: i32) -> AuralError {
    let (kind, message) = match (scope, error_code) {
        (ErrorScope::Context, code::ERR_INVALID_NAME) => {
            (BackendErrorKind::InvalidName, "invalid name")
        }
        (ErrorScope::Context, code::ERR_INVALID_ENUM) => {
            (BackendErrorKind::InvalidEnum, "invalid enum")
        }
        (ErrorScope::Context, code::ERR_INVALID_VALUE) => {
            (BackendErrorKind::InvalidValue, "invalid value")
        }
        (ErrorScope::Context, code::ERR_INVALID_OPERATION) => {
            (BackendErrorKind::InvalidOperation, "invalid operation")
        }
        (ErrorScope::Context, code::ERR_OUT_OF_MEMORY) => {
            (BackendErrorKind::OutOfMemory, "out of memory")
        }
        (ErrorScope::Device, code::ERR_INVALID_DEVICE) => {
            (BackendErrorKind::InvalidDevice, "invalid device")
        }
        (ErrorScope::Device, code::ERR_INVALID_CONTEXT) => {
            (BackendErrorKind::InvalidContext, "invalid context")
        }
        (ErrorScope::Device, code::ERR_DEVICE_INVALID_ENUM) => {
            (BackendErrorKind::InvalidEnum, "invalid device enum")
        }
        (ErrorScope::Device, code::ERR_DEVICE_INVALID_VALUE) => {
            (BackendErrorKind::InvalidValue, "invalid device value")
        }
        (ErrorScope::Device, code::ERR_DEVICE_OUT_OF_MEMORY) => {
            (BackendErrorKind::OutOfMemory, "out of memory")
        }
        _ => (BackendErrorKind::Unknown, "unrecognized backend error code"),
    };
    AuralError::Backend {
        scope,
        kind,
        code: error_code,
        message: message.to_string(),
    }
}

/// Polls the backend's error flag for `scope` and maps a pending failure.
/// Every backend call in the engine is followed by one of these checks.
pub(crate) fn check(backend: &mut dyn AudioBackend, scope: ErrorScope) -> Result<()> {
    let error_code = backend.last_error(scope);
    if error_code == code::NO_ERROR {
        Ok(())
    } else {
        Err(backend_error(scope, error_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_codes_map_to_kinds() {
        let err = backend_error(ErrorScope::Context, code::ERR_INVALID_VALUE);
        match err {
            AuralError::Backend { kind, code: c, .. } => {
                assert_eq!(kind, BackendErrorKind::InvalidValue);
                assert_eq!(c, code::ERR_INVALID_VALUE);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_device_scope_disambiguates_overlapping_codes() {
        // 0xA001 means "invalid name" on the context but "invalid device" on the device
        let err = backend_error(ErrorScope::Device, code::ERR_INVALID_DEVICE);
        assert!(matches!(
            err,
            AuralError::Backend {
                kind: BackendErrorKind::InvalidDevice,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_code_keeps_numeric_value() {
        let err = backend_error(ErrorScope::Context, 0x7777);
        match err {
            AuralError::Backend { kind, code: c, .. } => {
                assert_eq!(kind, BackendErrorKind::Unknown);
                assert_eq!(c, 0x7777);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
