//! Engine error codes and the last-error side channel.
//!
//! Engine calls report only success or failure. The structured cause of a
//! failure is parked in a thread-local slot that the caller reads (and
//! clears) right after the failing call returns.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use thiserror::Error;

/// Result type for engine-level operations.
pub type EngineResult<T> = Result<T, EngineError>;

macro_rules! error_codes {
    ($($variant:ident = $code:literal => $name:literal,)*) => {
        /// Numeric error codes reported by the storage engine.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(i32)]
        #[allow(missing_docs)]
        pub enum ErrorCode {
            $($variant = $code,)*
        }

        impl ErrorCode {
            /// Every code, in ascending numeric order.
            pub const ALL: &'static [ErrorCode] = &[$(ErrorCode::$variant,)*];

            /// Maps a raw code to an `ErrorCode`.
            ///
            /// Numbers the engine does not define map to [`ErrorCode::Unknown`].
            #[must_use]
            pub fn from_code(code: i32) -> Self {
                match code {
                    $($code => ErrorCode::$variant,)*
                    _ => ErrorCode::Unknown,
                }
            }

            /// Returns the engine's symbolic name for this code.
            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $(ErrorCode::$variant => $name,)*
                }
            }
        }
    };
}

error_codes! {
    None = 0 => "NONE",
    Unknown = 1 => "UNKNOWN",
    OtherException = 2 => "OTHER_EXCEPTION",
    OutOfMemory = 3 => "OUT_OF_MEMORY",
    NotClonable = 4 => "NOT_CLONABLE",
    NotInATransaction = 5 => "NOT_IN_A_TRANSACTION",
    WrongThread = 6 => "WRONG_THREAD",
    InvalidatedObject = 7 => "INVALIDATED_OBJECT",
    InvalidProperty = 8 => "INVALID_PROPERTY",
    MissingPropertyValue = 9 => "MISSING_PROPERTY_VALUE",
    PropertyTypeMismatch = 10 => "PROPERTY_TYPE_MISMATCH",
    MissingPrimaryKey = 11 => "MISSING_PRIMARY_KEY",
    UnexpectedPrimaryKey = 12 => "UNEXPECTED_PRIMARY_KEY",
    WrongPrimaryKeyType = 13 => "WRONG_PRIMARY_KEY_TYPE",
    ModifyPrimaryKey = 14 => "MODIFY_PRIMARY_KEY",
    ReadOnlyProperty = 15 => "READ_ONLY_PROPERTY",
    PropertyNotNullable = 16 => "PROPERTY_NOT_NULLABLE",
    InvalidArgument = 17 => "INVALID_ARGUMENT",
    Logic = 18 => "LOGIC",
    NoSuchTable = 19 => "NO_SUCH_TABLE",
    NoSuchObject = 20 => "NO_SUCH_OBJECT",
    CrossTableLinkTarget = 21 => "CROSS_TABLE_LINK_TARGET",
    UnsupportedFileFormatVersion = 22 => "UNSUPPORTED_FILE_FORMAT_VERSION",
    MultipleSyncAgents = 23 => "MULTIPLE_SYNC_AGENTS",
    AddressSpaceExhausted = 24 => "ADDRESS_SPACE_EXHAUSTED",
    MaximumFileSizeExceeded = 25 => "MAXIMUM_FILE_SIZE_EXCEEDED",
    OutOfDiskSpace = 26 => "OUT_OF_DISK_SPACE",
    KeyNotFound = 27 => "KEY_NOT_FOUND",
    ColumnNotFound = 28 => "COLUMN_NOT_FOUND",
    ColumnAlreadyExists = 29 => "COLUMN_ALREADY_EXISTS",
    KeyAlreadyUsed = 30 => "KEY_ALREADY_USED",
    SerializationError = 31 => "SERIALIZATION_ERROR",
    InvalidPath = 32 => "INVALID_PATH_ERROR",
    DuplicatePrimaryKeyValue = 33 => "DUPLICATE_PRIMARY_KEY_VALUE",
    IndexOutOfBounds = 34 => "INDEX_OUT_OF_BOUNDS",
    InvalidQueryString = 35 => "INVALID_QUERY_STRING",
    InvalidQuery = 36 => "INVALID_QUERY",
    FileAccess = 37 => "FILE_ACCESS_ERROR",
    FilePermissionDenied = 38 => "FILE_PERMISSION_DENIED",
    DeleteOpenedRealm = 39 => "DELETE_OPENED_REALM",
    IllegalOperation = 40 => "ILLEGAL_OPERATION",
    Callback = 1_000_000 => "CALLBACK",
}

impl ErrorCode {
    /// Returns the numeric code.
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Refinement of [`ErrorCode::Logic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum LogicErrorKind {
    /// No further detail.
    #[default]
    None = 0,
    /// A string exceeded the engine's maximum length.
    StringTooBig = 1,
}

impl LogicErrorKind {
    /// Maps a raw sub-kind; unknown values collapse to `None`.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => LogicErrorKind::StringTooBig,
            _ => LogicErrorKind::None,
        }
    }
}

/// Extra detail attached to an engine error.
///
/// The engine reports one integer alongside the code. For logic errors it
/// names a [`LogicErrorKind`]; for every other code it is an opaque sub-code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorDetail {
    /// Refined kind of a logic error.
    Logic(LogicErrorKind),
    /// Raw engine sub-code.
    Code(i32),
}

/// A structured error read from the engine's last-error channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct EngineError {
    code: ErrorCode,
    message: String,
    detail: ErrorDetail,
}

impl EngineError {
    /// Creates an error with no sub-code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let detail = if code == ErrorCode::Logic {
            ErrorDetail::Logic(LogicErrorKind::None)
        } else {
            ErrorDetail::Code(0)
        };
        Self {
            code,
            message: message.into(),
            detail,
        }
    }

    /// Creates a logic error with a refined kind.
    pub fn logic(kind: LogicErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Logic,
            message: message.into(),
            detail: ErrorDetail::Logic(kind),
        }
    }

    /// Builds an error from the raw triple the engine reports.
    ///
    /// `detail` is read as a logic sub-kind when `code` is the logic code and
    /// as a plain sub-code otherwise.
    pub fn from_raw(code: i32, message: impl Into<String>, detail: i32) -> Self {
        let code = ErrorCode::from_code(code);
        let detail = if code == ErrorCode::Logic {
            ErrorDetail::Logic(LogicErrorKind::from_code(detail))
        } else {
            ErrorDetail::Code(detail)
        };
        Self {
            code,
            message: message.into(),
            detail,
        }
    }

    /// Creates the error reported when a call failed but left no record.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown, message)
    }

    /// Replaces the raw sub-code. Ignored for logic errors.
    #[must_use]
    pub fn with_sub_code(mut self, sub_code: i32) -> Self {
        if self.code != ErrorCode::Logic {
            self.detail = ErrorDetail::Code(sub_code);
        }
        self
    }

    /// Returns the error code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the attached detail.
    #[must_use]
    pub fn detail(&self) -> ErrorDetail {
        self.detail
    }

    /// Returns the refined kind for logic errors.
    #[must_use]
    pub fn logic_kind(&self) -> Option<LogicErrorKind> {
        match self.detail {
            ErrorDetail::Logic(kind) => Some(kind),
            ErrorDetail::Code(_) => None,
        }
    }

    /// Returns the raw sub-code for non-logic errors.
    #[must_use]
    pub fn sub_code(&self) -> Option<i32> {
        match self.detail {
            ErrorDetail::Code(code) => Some(code),
            ErrorDetail::Logic(_) => None,
        }
    }
}

/// An encryption key of the wrong length was supplied.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("encryption key must be {expected} bytes, got {actual}")]
pub struct InvalidKeyLength {
    /// Required key length.
    pub expected: usize,
    /// Length that was supplied.
    pub actual: usize,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<EngineError>> = const { RefCell::new(None) };
}

/// Records the error for the current thread, replacing any earlier one.
pub fn set_last_error(error: EngineError) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some(error);
    });
}

/// Takes the current thread's last error, leaving the slot empty.
pub fn take_last_error() -> Option<EngineError> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Returns a copy of the current thread's last error without clearing it.
pub fn peek_last_error() -> Option<EngineError> {
    LAST_ERROR.with(|e| e.borrow().clone())
}

/// Clears the current thread's last error.
pub fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn codes_match_engine_numbers() {
        assert_eq!(ErrorCode::None.code(), 0);
        assert_eq!(ErrorCode::Logic.code(), 18);
        assert_eq!(ErrorCode::IllegalOperation.code(), 40);
        assert_eq!(ErrorCode::Callback.code(), 1_000_000);
        assert_eq!(ErrorCode::ALL.len(), 42);
    }

    #[test]
    fn from_code_round_trips_known_codes() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_code(code.code()), *code);
        }
    }

    #[test]
    fn unknown_numbers_map_to_unknown() {
        assert_eq!(ErrorCode::from_code(41), ErrorCode::Unknown);
        assert_eq!(ErrorCode::from_code(-3), ErrorCode::Unknown);
    }

    #[test]
    fn logic_errors_carry_refined_kind() {
        let err = EngineError::from_raw(18, "string too long", 1);
        assert_eq!(err.code(), ErrorCode::Logic);
        assert_eq!(err.logic_kind(), Some(LogicErrorKind::StringTooBig));
        assert_eq!(err.sub_code(), None);
    }

    #[test]
    fn other_errors_carry_sub_code() {
        let err = EngineError::from_raw(37, "permission", 13);
        assert_eq!(err.code(), ErrorCode::FileAccess);
        assert_eq!(err.sub_code(), Some(13));
        assert_eq!(err.logic_kind(), None);
    }

    #[test]
    fn with_sub_code_leaves_logic_detail_alone() {
        let err = EngineError::logic(LogicErrorKind::StringTooBig, "x").with_sub_code(9);
        assert_eq!(err.detail(), ErrorDetail::Logic(LogicErrorKind::StringTooBig));
    }

    #[test]
    fn display_prefixes_code_name() {
        let err = EngineError::new(ErrorCode::NotInATransaction, "no write transaction");
        assert_eq!(err.to_string(), "NOT_IN_A_TRANSACTION: no write transaction");
    }

    #[test]
    fn last_error_is_cleared_on_take() {
        clear_last_error();
        assert!(take_last_error().is_none());

        set_last_error(EngineError::unknown("boom"));
        assert_eq!(peek_last_error().map(|e| e.code()), Some(ErrorCode::Unknown));
        assert_eq!(take_last_error().map(|e| e.code()), Some(ErrorCode::Unknown));
        assert!(take_last_error().is_none());
    }

    #[test]
    fn last_error_is_per_thread() {
        set_last_error(EngineError::unknown("main"));
        let other = std::thread::spawn(take_last_error).join().unwrap_or_default();
        assert!(other.is_none());
        assert!(take_last_error().is_some());
    }

    proptest! {
        #[test]
        fn from_code_is_total(code in any::<i32>()) {
            let mapped = ErrorCode::from_code(code);
            prop_assert!(mapped.code() == code || mapped == ErrorCode::Unknown);
        }
    }
}
