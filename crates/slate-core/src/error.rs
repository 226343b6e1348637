#![forbid(unsafe_code)]

//! System error taxonomy with stable integer codes.
//!
//! Every fallible core operation returns [`SysResult`]. The integer codes
//! are part of the external contract (apps and HAL modules report them
//! across the boundary) and must never be renumbered.

use std::fmt;

/// Stable error taxonomy shared by every subsystem.
///
/// Success is the absence of an error (`Ok(())`); there is no `Ok` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SysError {
    /// Unspecified failure.
    Generic,
    /// Allocation failed or a memory ceiling was hit.
    NoMemory,
    /// Empty name, null callback, out-of-range value.
    InvalidParam,
    /// Unknown app, task, listener, or screen id.
    NotFound,
    /// Operation did not complete in time.
    Timeout,
    /// Resource cap reached and nothing can be evicted.
    Busy,
    /// Feature disabled by configuration or build.
    NotSupported,
    /// HAL self-test or peripheral I/O failure.
    Hardware,
    /// Storage-layer failure.
    Filesystem,
    /// Caller lacks the required permission.
    Permission,
    /// Subsystem degraded; operation unavailable until re-init.
    NotAvailable,
    /// Declared but not implemented on this target.
    NotImplemented,
    /// Operation is illegal in the current lifecycle state.
    InvalidState,
}

impl SysError {
    /// The stable wire code for this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Generic => -1,
            Self::NoMemory => -2,
            Self::InvalidParam => -3,
            Self::NotFound => -4,
            Self::Timeout => -5,
            Self::Busy => -6,
            Self::NotSupported => -7,
            Self::Hardware => -8,
            Self::Filesystem => -9,
            Self::Permission => -10,
            Self::NotAvailable => -11,
            Self::NotImplemented => -12,
            Self::InvalidState => -13,
        }
    }

    /// Reverse lookup from a wire code. `0` and unknown codes return `None`.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::Generic),
            -2 => Some(Self::NoMemory),
            -3 => Some(Self::InvalidParam),
            -4 => Some(Self::NotFound),
            -5 => Some(Self::Timeout),
            -6 => Some(Self::Busy),
            -7 => Some(Self::NotSupported),
            -8 => Some(Self::Hardware),
            -9 => Some(Self::Filesystem),
            -10 => Some(Self::Permission),
            -11 => Some(Self::NotAvailable),
            -12 => Some(Self::NotImplemented),
            -13 => Some(Self::InvalidState),
            _ => None,
        }
    }
}

impl fmt::Display for SysError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Generic => "generic failure",
            Self::NoMemory => "out of memory",
            Self::InvalidParam => "invalid parameter",
            Self::NotFound => "not found",
            Self::Timeout => "timed out",
            Self::Busy => "busy",
            Self::NotSupported => "not supported",
            Self::Hardware => "hardware failure",
            Self::Filesystem => "filesystem failure",
            Self::Permission => "permission denied",
            Self::NotAvailable => "not available",
            Self::NotImplemented => "not implemented",
            Self::InvalidState => "invalid state",
        };
        write!(f, "{msg} ({})", self.code())
    }
}

impl std::error::Error for SysError {}

/// Result alias used throughout the core.
pub type SysResult<T> = Result<T, SysError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(SysError::Generic.code(), -1);
        assert_eq!(SysError::NoMemory.code(), -2);
        assert_eq!(SysError::NotImplemented.code(), -12);
        assert_eq!(SysError::InvalidState.code(), -13);
    }

    #[test]
    fn from_code_round_trips() {
        for code in -13..=-1 {
            let err = SysError::from_code(code).unwrap();
            assert_eq!(err.code(), code);
        }
        assert_eq!(SysError::from_code(0), None);
        assert_eq!(SysError::from_code(-14), None);
        assert_eq!(SysError::from_code(1), None);
    }

    #[test]
    fn display_includes_code() {
        assert_eq!(SysError::Busy.to_string(), "busy (-6)");
    }
}
