use crate::machine::LockState;

/// Failures raised by the lock gate.
///
/// `PatternTooShort`, `PatternMismatch` and `ConfirmMismatch` are recoverable:
/// the machine reports them as [`crate::LockEffect::Rejected`] and the user
/// simply draws again. `HashUnavailable` is fatal to the lock flow and is
/// returned as `Err`. `PersistenceWriteFailure` is logged and swallowed by
/// the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// No strong digest primitive and the insecure fallback is disallowed.
    HashUnavailable,
    /// Fewer than three dots were connected at release.
    PatternTooShort { len: usize },
    /// Unlock attempt did not match the stored record.
    PatternMismatch,
    /// Enrollment confirmation differed from the first draw.
    ConfirmMismatch,
    /// The lock record could not be written.
    PersistenceWriteFailure(String),
    /// A dot index outside 0..=8.
    InvalidDot(u8),
    /// An event arrived that the current state cannot accept.
    IllegalTransition { from: LockState, event: String },
}

impl LockError {
    /// Stable short code surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            LockError::HashUnavailable => "HASH_UNAVAILABLE",
            LockError::PatternTooShort { .. } => "PATTERN_TOO_SHORT",
            LockError::PatternMismatch => "PATTERN_MISMATCH",
            LockError::ConfirmMismatch => "CONFIRM_MISMATCH",
            LockError::PersistenceWriteFailure(_) => "PERSISTENCE_WRITE_FAILURE",
            LockError::InvalidDot(_) => "INVALID_DOT",
            LockError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
        }
    }
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockError::HashUnavailable => write!(
                f,
                "no pattern digest available: SHA-256 missing and insecure fallback disallowed"
            ),
            LockError::PatternTooShort { len } => {
                write!(f, "pattern too short: {len} dot(s), at least 3 required")
            }
            LockError::PatternMismatch => write!(f, "pattern does not match the stored lock"),
            LockError::ConfirmMismatch => {
                write!(f, "confirmation pattern differs from the first draw")
            }
            LockError::PersistenceWriteFailure(reason) => {
                write!(f, "failed to persist lock record: {reason}")
            }
            LockError::InvalidDot(ix) => write!(f, "dot index {ix} outside 0..=8"),
            LockError::IllegalTransition { from, event } => {
                write!(f, "illegal lock transition: {from:?} + {event}")
            }
        }
    }
}

impl std::error::Error for LockError {}
