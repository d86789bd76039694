//! Error types and source span tracking for diagnostics.

use alloc::string::String;
use core::fmt;

use crate::operand::Role;
use crate::profile::TargetId;

/// Source location for diagnostics produced by the text front end.
///
/// Tracks the line, column, byte offset, and length of a token in the
/// original source text. Encodings built through the typed API carry
/// [`Span::dummy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (byte offset within line).
    pub col: u32,
    /// 0-based byte offset from start of source.
    pub offset: usize,
    /// Byte length of the spanned region.
    pub len: usize,
}

impl Span {
    /// Create a new span.
    #[must_use]
    pub fn new(line: u32, col: u32, offset: usize, len: usize) -> Self {
        Self {
            line,
            col,
            offset,
            len,
        }
    }

    /// A dummy span for constructs that did not come from source text.
    #[must_use]
    pub fn dummy() -> Self {
        Self::default()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Encoding error.
///
/// `UnsupportedRegister`, `FieldOverflow`, `RoleMismatch` and
/// `InvalidOperands` are call-site programmer errors and are raised
/// immediately; nothing is ever truncated or wrapped to make it fit.
/// `UnsupportedOperation` names the mnemonic and target so the caller can
/// special-case the gap. `CapabilityMismatch` is produced only by the
/// runtime probe.
///
/// An out-of-range memory displacement is *not* an error: it is recovered
/// by synthesizing the address in a scratch register.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EncodeError {
    /// A logical register index exceeds what the profile can address at the
    /// requested width.
    #[error("register {kind}{index} ({role}) exceeds capacity {capacity} on {target}")]
    UnsupportedRegister {
        /// `'v'` for vector tokens, `'r'` for general-register tokens.
        kind: char,
        /// Role of the offending token (general registers are always read).
        role: Role,
        /// Logical index that was requested.
        index: u8,
        /// Number of addressable registers at this width.
        capacity: u8,
        /// Active target profile.
        target: TargetId,
    },

    /// A resolved value does not fit its declared bit-field.
    #[error("value {value} does not fit field '{field}' [{min}..{max}]")]
    FieldOverflow {
        /// Name of the template field.
        field: &'static str,
        /// The value that overflowed.
        value: i64,
        /// Minimum representable value.
        min: i64,
        /// Maximum representable value.
        max: i64,
    },

    /// No native form and no documented fallback exists on this target.
    #[error("'{mnemonic}' is not supported on {target}")]
    UnsupportedOperation {
        /// Portable mnemonic text, e.g. `min.i64`.
        mnemonic: String,
        /// Active target profile.
        target: TargetId,
    },

    /// The running CPU cannot execute code for the build-selected profile.
    #[error("CPU does not support {target}: missing {missing}")]
    CapabilityMismatch {
        /// Build-selected profile.
        target: TargetId,
        /// First missing capability.
        missing: &'static str,
    },

    /// A register token was bound to an arity position its role forbids.
    #[error("{mnemonic}: operand {position} expects a {expected} token, found {found}")]
    RoleMismatch {
        /// Portable mnemonic text.
        mnemonic: String,
        /// Zero-based operand position.
        position: usize,
        /// What the position accepts.
        expected: &'static str,
        /// Role of the supplied token.
        found: Role,
    },

    /// Operand count or kinds do not match the mnemonic's form.
    #[error("{mnemonic}: invalid operands: {detail}")]
    InvalidOperands {
        /// Portable mnemonic text.
        mnemonic: String,
        /// Why the operands were rejected.
        detail: String,
    },

    /// The logical width is not a whole multiple of an encodable length.
    #[error("logical width {logical} cannot be composed from native width {native} on {target}")]
    WidthMismatch {
        /// Requested logical width in bits.
        logical: u32,
        /// Native width in bits.
        native: u32,
        /// Active target profile.
        target: TargetId,
    },

    /// A branch referenced a label that was never bound.
    #[error("undefined label {label}")]
    UndefinedLabel {
        /// Label id.
        label: u32,
    },

    /// A label was bound twice.
    #[error("label {label} bound more than once")]
    DuplicateLabel {
        /// Label id.
        label: u32,
    },

    /// A configured resource limit was exceeded.
    #[error("resource limit exceeded: {resource} (limit: {limit})")]
    ResourceLimitExceeded {
        /// Name of the resource.
        resource: &'static str,
        /// The configured limit.
        limit: usize,
    },

    /// Syntax error in the text front end.
    #[error("{span}: {msg}")]
    Syntax {
        /// The syntax error message.
        msg: String,
        /// Source location.
        span: Span,
    },

    /// Unknown mnemonic or element suffix in the text front end.
    #[error("{span}: unknown mnemonic '{mnemonic}'")]
    UnknownMnemonic {
        /// The mnemonic that was not recognized.
        mnemonic: String,
        /// Source location.
        span: Span,
    },
}

impl EncodeError {
    /// Shorthand for [`EncodeError::InvalidOperands`].
    pub(crate) fn invalid(mnemonic: impl fmt::Display, detail: &str) -> Self {
        EncodeError::InvalidOperands {
            mnemonic: alloc::format!("{}", mnemonic),
            detail: String::from(detail),
        }
    }

    /// Shorthand for [`EncodeError::UnsupportedOperation`].
    pub(crate) fn unsupported(mnemonic: impl fmt::Display, target: TargetId) -> Self {
        EncodeError::UnsupportedOperation {
            mnemonic: alloc::format!("{}", mnemonic),
            target,
        }
    }
}
