//! Error types for privacy accounting operations.

/// Errors that can occur while constructing or manipulating privacy loss
/// distributions.
#[derive(Debug, thiserror::Error)]
pub enum DpError {
    /// A parameter is outside its domain (non-positive noise scale,
    /// malformed probability value, out-of-range mechanism parameter).
    #[error("invalid argument: {msg}")]
    InvalidArgument {
        /// Human-readable error description.
        msg: String,
    },

    /// A precondition on the operands was violated (e.g. composing
    /// distributions with mismatched discretization intervals).
    #[error("precondition violated: {msg}")]
    PreconditionViolation {
        /// Human-readable error description.
        msg: String,
    },

    /// The requested operation is not supported for these operands.
    #[error("unimplemented: {msg}")]
    Unimplemented {
        /// Human-readable error description.
        msg: String,
    },

    /// External data failed validation during deserialization.
    #[error("malformed input: {msg}")]
    MalformedInput {
        /// Human-readable error description.
        msg: String,
    },
}

/// Result type for privacy accounting operations.
pub type Result<T> = std::result::Result<T, DpError>;

impl DpError {
    /// Create an invalid argument error.
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument { msg: msg.into() }
    }

    /// Create a precondition violation error.
    pub fn precondition<S: Into<String>>(msg: S) -> Self {
        Self::PreconditionViolation { msg: msg.into() }
    }

    /// Create an unimplemented error.
    pub fn unimplemented<S: Into<String>>(msg: S) -> Self {
        Self::Unimplemented { msg: msg.into() }
    }

    /// Create a malformed input error.
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedInput { msg: msg.into() }
    }
}
