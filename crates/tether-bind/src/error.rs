use thiserror::Error;

use tether_jit::JitError;

/// Errors from the binding entry point. All of them abort the whole
/// bind; none are retried. A failure after the publish step leaves the
/// published symbol in the process-wide table (logged, not rolled back).
#[derive(Error, Debug)]
pub enum BindError {
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("unsupported callable kind: {0}")]
    UnsupportedCallableKind(String),

    #[error("signature mismatch: requested {requested}, available {available}")]
    SignatureMismatch { requested: String, available: String },

    #[error("unknown type `{0}` in signature")]
    UnknownType(String),

    /// Propagated unchanged from the compiler collaborator.
    #[error("compilation failed: {0}")]
    Compilation(#[from] JitError),
}
