//! Unified error types for the binding layer.
//!
//! Every failure that can cross the native/host boundary is expressed as a
//! [`BindingError`] variant. Errors raised inside a host callback are caught
//! at the proxy's dispatch boundary, annotated with the owning class and
//! method, and re-raised as [`BindingError::CallbackFailed`].
//!
//! Host-runtime control-flow signals (an early return or loop break
//! propagating through native frames) are *not* errors; they travel as
//! [`CallSignal::Unwind`] and must be re-thrown once native frames are
//! exited instead of being reported as failures.
//!
//! Two conditions are deliberately not part of this taxonomy:
//!
//! - a class-registry lookup miss is a fatal invariant violation (binding
//!   generation is assumed exhaustive) and panics,
//! - a non-empty call heap at call completion is an ownership-accounting
//!   bug and trips a `debug_assert!`.

use thiserror::Error;

use crate::host::Value;

/// Result alias used throughout the crate.
pub type BindingResult<T> = Result<T, BindingError>;

/// Errors raised by the binding core.
///
/// All variants are recoverable by the caller; none are process-fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    /// A native object was accessed after it reported destruction.
    #[error("object of class '{class}' has already been destroyed")]
    ObjectDestroyed { class: String },

    /// `destroy` was requested on a borrowed object that does not permit
    /// explicit destruction.
    #[error("object of class '{class}' cannot be destroyed explicitly")]
    CannotDestroyExplicitly { class: String },

    /// Lazy construction was attempted on a class without a default
    /// constructor.
    #[error("class '{class}' does not permit default construction")]
    CannotDefaultCreate { class: String },

    /// Nil was passed where a non-nullable reference or value is required.
    #[error("nil passed for a reference of type {expected}")]
    NilForReference { expected: String },

    /// An object of an incompatible class was passed, with no
    /// convertibility path to the expected class.
    #[error("unexpected object type: got '{got}', expected '{expected}'")]
    UnexpectedObjectType { got: String, expected: String },

    /// A tuple argument did not match any constructor arity of the target
    /// class.
    #[error("no constructor of class '{class}' accepts {arity} arguments")]
    NoCompatibleConstructor { class: String, arity: usize },

    /// More than one overload matched in the same resolution pass.
    ///
    /// Candidates are listed in declaration order; resolution fails
    /// deterministically rather than guessing.
    #[error("ambiguous call to '{method}': candidates {candidates:?} match equally")]
    AmbiguousOverload {
        method: String,
        candidates: Vec<String>,
    },

    /// Callback dispatch was invoked from a thread that does not own the
    /// host runtime.
    #[error("callback '{method}' dispatched from a foreign thread")]
    WrongThread { method: String },

    /// A host-side exception was raised inside a callback, annotated with
    /// the owning class and method for diagnostics.
    #[error("callback {class}.{method} failed: {message}")]
    CallbackFailed {
        class: String,
        method: String,
        message: String,
    },

    /// No method of the given name is visible on the class.
    #[error("class '{class}' has no method '{method}' matching the given arguments")]
    NoSuchMethod { class: String, method: String },

    /// A host value of the wrong shape reached the serialization channel.
    #[error("type mismatch: {detail}")]
    TypeMismatch { detail: String },

    /// A serialization or compatibility error, annotated with the call
    /// site that attempted the mismatched conversion.
    #[error("in call to {class}.{method}: {source}")]
    CallError {
        class: String,
        method: String,
        #[source]
        source: Box<BindingError>,
    },
}

impl BindingError {
    /// Annotate this error with the class and method whose call raised it.
    ///
    /// Already-annotated errors are returned unchanged so nested dispatch
    /// keeps the innermost call site.
    pub fn in_call(self, class: &str, method: &str) -> Self {
        match self {
            BindingError::CallError { .. } | BindingError::CallbackFailed { .. } => self,
            other => BindingError::CallError {
                class: class.to_string(),
                method: method.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Strip call-site annotation, yielding the root error.
    pub fn root(&self) -> &BindingError {
        match self {
            BindingError::CallError { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Outcome signal of a call that crossed the boundary.
///
/// Host runtimes use exception machinery for non-local control flow
/// (generator early-exit, loop breaks). Those must pass through native
/// frames untouched, so dispatch distinguishes a genuine error from a
/// "continue unwinding" signal carrying the host's payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CallSignal {
    /// A genuine failure, reported to the caller.
    Error(BindingError),
    /// A host-runtime non-local exit; re-throw after native frames unwind.
    Unwind(Value),
}

impl From<BindingError> for CallSignal {
    fn from(err: BindingError) -> Self {
        CallSignal::Error(err)
    }
}

impl CallSignal {
    /// Extract the error, if this signal is one.
    ///
    /// Callers that have already re-thrown unwinds use this to assert only
    /// errors remain.
    pub fn into_error(self) -> Option<BindingError> {
        match self {
            CallSignal::Error(e) => Some(e),
            CallSignal::Unwind(_) => None,
        }
    }
}
