//! Errors.

use thiserror::Error;

/// Errors raised by the class runtime and the element lifecycle.
#[derive(Debug, Error)]
pub enum Error {
    /// A class name did not resolve to a registered class.
    #[error("unable to find class: {0}")]
    Lookup(String),

    /// An argument had the wrong shape, e.g. a negative insert position.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Something that must hold did not, e.g. an ancestor search ran out of parents.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An error raised by an event handler or a user method.
    ///
    /// The hub passes these through as they are.
    #[error("{0}")]
    Handler(String),

    /// Neither the instance nor its class chain defines the method.
    #[error("{class} has no method `{method}`")]
    NoSuchMethod { class: String, method: String },

    /// A class name was registered twice under [`DuplicatePolicy::Reject`].
    ///
    /// [`DuplicatePolicy::Reject`]: crate::DuplicatePolicy::Reject
    #[error("class `{0}` is already registered")]
    DuplicateClass(String),

    /// Descriptor text was not valid JSON.
    #[error("invalid descriptor: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a handler error.
    pub fn handler(message: impl Into<String>) -> Error {
        Error::Handler(message.into())
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Error {
        Error::InvalidArgument(message.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
