#![forbid(unsafe_code)]

//! Pipeline error kinds.
//!
//! Three kinds cover the whole engine: broken invariants (bugs; these
//! propagate to the host), task cancellation (routine; callers swallow it
//! after checking [`Error::is_cancelled`]), and use-before-attach.

use longscroll_core::{HeightError, SpanError};
use std::fmt;

/// Errors surfaced by the render pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A structural or geometric invariant was violated. Always a bug in
    /// the engine, the data source, or the host styling contract.
    Invariant(String),
    /// A scheduled task was cancelled by its owner. Normal during block
    /// teardown; never an error condition for the pipeline as a whole.
    TaskCancelled,
    /// An accessor needing host geometry ran before the surface was
    /// attached.
    InitRequired(&'static str),
}

impl Error {
    /// Whether this is routine cancellation rather than a real failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::TaskCancelled)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invariant(msg) => write!(f, "invariant violation: {msg}"),
            Self::TaskCancelled => write!(f, "task cancelled"),
            Self::InitRequired(what) => {
                write!(f, "{what} requires an attached surface")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<SpanError> for Error {
    fn from(err: SpanError) -> Self {
        Self::Invariant(err.to_string())
    }
}

impl From<HeightError> for Error {
    fn from(err: HeightError) -> Self {
        Self::Invariant(err.to_string())
    }
}
