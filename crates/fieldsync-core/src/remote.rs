//! Remote failure taxonomy.
//!
//! Every remote call resolves to a value or a [`RemoteError`], and every
//! error is classified retriable or terminal. The classification is what
//! drives the queue's state machine: retriable failures keep the mutation
//! queued with an incremented retry count, terminal failures dead-letter
//! it immediately because retrying cannot succeed.

use thiserror::Error;

/// How a remote failure should be treated by the queue drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient: connectivity loss, timeout, 5xx-class. Stay queued, retry.
    Retriable,
    /// Permanent: validation/4xx-class. Retrying cannot succeed.
    Terminal,
}

/// An error returned by the remote data store collaborator.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The remote endpoint could not be reached.
    #[error("remote unreachable: {0}")]
    Unreachable(String),

    /// The collaborator's own request timeout fired.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Server-side failure (5xx-class).
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The remote store rejected the request (validation/4xx-class).
    #[error("rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl RemoteError {
    /// Classify this failure for the queue state machine.
    ///
    /// Timeouts are always retriable: an unknown-outcome write must be
    /// allowed another delivery rather than dropped.
    pub fn class(&self) -> FailureClass {
        match self {
            RemoteError::Unreachable(_) | RemoteError::Timeout(_) => FailureClass::Retriable,
            RemoteError::Server { .. } => FailureClass::Retriable,
            RemoteError::Rejected { .. } => FailureClass::Terminal,
        }
    }

    /// Shorthand for `class() == FailureClass::Retriable`.
    pub fn is_retriable(&self) -> bool {
        self.class() == FailureClass::Retriable
    }
}
