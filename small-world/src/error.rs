//! Error taxonomy: a single `thiserror`-derived enum so every fallible public operation on
//! [`crate::facade::SmallWorld`] returns an ordinary `Result` instead of panicking or stringly
//! encoding failure.

use thiserror::Error;

/// Errors that can escape a [`crate::facade::SmallWorld`] public method.
#[derive(Debug, Error)]
pub enum Error {
    /// A structural operation was attempted on a graph with no entry point, or `removeItem`
    /// was called with an id that is not currently live.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The serialized stream did not begin with the expected header, or a record failed to
    /// decode.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// A search's bounded retry loop (capped at 1024 attempts) exhausted its budget without
    /// observing a stable graph version. Indicates pathological write contention, not a bug in
    /// the search itself.
    #[error("search retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
    },

    /// Parameter validation failed at `Builder::build` time.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Propagated verbatim from the underlying byte stream during (de)serialization.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Propagated verbatim from `bincode` during (de)serialization.
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Internal-only signal: a reader detected a concurrent structural mutation mid-search.
/// Never escapes a public API; caught by the K-NN-SEARCH retry loop in
/// [`crate::engine::GraphEngine`] and either retried or turned into
/// [`Error::RetriesExhausted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphChanged;
