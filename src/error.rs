//! # Error taxonomy
//!
//! Three classes matter operationally:
//!
//! - [`MistError::Provider`] / [`MistError::Generator`]: transport or auth
//!   failures talking to the embedding or chat backends. These surface to
//!   the caller, which renders them as a "technical difficulties" style
//!   message rather than retrying forever.
//! - [`MistError::Data`]: a stored embedding that cannot be used. Recovered
//!   locally by skipping the row during index construction, never fatal.
//! - [`MistError::Store`] / [`MistError::StoreConnection`]: the answer
//!   database failed a query or could not be opened. Surfaced to the caller
//!   so the request fails cleanly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MistError {
    /// The embedding backend could not be reached or rejected the request.
    #[error("embedding provider error: {0}")]
    Provider(String),

    /// The chat backend could not be reached or rejected the request.
    #[error("answer generator error: {0}")]
    Generator(String),

    /// A stored embedding is malformed (bad JSON, wrong dimension, zero norm).
    #[error("unusable stored embedding: {0}")]
    Data(String),

    /// A query against the answer store failed.
    #[error("answer store error: {0}")]
    Store(#[from] diesel::result::Error),

    /// The answer store could not be opened.
    #[error("answer store connection error: {0}")]
    StoreConnection(#[from] diesel::ConnectionError),
}
