//! Error types returned across the crate's public API boundary.
//!
//! Per the error-handling design, programming errors (bad configuration,
//! calling an internal invariant-violating path) are `panic!`/`assert!` and
//! never reach here; only caller-facing data mistakes and dataset-format
//! problems are represented as [`Error`] variants.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid vector dimensions: got {received} but expected {expected}")]
    DimensionMismatch { expected: usize, received: usize },

    #[error("cannot search an empty tree")]
    EmptyTree,

    #[error("dataset format error: {message}")]
    DatasetFormat { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
