//! Error type shared by the bucket store and the table.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    /// A table needs at least one bucket.
    #[error("bucket count must be at least 1, got {requested}")]
    InvalidBucketCount { requested: usize },
    /// Keys are non-empty byte strings.
    #[error("keys must be non-empty")]
    EmptyKey,
    /// A reservation failed; the operation was abandoned before any
    /// observable mutation.
    #[error("allocation of {bytes} bytes failed")]
    AllocationFailed { bytes: usize },
}
