//! Errors surfaced by the photo library.

use thiserror::Error;

use crate::db::StoreError;
use crate::photo::ValidationError;

/// Every failure the library reports falls into one of these kinds.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The photo was rejected before reaching storage; nothing was written.
    #[error("invalid photo: {0}")]
    Validation(#[from] ValidationError),

    /// The store could not be opened. The library instance stays unusable;
    /// build a new one to retry.
    #[error("photo storage unavailable: {reason}")]
    StorageUnavailable { reason: String },

    /// One operation failed against an open store and may be retried.
    #[error("photo storage operation failed: {0}")]
    Storage(#[from] StoreError),

    /// Called before `open()` completed.
    #[error("photo library is not open")]
    NotReady,
}

/// A failed capture, wrapping the underlying library error.
#[derive(Debug, Error)]
#[error("capture failed: {source}")]
pub struct CaptureError {
    #[from]
    source: LibraryError,
}

impl CaptureError {
    pub fn kind(&self) -> &LibraryError {
        &self.source
    }
}
