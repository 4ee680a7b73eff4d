//! Ephemera: a personal photo capture store.
//!
//! Captured images are kept in a local SQLite store for a fixed retention
//! window (two days by default) and purged automatically the next time the
//! library is opened. The [`library::PhotoLibrary`] facade is the only surface
//! callers are expected to use.

pub mod capture;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod gallery;
pub mod library;
pub mod logging;
pub mod photo;
pub mod retention;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CaptureError, LibraryError};
pub use library::{LibraryConfig, LibraryStatus, PhotoLibrary};
pub use photo::{Photo, RawPhoto, ValidationError, RETENTION_DAYS};
