//! The photo library: the single entry point for capturing, listing and
//! removing photos.
//!
//! A library starts `Uninitialized`. [`PhotoLibrary::open`] moves it through
//! `Opening` to `Ready`, running the retention sweep on the way; if the store
//! cannot be opened it ends up `Failed` for good and a new instance is needed
//! to retry. Every other operation refuses to run until the library is ready.

use chrono::{Duration, Local, NaiveDate, TimeZone};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::db::{SqliteStore, StoreError, StoreLocation};
use crate::error::{CaptureError, LibraryError};
use crate::gallery::{self, DayGroup};
use crate::photo::{default_retention, Photo};
use crate::retention::{self, SweepReport};

const DEFAULT_BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct LibraryConfig {
    pub location: StoreLocation,
    /// How long a captured photo is kept.
    pub retention: Duration,
    pub busy_timeout: std::time::Duration,
}

impl LibraryConfig {
    pub fn new(location: StoreLocation) -> Self {
        Self {
            location,
            retention: default_retention(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(StoreLocation::Memory)
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}

/// Lifecycle stage of a [`PhotoLibrary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryStatus {
    Uninitialized,
    Opening,
    Ready,
    Failed,
}

enum LibraryState {
    Uninitialized,
    Opening,
    Ready {
        store: Arc<SqliteStore>,
        sweep: SweepReport,
    },
    Failed(String),
}

pub struct PhotoLibrary {
    config: LibraryConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<LibraryState>,
    /// Serialises `open()` so concurrent callers share one store.
    open_lock: tokio::sync::Mutex<()>,
}

impl PhotoLibrary {
    pub fn new(config: LibraryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(LibraryState::Uninitialized),
            open_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub fn status(&self) -> LibraryStatus {
        match &*self.lock_state() {
            LibraryState::Uninitialized => LibraryStatus::Uninitialized,
            LibraryState::Opening => LibraryStatus::Opening,
            LibraryState::Ready { .. } => LibraryStatus::Ready,
            LibraryState::Failed(_) => LibraryStatus::Failed,
        }
    }

    /// Outcome of the sweep that ran when the library was opened.
    pub fn last_sweep(&self) -> Option<SweepReport> {
        match &*self.lock_state() {
            LibraryState::Ready { sweep, .. } => Some(sweep.clone()),
            _ => None,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open the store and purge expired photos. Calling it again once ready is
    /// a no-op; callers racing the first open wait for it and share its result.
    pub async fn open(&self) -> Result<(), LibraryError> {
        let _opening = self.open_lock.lock().await;
        {
            let mut state = self.lock_state();
            match &*state {
                LibraryState::Ready { .. } => return Ok(()),
                LibraryState::Failed(reason) => {
                    return Err(LibraryError::StorageUnavailable {
                        reason: reason.clone(),
                    })
                }
                // `Opening` under the lock means an earlier open was abandoned
                // mid-flight; start over.
                LibraryState::Uninitialized | LibraryState::Opening => {}
            }
            *state = LibraryState::Opening;
        }

        let location = self.config.location.clone();
        let busy_timeout = self.config.busy_timeout;
        let now = self.clock.now();
        let opened = tokio::task::spawn_blocking(move || {
            let store = SqliteStore::open(&location, busy_timeout)?;
            let sweep = retention::sweep(&store, now)?;
            Ok::<_, StoreError>((store, sweep))
        })
        .await
        .map_err(StoreError::from)
        .and_then(|result| result);

        let mut state = self.lock_state();
        match opened {
            Ok((store, sweep)) => {
                info!(
                    location = %store.location(),
                    swept = sweep.deleted,
                    "photo library ready"
                );
                *state = LibraryState::Ready {
                    store: Arc::new(store),
                    sweep,
                };
                Ok(())
            }
            Err(e) => {
                error!(location = %self.config.location, error = %e, "failed to open photo library");
                let reason = e.to_string();
                *state = LibraryState::Failed(reason.clone());
                Err(LibraryError::StorageUnavailable { reason })
            }
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Store a freshly captured image. The photo gets a new id, the current
    /// time as its capture time and an expiry one retention window later.
    pub async fn capture(&self, image_data: impl Into<String>) -> Result<Photo, CaptureError> {
        self.ready_store()?;

        let photo = Photo::new(image_data.into(), self.clock.now(), self.config.retention)
            .and_then(|photo| photo.validate().map(|()| photo))
            .map_err(LibraryError::from)?;

        let stored = photo.clone();
        self.run(move |store| store.put(&stored)).await?;

        info!(id = %photo.id, expires_at = %photo.expires_at, "photo captured");
        Ok(photo)
    }

    /// Delete a photo. Removing an id that does not exist succeeds.
    pub async fn remove(&self, id: &str) -> Result<(), LibraryError> {
        let owned = id.to_string();
        let removed = self.run(move |store| store.delete_by_id(&owned)).await?;
        debug!(id, removed, "photo remove requested");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get(&self, id: &str) -> Result<Option<Photo>, LibraryError> {
        let owned = id.to_string();
        self.run(move |store| store.get_by_id(&owned)).await
    }

    /// All photos, newest first.
    pub async fn list_all(&self) -> Result<Vec<Photo>, LibraryError> {
        let mut photos = self.run(|store| store.get_all()).await?;
        gallery::sort_newest_first(&mut photos);
        Ok(photos)
    }

    /// Photos captured on `date` in the local time zone, newest first.
    pub async fn list_by_day(&self, date: NaiveDate) -> Result<Vec<Photo>, LibraryError> {
        self.list_by_day_in(date, &Local).await
    }

    /// Photos captured on `date` in `tz`, newest first.
    pub async fn list_by_day_in<Tz: TimeZone>(
        &self,
        date: NaiveDate,
        tz: &Tz,
    ) -> Result<Vec<Photo>, LibraryError> {
        let (start, end) = gallery::day_bounds(date, tz);
        let mut photos = self
            .run(move |store| store.get_by_created_range(start, end))
            .await?;
        gallery::sort_newest_first(&mut photos);
        Ok(photos)
    }

    /// All photos grouped by local capture day.
    pub async fn gallery(&self) -> Result<Vec<DayGroup>, LibraryError> {
        let photos = self.run(|store| store.get_all()).await?;
        Ok(gallery::group_by_day(photos, &Local))
    }

    pub async fn count(&self) -> Result<u64, LibraryError> {
        self.run(|store| store.count()).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Leave the library as an `open()` that was dropped mid-flight does.
    #[cfg(test)]
    fn mark_opening(&self) {
        *self.lock_state() = LibraryState::Opening;
    }

    fn lock_state(&self) -> MutexGuard<'_, LibraryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ready_store(&self) -> Result<Arc<SqliteStore>, LibraryError> {
        match &*self.lock_state() {
            LibraryState::Ready { store, .. } => Ok(Arc::clone(store)),
            LibraryState::Uninitialized | LibraryState::Opening => Err(LibraryError::NotReady),
            LibraryState::Failed(reason) => Err(LibraryError::StorageUnavailable {
                reason: reason.clone(),
            }),
        }
    }

    /// Run one store operation off the async executor. Once started it runs to
    /// completion even if the caller stops waiting.
    async fn run<T, F>(&self, op: F) -> Result<T, LibraryError>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.ready_store()?;
        let result = tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(StoreError::from)?;
        Ok(result?)
    }
}
