//! Retention sweep: deletes every photo whose expiry has passed.
//!
//! The sweep runs once, when the library is opened. There is no background
//! timer, so a photo that expires while the library stays open remains
//! visible (and removable by hand) until the next open.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::db::{SqliteStore, StoreError};

/// The two store operations a sweep needs.
pub trait ExpiryIndex {
    /// Ids of photos with `expires_at <= now`.
    fn expired_ids(&self, now: DateTime<Utc>) -> Result<Vec<String>, StoreError>;

    /// Remove one photo. Returns whether a row was removed.
    fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

impl ExpiryIndex for SqliteStore {
    fn expired_ids(&self, now: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        self.get_ids_with_expiry_before(now)
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.delete_by_id(id)
    }
}

/// A photo the sweep could not delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    pub id: String,
    pub error: String,
}

/// Result of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Photos found past their expiry.
    pub expired: usize,
    pub deleted: usize,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Delete everything that expired at or before `now`.
///
/// Each delete is its own transaction. A failed delete is recorded in the
/// report and the sweep moves on; only a failure to read the expiry index
/// aborts the pass.
pub fn sweep<S>(store: &S, now: DateTime<Utc>) -> Result<SweepReport, StoreError>
where
    S: ExpiryIndex + ?Sized,
{
    let expired = store.expired_ids(now)?;
    let mut report = SweepReport {
        expired: expired.len(),
        ..Default::default()
    };

    for id in expired {
        match store.delete(&id) {
            Ok(_) => report.deleted += 1,
            Err(e) => {
                warn!(id = %id, error = %e, "failed to delete expired photo");
                report.failures.push(SweepFailure {
                    id,
                    error: e.to_string(),
                });
            }
        }
    }

    if report.expired > 0 {
        info!(
            deleted = report.deleted,
            failed = report.failures.len(),
            "retention sweep removed expired photos"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoreLocation;
    use crate::photo::{default_retention, Photo};
    use chrono::{Duration, TimeZone};
    use std::cell::RefCell;

    fn at(day: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, h, m, s).unwrap()
    }

    fn photo_at(t: DateTime<Utc>) -> Photo {
        Photo::new("data:image/jpeg;base64,AAAA".to_string(), t, default_retention()).unwrap()
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = SqliteStore::open(&StoreLocation::Memory, std::time::Duration::from_secs(1)).unwrap();
        let old = photo_at(at(1, 10, 0, 0));
        let fresh = photo_at(at(2, 10, 0, 0));
        store.put(&old).unwrap();
        store.put(&fresh).unwrap();

        let report = sweep(&store, at(3, 10, 0, 1)).unwrap();

        assert_eq!(report.expired, 1);
        assert_eq!(report.deleted, 1);
        assert!(report.is_clean());
        assert_eq!(store.get_all().unwrap(), vec![fresh]);
    }

    #[test]
    fn test_sweep_with_nothing_expired() {
        let store = SqliteStore::open(&StoreLocation::Memory, std::time::Duration::from_secs(1)).unwrap();
        store.put(&photo_at(at(1, 10, 0, 0))).unwrap();

        let report = sweep(&store, at(1, 12, 0, 0)).unwrap();
        assert_eq!(report, SweepReport::default());
        assert_eq!(store.count().unwrap(), 1);
    }

    /// Fails to delete the ids it is told to.
    struct FlakyIndex {
        ids: Vec<String>,
        broken: &'static str,
        deleted: RefCell<Vec<String>>,
    }

    impl ExpiryIndex for FlakyIndex {
        fn expired_ids(&self, _now: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
            Ok(self.ids.clone())
        }

        fn delete(&self, id: &str) -> Result<bool, StoreError> {
            if id == self.broken {
                return Err(StoreError::Poisoned);
            }
            self.deleted.borrow_mut().push(id.to_string());
            Ok(true)
        }
    }

    #[test]
    fn test_failed_delete_does_not_stop_sweep() {
        let index = FlakyIndex {
            ids: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            broken: "b",
            deleted: RefCell::new(Vec::new()),
        };

        let report = sweep(&index, Utc::now()).unwrap();

        assert_eq!(report.expired, 3);
        assert_eq!(report.deleted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, "b");
        assert!(!report.is_clean());
        assert_eq!(*index.deleted.borrow(), vec!["a".to_string(), "c".to_string()]);
    }

    struct UnreadableIndex;

    impl ExpiryIndex for UnreadableIndex {
        fn expired_ids(&self, _now: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Poisoned)
        }

        fn delete(&self, _id: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[test]
    fn test_unreadable_index_fails_the_sweep() {
        assert!(matches!(
            sweep(&UnreadableIndex, Utc::now() + Duration::days(1)),
            Err(StoreError::Poisoned)
        ));
    }
}
