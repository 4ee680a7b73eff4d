//! The photo record and the checks applied before one enters the store.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Days a captured photo is kept before the sweeper removes it.
pub const RETENTION_DAYS: i64 = 2;

/// [`RETENTION_DAYS`] in seconds, the unit the config file uses.
pub const RETENTION_SECONDS: u64 = RETENTION_DAYS as u64 * 24 * 60 * 60;

pub fn default_retention() -> Duration {
    Duration::days(RETENTION_DAYS)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("field `{field}` is not an RFC 3339 date: {value:?}")]
    MalformedDate { field: &'static str, value: String },

    #[error("a retention of {retention_seconds}s from {created_at} is past the latest representable date")]
    ExpiryOutOfRange {
        created_at: DateTime<Utc>,
        retention_seconds: i64,
    },

    #[error("expiresAt ({expires_at}) must be later than createdAt ({created_at})")]
    ExpiryNotAfterCreation {
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
}

/// One captured image plus its timing metadata. Write-once: nothing in the
/// crate mutates a photo after it has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawPhoto")]
pub struct Photo {
    pub id: String,
    /// Encoded image payload, handed back to the renderer unchanged.
    pub image_data: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Photo {
    /// Build a new record with a fresh id. The capture instant is truncated to
    /// milliseconds, the precision the store keeps.
    pub fn new(
        image_data: String,
        captured_at: DateTime<Utc>,
        retention: Duration,
    ) -> Result<Self, ValidationError> {
        let created_at = captured_at.trunc_subsecs(3);
        let expires_at = created_at.checked_add_signed(retention).ok_or(
            ValidationError::ExpiryOutOfRange {
                created_at,
                retention_seconds: retention.num_seconds(),
            },
        )?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            image_data,
            created_at,
            expires_at,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyField("id"));
        }
        if self.image_data.is_empty() {
            return Err(ValidationError::EmptyField("imageData"));
        }
        if self.expires_at <= self.created_at {
            return Err(ValidationError::ExpiryNotAfterCreation {
                created_at: self.created_at,
                expires_at: self.expires_at,
            });
        }
        Ok(())
    }

    /// Whether the retention window has elapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Time left before the photo becomes eligible for deletion.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.is_expired(now) {
            None
        } else {
            Some(self.expires_at - now)
        }
    }
}

/// An unchecked photo as it arrives from outside the crate, e.g. as JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPhoto {
    pub id: Option<String>,
    pub image_data: Option<String>,
    pub created_at: Option<String>,
    pub expires_at: Option<String>,
}

impl TryFrom<RawPhoto> for Photo {
    type Error = ValidationError;

    fn try_from(raw: RawPhoto) -> Result<Self, Self::Error> {
        let photo = Photo {
            id: required("id", raw.id)?,
            image_data: required("imageData", raw.image_data)?,
            created_at: parse_date("createdAt", required("createdAt", raw.created_at)?)?,
            expires_at: parse_date("expiresAt", required("expiresAt", raw.expires_at)?)?,
        };
        photo.validate()?;
        Ok(photo)
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    value.ok_or(ValidationError::MissingField(field))
}

fn parse_date(field: &'static str, value: String) -> Result<DateTime<Utc>, ValidationError> {
    match DateTime::parse_from_rfc3339(&value) {
        Ok(date) => Ok(date.with_timezone(&Utc)),
        Err(_) => Err(ValidationError::MalformedDate { field, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(created_at: DateTime<Utc>) -> Photo {
        Photo::new("data:image/jpeg;base64,AAAA".to_string(), created_at, default_retention()).unwrap()
    }

    #[test]
    fn test_new_photo_expires_after_retention() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let photo = sample(t);

        assert_eq!(photo.created_at, t);
        assert_eq!(photo.expires_at, Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap());
        assert!(!photo.id.is_empty());
        assert!(photo.validate().is_ok());
    }

    #[test]
    fn test_new_photo_truncates_to_milliseconds() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
            + Duration::nanoseconds(1_234_567);
        let photo = sample(t);
        assert_eq!(photo.created_at.timestamp_subsec_nanos(), 1_000_000);
    }

    #[test]
    fn test_ids_are_unique() {
        let t = Utc::now();
        assert_ne!(sample(t).id, sample(t).id);
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let mut photo = sample(Utc::now());
        photo.image_data.clear();
        assert_eq!(photo.validate(), Err(ValidationError::EmptyField("imageData")));

        let mut photo = sample(Utc::now());
        photo.id = "  ".to_string();
        assert_eq!(photo.validate(), Err(ValidationError::EmptyField("id")));
    }

    #[test]
    fn test_validate_rejects_expiry_not_after_creation() {
        let t = Utc::now();
        let photo = Photo::new("x".to_string(), t, Duration::zero()).unwrap();
        assert!(matches!(
            photo.validate(),
            Err(ValidationError::ExpiryNotAfterCreation { .. })
        ));
    }

    #[test]
    fn test_retention_past_max_date_is_rejected() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let result = Photo::new("x".to_string(), t, Duration::seconds(9_000_000_000_000));
        assert_eq!(
            result,
            Err(ValidationError::ExpiryOutOfRange {
                created_at: t,
                retention_seconds: 9_000_000_000_000,
            })
        );
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let photo = sample(t);

        let just_before = photo.expires_at - Duration::milliseconds(1);
        assert!(!photo.is_expired(just_before));
        assert_eq!(photo.time_remaining(just_before), Some(Duration::milliseconds(1)));

        assert!(photo.is_expired(photo.expires_at));
        assert_eq!(photo.time_remaining(photo.expires_at), None);
    }

    #[test]
    fn test_raw_photo_missing_field() {
        let raw = RawPhoto {
            id: Some("a".to_string()),
            image_data: Some("x".to_string()),
            created_at: Some("2024-01-01T10:00:00Z".to_string()),
            expires_at: None,
        };
        assert_eq!(Photo::try_from(raw), Err(ValidationError::MissingField("expiresAt")));
    }

    #[test]
    fn test_raw_photo_malformed_date() {
        let raw = RawPhoto {
            id: Some("a".to_string()),
            image_data: Some("x".to_string()),
            created_at: Some("yesterday".to_string()),
            expires_at: Some("2024-01-03T10:00:00Z".to_string()),
        };
        assert_eq!(
            Photo::try_from(raw),
            Err(ValidationError::MalformedDate {
                field: "createdAt",
                value: "yesterday".to_string(),
            })
        );
    }

    #[test]
    fn test_json_uses_camel_case_and_validates() {
        let photo = sample(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        let json = serde_json::to_value(&photo).unwrap();
        assert!(json.get("imageData").is_some());
        assert!(json.get("expiresAt").is_some());

        let parsed: Photo = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, photo);

        let inverted = r#"{
            "id": "a",
            "imageData": "x",
            "createdAt": "2024-01-03T10:00:00Z",
            "expiresAt": "2024-01-01T10:00:00Z"
        }"#;
        assert!(serde_json::from_str::<Photo>(inverted).is_err());
    }
}
