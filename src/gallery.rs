//! Calendar-day helpers for the gallery view.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::BTreeMap;

use crate::photo::Photo;

/// Photos captured on one calendar day, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub photos: Vec<Photo>,
}

impl DayGroup {
    /// Heading such as `January 1, 2024`.
    pub fn label(&self) -> String {
        self.date.format("%B %-d, %Y").to_string()
    }
}

/// First and last millisecond of `date` in `tz`, as UTC instants.
///
/// The end is one millisecond before the next day starts, so days that are
/// shortened or lengthened by a DST change come out right.
pub fn day_bounds<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_of_day(date, tz);
    let end = match date.succ_opt() {
        Some(next) => start_of_day(next, tz) - Duration::milliseconds(1),
        None => DateTime::<Utc>::MAX_UTC,
    };
    (start, end)
}

fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    // Some zones skip midnight on DST days; the day then starts at the first
    // local time that exists.
    (0..=180)
        .step_by(15)
        .find_map(|minutes| {
            tz.from_local_datetime(&(midnight + Duration::minutes(minutes)))
                .earliest()
        })
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

/// Newest first; equal capture times fall back to id order.
pub fn sort_newest_first(photos: &mut [Photo]) {
    photos.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// Group photos by the local calendar day they were captured on, newest day
/// first and newest photo first within each day.
pub fn group_by_day<Tz: TimeZone>(photos: Vec<Photo>, tz: &Tz) -> Vec<DayGroup> {
    let mut days: BTreeMap<NaiveDate, Vec<Photo>> = BTreeMap::new();
    for photo in photos {
        let date = photo.created_at.with_timezone(tz).date_naive();
        days.entry(date).or_default().push(photo);
    }

    days.into_iter()
        .rev()
        .map(|(date, mut photos)| {
            sort_newest_first(&mut photos);
            DayGroup { date, photos }
        })
        .collect()
}

/// Caption shown under a thumbnail, e.g. `10:05`.
pub fn time_caption<Tz: TimeZone>(photo: &Photo, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    photo.created_at.with_timezone(tz).format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::default_retention;
    use chrono::FixedOffset;

    fn photo_at(t: DateTime<Utc>) -> Photo {
        Photo::new("x".to_string(), t, default_retention()).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_bounds_utc() {
        let (start, end) = day_bounds(date(2024, 1, 1), &Utc);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(
            end,
            Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 59).unwrap() + Duration::milliseconds(999)
        );
    }

    #[test]
    fn test_day_bounds_follow_the_zone() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let (start, end) = day_bounds(date(2024, 1, 1), &tokyo);
        assert_eq!(start, Utc.with_ymd_and_hms(2023, 12, 31, 15, 0, 0).unwrap());
        assert_eq!(end - start, Duration::days(1) - Duration::milliseconds(1));
    }

    #[test]
    fn test_group_by_day_orders_days_and_photos() {
        let a = photo_at(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        let b = photo_at(Utc.with_ymd_and_hms(2024, 1, 1, 10, 5, 0).unwrap());
        let c = photo_at(Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap());

        let groups = group_by_day(vec![a.clone(), c.clone(), b.clone()], &Utc);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].date, date(2024, 1, 2));
        assert_eq!(groups[0].photos, vec![c]);
        assert_eq!(groups[1].date, date(2024, 1, 1));
        assert_eq!(groups[1].photos, vec![b, a]);
        assert_eq!(groups[1].label(), "January 1, 2024");
    }

    #[test]
    fn test_grouping_uses_local_date() {
        // 23:30 UTC is already the next morning in Tokyo.
        let late = photo_at(Utc.with_ymd_and_hms(2024, 1, 1, 23, 30, 0).unwrap());
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();

        let groups = group_by_day(vec![late.clone()], &tokyo);
        assert_eq!(groups[0].date, date(2024, 1, 2));
        assert_eq!(time_caption(&late, &tokyo), "08:30");
    }
}
