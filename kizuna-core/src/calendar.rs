//! Wall-clock helpers.
//!
//! Day, week and hour rules are evaluated in the user's local offset, while
//! every stored timestamp stays in UTC.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

use crate::types::TimeOfDay;

/// A moment as seen on the user's wall clock.
pub type LocalTime = DateTime<FixedOffset>;

/// Timestamps persisted in documents.
pub type Timestamp = DateTime<Utc>;

fn local_to_utc(naive: NaiveDateTime, offset: &FixedOffset) -> Timestamp {
    let utc_naive = naive - Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&utc_naive)
}

fn start_of(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::default())
}

/// 23:59:59.999 local on the day of `now`.
pub fn end_of_day(now: &LocalTime) -> Timestamp {
    let end = start_of(now.date_naive()) + Duration::days(1) - Duration::milliseconds(1);
    local_to_utc(end, now.offset())
}

/// End of the coming Sunday. On a Sunday this is the following Sunday.
pub fn end_of_week(now: &LocalTime) -> Timestamp {
    let days_until_sunday = 7 - i64::from(now.weekday().num_days_from_sunday());
    let end = start_of(now.date_naive()) + Duration::days(days_until_sunday + 1)
        - Duration::milliseconds(1);
    local_to_utc(end, now.offset())
}

pub fn days_after(now: &LocalTime, days: i64) -> Timestamp {
    (*now + Duration::days(days)).with_timezone(&Utc)
}

/// Calendar days between `earlier` and `now` in the local offset.
pub fn day_gap(earlier: &Timestamp, now: &LocalTime) -> i64 {
    let earlier_local = earlier.with_timezone(now.offset()).date_naive();
    (now.date_naive() - earlier_local).num_days()
}

/// First day of the Sunday-start week that contains `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

pub fn same_week(earlier: &Timestamp, now: &LocalTime) -> bool {
    let earlier_local = earlier.with_timezone(now.offset()).date_naive();
    week_start(earlier_local) == week_start(now.date_naive())
}

pub fn time_of_day(now: &LocalTime) -> TimeOfDay {
    TimeOfDay::from_hour(now.hour())
}
