//! Calendar-day arithmetic in a fixed named time zone.

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Local calendar day of `ts` in `tz`.
pub fn day_bucket(ts: DateTime<Utc>, tz: Tz) -> NaiveDate {
    ts.with_timezone(&tz).date_naive()
}

/// The instant local midnight of `day` begins in `tz`.
///
/// When midnight is skipped by a DST jump the earliest existing local time
/// of that day is used.
pub fn start_of_day(day: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = day.and_time(chrono::NaiveTime::MIN);
    match tz.from_local_datetime(&midnight).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => (1..=3)
            .filter_map(|h| tz.from_local_datetime(&(midnight + chrono::Duration::hours(h))).earliest())
            .map(|local| local.with_timezone(&Utc))
            .next()
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight)),
    }
}

/// Exclusive upper bound covering the whole local day that contains `ts`.
pub fn end_of_day(ts: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let day = day_bucket(ts, tz);
    start_of_day(day.checked_add_days(Days::new(1)).unwrap_or(day), tz)
}

/// Parse a query-string date: `YYYY-MM-DD` is local midnight in `tz`,
/// anything else must be RFC 3339. Returns `None` when neither parses.
pub fn parse_date(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(start_of_day(day, tz));
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|ts| ts.with_timezone(&Utc))
}
