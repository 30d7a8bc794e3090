//! Resolves the configured canonical timezone into the local calendar date.

use serde::Serializer;
use time::{Date, OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

use crate::Error;

/// Get the current UTC offset of a canonical timezone, e.g. "Pacific/Auckland".
///
/// Returns `None` if `canonical_timezone` is not a known timezone.
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

/// Get today's date in the timezone `canonical_timezone`.
///
/// # Errors
///
/// Returns [Error::InvalidTimezoneError] if `canonical_timezone` is not a
/// known timezone.
pub fn local_today(canonical_timezone: &str) -> Result<Date, Error> {
    let offset = get_local_offset(canonical_timezone)
        .ok_or_else(|| Error::InvalidTimezoneError(canonical_timezone.to_owned()))?;

    Ok(OffsetDateTime::now_utc().to_offset(offset).date())
}

/// Serialize a date as "YYYY-MM-DD" for JSON responses.
pub(crate) fn serialize_date<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(date)
}
