//! How often a recurring transaction repeats, and how to find its next date.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month, util::is_leap_year};

use crate::Error;

/// The cadence of a recurring transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Weekly,
    /// Every two weeks.
    Biweekly,
    Monthly,
    Yearly,
    /// A stored value that is none of the above.
    ///
    /// Only produced when reading rows written by something other than this
    /// application. It repeats every 30 days.
    #[serde(skip_deserializing)]
    Unknown,
}

impl Frequency {
    /// The frequencies a user may choose from.
    pub const CHOICES: [Frequency; 5] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Biweekly,
        Frequency::Monthly,
        Frequency::Yearly,
    ];

    /// The tag used to store the frequency in the database and in forms.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Biweekly => "BIWEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
            Frequency::Unknown => "UNKNOWN",
        }
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Biweekly => "Every 2 weeks",
            Frequency::Monthly => "Monthly",
            Frequency::Yearly => "Yearly",
            Frequency::Unknown => "Every 30 days",
        };

        write!(f, "{label}")
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "BIWEEKLY" => Ok(Frequency::Biweekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            _ => Err(Error::InvalidFrequency(s.to_owned())),
        }
    }
}

impl ToSql for Frequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Frequency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        Ok(text.parse().unwrap_or_else(|_| {
            tracing::warn!("Unrecognised frequency \"{text}\", falling back to every 30 days");
            Frequency::Unknown
        }))
    }
}

/// Get the date of the occurrence after `date` for `frequency`.
///
/// Monthly and yearly occurrences keep the same day of the month, clamped to
/// the last day of shorter months. Each step clamps on its own, so a monthly
/// schedule from January 31st goes to February 29th and then March 29th in
/// 2024.
///
/// Never fails. Dates past the last representable date saturate at
/// [Date::MAX].
pub fn next_occurrence(date: Date, frequency: Frequency) -> Date {
    match frequency {
        Frequency::Daily => add_days(date, 1),
        Frequency::Weekly => add_days(date, 7),
        Frequency::Biweekly => add_days(date, 14),
        Frequency::Monthly => add_month(date),
        Frequency::Yearly => add_year(date),
        Frequency::Unknown => add_days(date, 30),
    }
}

fn add_days(date: Date, days: i64) -> Date {
    date.checked_add(Duration::days(days)).unwrap_or(Date::MAX)
}

fn add_month(date: Date) -> Date {
    let (year, month) = match date.month() {
        Month::December => (date.year() + 1, Month::January),
        month => (date.year(), month.next()),
    };

    clamped_date(year, month, date.day())
}

fn add_year(date: Date) -> Date {
    clamped_date(date.year() + 1, date.month(), date.day())
}

/// The date for `day` of `month`, or the month's last day if `day` is past it.
fn clamped_date(year: i32, month: Month, day: u8) -> Date {
    let day = day.min(days_in_month(year, month));

    Date::from_calendar_date(year, month, day).unwrap_or(Date::MAX)
}

/// The number of days in `month` of `year`.
pub fn days_in_month(year: i32, month: Month) -> u8 {
    match month {
        Month::January
        | Month::March
        | Month::May
        | Month::July
        | Month::August
        | Month::October
        | Month::December => 31,
        Month::April | Month::June | Month::September | Month::November => 30,
        Month::February if is_leap_year(year) => 29,
        Month::February => 28,
    }
}


#[cfg(test)]
mod frequency_tests {
    use crate::Error;

    use super::Frequency;

    #[test]
    fn parse_accepts_the_five_tags_in_any_case() {
        assert_eq!("monthly".parse(), Ok(Frequency::Monthly));
        assert_eq!("BIWEEKLY".parse(), Ok(Frequency::Biweekly));
    }

    #[test]
    fn parse_fails_on_unknown_tag() {
        assert_eq!(
            "FORTNIGHTLY".parse::<Frequency>(),
            Err(Error::InvalidFrequency("FORTNIGHTLY".to_owned()))
        );
    }

    #[test]
    fn unknown_stored_value_reads_as_unknown() {
        let connection = rusqlite::Connection::open_in_memory().unwrap();

        let frequency: Frequency = connection
            .query_row("SELECT 'QUARTERLY'", [], |row| row.get(0))
            .unwrap();

        assert_eq!(frequency, Frequency::Unknown);
    }
}
