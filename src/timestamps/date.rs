use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;
use time::{Date, Month, OffsetDateTime};

/// The calendar date of a report, as encoded in the report's object name
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub(crate) struct LogicalDate(Date);

impl LogicalDate {
    /// Read the date from an object name of the form
    /// `{prefix...}/{year}/{month}/{day}/{filename}`.
    ///
    /// The name is split on forward slashes, and the year, month, and day are
    /// taken from the fourth-from-last, third-from-last, and second-from-last
    /// segments, respectively.
    ///
    /// Out-of-range components such as month 13 or February 30 are rejected
    /// rather than rolled over into a neighboring date.
    pub(crate) fn from_object_name(name: &str) -> Result<LogicalDate, LogicalDateError> {
        let segments = name.split('/').collect::<Vec<_>>();
        let [.., year, month, day, _] = segments[..] else {
            return Err(LogicalDateError::TooShort {
                name: name.to_owned(),
            });
        };
        let year = parse_segment(name, year)?;
        let month = parse_segment(name, month)?;
        let day = parse_segment(name, day)?;
        let invalid = || LogicalDateError::Invalid {
            name: name.to_owned(),
        };
        let month = u8::try_from(month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .ok_or_else(invalid)?;
        let day = u8::try_from(day).map_err(|_| invalid())?;
        Date::from_calendar_date(year, month, day)
            .map(LogicalDate)
            .map_err(|_| invalid())
    }

    /// Format the date as `YYYYMMDD` for use as a filename prefix
    pub(crate) fn compact(&self) -> String {
        format!(
            "{:04}{:02}{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }

    /// Return the instant at which the date begins in UTC
    pub(crate) fn midnight_utc(&self) -> OffsetDateTime {
        self.0.midnight().assume_utc()
    }
}

impl From<Date> for LogicalDate {
    fn from(value: Date) -> LogicalDate {
        LogicalDate(value)
    }
}

impl fmt::Display for LogicalDate {
    /// Format the date as `YYYY-MM-DD`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl Serialize for LogicalDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn parse_segment(name: &str, segment: &str) -> Result<i32, LogicalDateError> {
    segment
        .parse::<i32>()
        .map_err(|_| LogicalDateError::NotInteger {
            name: name.to_owned(),
            segment: segment.to_owned(),
        })
}

/// Error returned when an object name does not encode a report date
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub(crate) enum LogicalDateError {
    #[error("invalid object name format: {name:?} has fewer than four path segments")]
    TooShort { name: String },
    #[error("invalid object name format: {name:?} has non-integer date segment {segment:?}")]
    NotInteger { name: String, segment: String },
    #[error("invalid object name format: {name:?} does not encode a valid calendar date")]
    Invalid { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use time::macros::date;

    #[rstest]
    #[case("a/b/2025/09/25/FOCUS_REPORT1.csv", date!(2025 - 09 - 25))]
    #[case("a/b/2025/09/20/FOCUS_REPORT2.csv", date!(2025 - 09 - 20))]
    #[case("2024/1/2/report.csv.gz", date!(2024 - 01 - 02))]
    #[case("FOCUS Reports/2024/02/29/0001.csv.gz", date!(2024 - 02 - 29))]
    #[case("x/2023/12/31/", date!(2023 - 12 - 31))]
    fn from_object_name(#[case] name: &str, #[case] expected: Date) {
        assert_eq!(
            LogicalDate::from_object_name(name),
            Ok(LogicalDate(expected))
        );
    }

    #[rstest]
    #[case("weirdfile.csv")]
    #[case("2025/09/25")]
    #[case("")]
    fn too_short(#[case] name: &str) {
        assert_matches!(
            LogicalDate::from_object_name(name),
            Err(LogicalDateError::TooShort { .. })
        );
    }

    #[rstest]
    #[case("a/b/twenty/09/25/FOCUS.csv")]
    #[case("a/b/2025/sep/25/FOCUS.csv")]
    #[case("a/b/2025/09/2x/FOCUS.csv")]
    #[case("a/b/2025/09//FOCUS.csv")]
    fn not_integer(#[case] name: &str) {
        assert_matches!(
            LogicalDate::from_object_name(name),
            Err(LogicalDateError::NotInteger { .. })
        );
    }

    #[rstest]
    #[case("a/b/2025/13/01/FOCUS.csv")]
    #[case("a/b/2025/00/01/FOCUS.csv")]
    #[case("a/b/2025/02/30/FOCUS.csv")]
    #[case("a/b/2025/09/-1/FOCUS.csv")]
    #[case("a/b/2025/300/01/FOCUS.csv")]
    fn invalid_calendar_date(#[case] name: &str) {
        assert_matches!(
            LogicalDate::from_object_name(name),
            Err(LogicalDateError::Invalid { .. })
        );
    }

    #[test]
    fn extraction_is_deterministic() {
        let name = "a/b/2025/09/25/FOCUS_REPORT1.csv";
        assert_eq!(
            LogicalDate::from_object_name(name),
            LogicalDate::from_object_name(name)
        );
    }

    #[rstest]
    #[case(date!(2025 - 09 - 25), "20250925", "2025-09-25")]
    #[case(date!(2024 - 01 - 01), "20240101", "2024-01-01")]
    #[case(date!(2000 - 02 - 29), "20000229", "2000-02-29")]
    fn formatting(#[case] d: Date, #[case] compact: &str, #[case] display: &str) {
        let ld = LogicalDate::from(d);
        assert_eq!(ld.compact(), compact);
        assert_eq!(ld.to_string(), display);
    }
}
