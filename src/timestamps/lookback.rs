use super::date::LogicalDate;
use time::{Duration, OffsetDateTime};

/// A window of whole days reaching back from a reference instant
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Lookback {
    days: u32,
}

impl Lookback {
    pub(crate) fn new(days: u32) -> Lookback {
        Lookback { days }
    }

    pub(crate) fn days(&self) -> u32 {
        self.days
    }

    /// Returns `now` minus the window, or `None` if that instant is not
    /// representable
    pub(crate) fn cutoff(&self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        now.checked_sub(Duration::days(i64::from(self.days)))
    }

    /// Test whether the start of `date` (UTC) falls strictly after the
    /// cutoff
    pub(crate) fn includes(&self, date: LogicalDate, now: OffsetDateTime) -> bool {
        self.cutoff(now)
            .is_none_or(|cutoff| date.midnight_utc() > cutoff)
    }
}
