//! Report dates and the lookback window used to select reports by age
mod date;
mod lookback;
pub(crate) use self::date::*;
pub(crate) use self::lookback::*;
