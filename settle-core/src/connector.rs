use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::panel::Panel;
use crate::{SeriesConfig, SettleError};

/// Persistence collaborator: a time-series store addressed by database and sensor.
///
/// Panels are exchanged in their persisted form, with maturities as UNIX
/// seconds (see [`Panel::maturity_to_timestamps`]).
#[async_trait]
pub trait SettlementStore: Send + Sync {
    /// Write the columns of `panel` under `sensor`, merging with stored rows.
    ///
    /// Returns `Ok(false)` when the store rejected the write.
    async fn write(&self, database: &str, sensor: &str, panel: &Panel) -> Result<bool, SettleError>;

    /// Read everything stored under `sensor`, optionally from `since` on.
    ///
    /// A sensor with no data yields an empty panel.
    async fn read(
        &self,
        database: &str,
        sensor: &str,
        since: Option<NaiveDate>,
    ) -> Result<Panel, SettleError>;

    /// Last stored row date of `sensor`, if any.
    async fn last_date(&self, database: &str, sensor: &str) -> Result<Option<NaiveDate>, SettleError>;

    /// Delete every row of `sensor`. Returns whether anything was deleted.
    async fn delete_sensor(&self, database: &str, sensor: &str) -> Result<bool, SettleError>;
}

/// Data-source collaborator: fetches one day of settlement prices for one market.
#[async_trait]
pub trait SettlementSource: Send + Sync {
    /// Market name; also the sensor name under which the book persists.
    fn name(&self) -> &str;

    /// Series this source downloads.
    fn configs(&self) -> &[SeriesConfig];

    /// Called once before a download range is iterated, e.g. to fetch a bulk
    /// file that covers several dates.
    async fn prepare(&self, _start: NaiveDate, _end: NaiveDate, _force: bool) -> Result<(), SettleError> {
        Ok(())
    }

    /// Settlement panel of `as_of` for the given subset of [`Self::configs`].
    ///
    /// Returns `Ok(None)` when the source has nothing for that date.
    async fn fetch_date(
        &self,
        as_of: NaiveDate,
        configs: &[SeriesConfig],
    ) -> Result<Option<Panel>, SettleError>;
}

/// Calendar collaborator: non-business days for a range of years.
pub trait HolidayCalendar: Send + Sync {
    /// Holidays falling in the given calendar years (inclusive).
    ///
    /// # Errors
    /// Implementations may fail when they cannot supply data for the range.
    fn holidays(&self, years: RangeInclusive<i32>) -> Result<BTreeSet<NaiveDate>, SettleError>;
}
