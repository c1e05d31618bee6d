use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use settle_core::{HolidayCalendar, SettleError};

/// Closing days of the TARGET2 payment system, as published by the ECB.
///
/// New Year's Day, Good Friday, Easter Monday, Labour Day, Christmas Day and
/// 26 December. Exchanges that also close on other fixed days (EEX closes on
/// 24 and 31 December) add them with [`TargetCalendar::with_extra_days`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetCalendar {
    extra: Vec<(u32, u32)>,
}

impl TargetCalendar {
    /// The plain TARGET2 calendar.
    #[must_use]
    pub const fn new() -> Self {
        Self { extra: Vec::new() }
    }

    /// Also close on these `(month, day)` pairs every year.
    #[must_use]
    pub fn with_extra_days(mut self, days: &[(u32, u32)]) -> Self {
        self.extra.extend_from_slice(days);
        self
    }

    fn year(&self, year: i32) -> Result<Vec<NaiveDate>, SettleError> {
        let fixed = |m: u32, d: u32| {
            NaiveDate::from_ymd_opt(year, m, d)
                .ok_or_else(|| SettleError::InvalidArg(format!("no date {year}-{m:02}-{d:02}")))
        };
        let easter = easter_sunday(year)
            .ok_or_else(|| SettleError::InvalidArg(format!("no easter date for {year}")))?;
        let shifted = |days: Days, forward: bool| {
            let d = if forward { easter.checked_add_days(days) } else { easter.checked_sub_days(days) };
            d.ok_or_else(|| SettleError::InvalidArg(format!("easter {easter} out of range")))
        };
        let mut days = vec![
            fixed(1, 1)?,
            shifted(Days::new(2), false)?,
            shifted(Days::new(1), true)?,
            fixed(5, 1)?,
            fixed(12, 25)?,
            fixed(12, 26)?,
        ];
        for &(m, d) in &self.extra {
            days.push(fixed(m, d)?);
        }
        Ok(days)
    }
}

impl HolidayCalendar for TargetCalendar {
    fn holidays(&self, years: RangeInclusive<i32>) -> Result<BTreeSet<NaiveDate>, SettleError> {
        let mut out = BTreeSet::new();
        for year in years {
            out.extend(self.year(year)?);
        }
        Ok(out)
    }
}

/// A calendar without holidays: every weekday is a business day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoHolidays;

impl HolidayCalendar for NoHolidays {
    fn holidays(&self, _years: RangeInclusive<i32>) -> Result<BTreeSet<NaiveDate>, SettleError> {
        Ok(BTreeSet::new())
    }
}

/// Easter Sunday of `year` in the Gregorian calendar (anonymous algorithm).
#[must_use]
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let (d, e) = (b / 4, b % 4);
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let (i, k) = (c / 4, c % 4);
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

/// Weekdays in `[start, end]` that are not in `holidays`, ascending.
#[must_use]
pub fn business_days(start: NaiveDate, end: NaiveDate, holidays: &BTreeSet<NaiveDate>) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) && !holidays.contains(d))
        .collect()
}

/// Weekday before `date`; Monday goes back to Friday.
#[must_use]
pub fn previous_weekday(date: NaiveDate) -> NaiveDate {
    let back = match date.weekday() {
        Weekday::Mon => 3,
        Weekday::Sun => 2,
        _ => 1,
    };
    date.checked_sub_days(Days::new(back)).unwrap_or(date)
}

/// Split `items` into `n` contiguous chunks whose sizes differ by at most one.
///
/// The first `len % n` chunks are one element longer. With fewer items than
/// chunks the trailing chunks are empty. `n == 0` is treated as one chunk.
#[must_use]
pub fn split_chunks<T>(items: &[T], n: usize) -> Vec<&[T]> {
    let n = n.max(1);
    let (base, extra) = (items.len() / n, items.len() % n);
    let mut out = Vec::with_capacity(n);
    let mut rest = items;
    for i in 0..n {
        let size = base + usize::from(i < extra);
        let (head, tail) = rest.split_at(size);
        out.push(head);
        rest = tail;
    }
    out
}

/// Holidays of `calendar` for the years spanned by `[start, end]`, or none if it fails.
pub(crate) fn holidays_or_empty(
    calendar: &dyn HolidayCalendar,
    start: NaiveDate,
    end: NaiveDate,
) -> BTreeSet<NaiveDate> {
    match calendar.holidays(start.year()..=end.year()) {
        Ok(h) => h,
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_e, %start, %end, "holiday calendar unavailable, assuming no holidays");
            BTreeSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_sizes_follow_remainder_first() {
        let items: Vec<u32> = (0..7).collect();
        let sizes: Vec<usize> = split_chunks(&items, 3).iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![3, 2, 2]);
        let sizes: Vec<usize> = split_chunks(&items[..2], 4).iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![1, 1, 0, 0]);
        assert_eq!(split_chunks(&items, 0).len(), 1);
    }
}
