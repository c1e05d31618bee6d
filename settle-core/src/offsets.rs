//! Offsets between as-of dates and contract maturities, in product periods.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, TimeZone};

use crate::{Product, SettleError};

/// Anything that can be reduced to a calendar date.
///
/// Time-zone aware values are reduced to their local calendar date, so naive
/// and aware inputs can be mixed freely: only calendar differences matter.
pub trait CalendarDate {
    /// The calendar date of this value.
    fn calendar_date(&self) -> NaiveDate;
}

impl CalendarDate for NaiveDate {
    fn calendar_date(&self) -> NaiveDate {
        *self
    }
}

impl CalendarDate for NaiveDateTime {
    fn calendar_date(&self) -> NaiveDate {
        self.date()
    }
}

impl<Tz: TimeZone> CalendarDate for DateTime<Tz> {
    fn calendar_date(&self) -> NaiveDate {
        self.date_naive()
    }
}

const fn quarter_of(month: u32) -> i32 {
    ((month - 1) / 3 + 1) as i32
}

/// Monday of the week containing `date`.
#[must_use]
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    let back = u64::from(date.weekday().num_days_from_monday());
    date - Days::new(back)
}

fn days_to_i32(days: i64) -> Result<i32, SettleError> {
    i32::try_from(days).map_err(|_| SettleError::InvalidArg(format!("offset of {days} days out of range")))
}

/// Number of `product` periods between `as_of` and `maturity`.
///
/// - `Y`: difference of calendar years.
/// - `Q`: difference of calendar quarters.
/// - `M`: difference of calendar months.
/// - `D`: calendar days.
/// - `W`: whole weeks from the Monday of `as_of`'s week to `maturity`.
///
/// # Errors
/// Returns `Err(SettleError::InvalidGranularity)` for products without offsets (`H`).
pub fn offset<A, M>(as_of: &A, maturity: &M, product: Product) -> Result<i32, SettleError>
where
    A: CalendarDate + ?Sized,
    M: CalendarDate + ?Sized,
{
    let a = as_of.calendar_date();
    let m = maturity.calendar_date();
    let years = m.year() - a.year();
    match product {
        Product::Year => Ok(years),
        Product::Quarter => Ok(years * 4 + quarter_of(m.month()) - quarter_of(a.month())),
        Product::Month => Ok(years * 12 + m.month() as i32 - a.month() as i32),
        Product::Day => days_to_i32((m - a).num_days()),
        Product::Week => days_to_i32((m - monday_of(a)).num_days().div_euclid(7)),
        Product::Hour => Err(SettleError::invalid_granularity(product.as_str())),
    }
}

/// [`offset`] with the granularity given as its letter code.
///
/// # Errors
/// Returns `Err(SettleError::InvalidGranularity)` for unknown codes or `H`.
pub fn offset_for_code<A, M>(as_of: &A, maturity: &M, product: &str) -> Result<i32, SettleError>
where
    A: CalendarDate + ?Sized,
    M: CalendarDate + ?Sized,
{
    offset(as_of, maturity, product.parse()?)
}

fn first_of_month(total_months: i32) -> Result<NaiveDate, SettleError> {
    let year = total_months.div_euclid(12);
    let month = u32::try_from(total_months.rem_euclid(12) + 1).unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| SettleError::InvalidArg(format!("year {year} out of range")))
}

/// Delivery start of the contract `n` periods after `as_of`.
///
/// Inverse of [`offset`]: `offset(as_of, maturity_for(as_of, p, n)?, p) == n`.
///
/// # Errors
/// Returns `Err(SettleError::InvalidGranularity)` for `H` and
/// `Err(SettleError::InvalidArg)` if the date overflows.
pub fn maturity_for<A>(as_of: &A, product: Product, n: i32) -> Result<NaiveDate, SettleError>
where
    A: CalendarDate + ?Sized,
{
    let a = as_of.calendar_date();
    let overflow = || SettleError::InvalidArg(format!("{n} periods from {a} out of range"));
    match product {
        Product::Year => NaiveDate::from_ymd_opt(a.year() + n, 1, 1).ok_or_else(overflow),
        Product::Quarter => {
            let q0 = (quarter_of(a.month()) - 1) + n;
            first_of_month(a.year() * 12 + q0 * 3)
        }
        Product::Month => first_of_month(a.year() * 12 + a.month0() as i32 + n),
        Product::Day => shift_days(a, i64::from(n)).ok_or_else(overflow),
        Product::Week => shift_days(monday_of(a), i64::from(n) * 7).ok_or_else(overflow),
        Product::Hour => Err(SettleError::invalid_granularity(product.as_str())),
    }
}

fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days >= 0 {
        date.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

const DELIVERY_MONTHS: [char; 12] = ['F', 'G', 'H', 'J', 'K', 'M', 'N', 'Q', 'U', 'V', 'X', 'Z'];

/// Standard futures delivery code of a maturity: month letter plus two-digit year.
///
/// `2025-12-03` becomes `"Z25"`.
#[must_use]
pub fn delivery_code<D: CalendarDate + ?Sized>(maturity: &D) -> String {
    let m = maturity.calendar_date();
    format!("{}{:02}", DELIVERY_MONTHS[m.month0() as usize], m.year().rem_euclid(100))
}
