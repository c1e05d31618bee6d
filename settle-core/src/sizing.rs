//! Contract sizes derived from a contract's delivery period.

use core::fmt;
use core::str::FromStr;

use chrono::Months;
use serde::{Deserialize, Serialize};

use crate::offsets::CalendarDate;
use crate::panel::{Column, Panel};
use crate::query::XsFilter;
use crate::{SettleError, ValueType};

/// Delivery period and unit a contract size is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Duration {
    /// Hours in the calendar year starting at maturity.
    HoursYear,
    /// Hours in the three months starting at maturity.
    HoursQuarter,
    /// Hours in the month starting at maturity.
    HoursMonth,
    /// Hours in a day.
    HoursDay,
    /// Days in the calendar year starting at maturity.
    DaysYear,
    /// Days in the three months starting at maturity.
    DaysQuarter,
    /// Days in the month starting at maturity.
    DaysMonth,
}

impl Duration {
    /// Two-letter code: unit (`H`, `D`) then period (`Y`, `Q`, `M`, `D`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HoursYear => "HY",
            Self::HoursQuarter => "HQ",
            Self::HoursMonth => "HM",
            Self::HoursDay => "HD",
            Self::DaysYear => "DY",
            Self::DaysQuarter => "DQ",
            Self::DaysMonth => "DM",
        }
    }

    const fn months(self) -> Option<u32> {
        match self {
            Self::HoursYear | Self::DaysYear => Some(12),
            Self::HoursQuarter | Self::DaysQuarter => Some(3),
            Self::HoursMonth | Self::DaysMonth => Some(1),
            Self::HoursDay => None,
        }
    }

    const fn in_hours(self) -> bool {
        matches!(
            self,
            Self::HoursYear | Self::HoursQuarter | Self::HoursMonth | Self::HoursDay
        )
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Duration {
    type Err = SettleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "HY" => Ok(Self::HoursYear),
            "HQ" => Ok(Self::HoursQuarter),
            "HM" => Ok(Self::HoursMonth),
            "HD" => Ok(Self::HoursDay),
            "DY" => Ok(Self::DaysYear),
            "DQ" => Ok(Self::DaysQuarter),
            "DM" => Ok(Self::DaysMonth),
            other => Err(SettleError::InvalidArg(format!("invalid duration: {other}"))),
        }
    }
}

impl TryFrom<String> for Duration {
    type Error = SettleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Duration> for String {
    fn from(d: Duration) -> Self {
        d.as_str().to_string()
    }
}

/// Size of the contract delivering from `maturity` over `duration`.
///
/// Days are calendar days to the same date one period later; hours are days
/// times 24, so daylight-saving changes are ignored.
///
/// # Errors
/// Returns `Err(SettleError::InvalidArg)` if the period end overflows the calendar.
pub fn contract_size<M>(maturity: &M, duration: Duration) -> Result<u32, SettleError>
where
    M: CalendarDate + ?Sized,
{
    let start = maturity.calendar_date();
    let days = match duration.months() {
        Some(months) => {
            let end = start.checked_add_months(Months::new(months)).ok_or_else(|| {
                SettleError::InvalidArg(format!("{duration} from {start} out of range"))
            })?;
            u32::try_from((end - start).num_days()).unwrap_or(u32::MAX)
        }
        None => 1,
    };
    Ok(if duration.in_hours() { days * 24 } else { days })
}

/// How [`add_sizes`] sizes a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    /// The same size for every contract (e.g. 1000 t for EUAs).
    Fixed(u32),
    /// Sized by its delivery period.
    Period(Duration),
}

impl From<Duration> for SizeSpec {
    fn from(d: Duration) -> Self {
        Self::Period(d)
    }
}

impl From<u32> for SizeSpec {
    fn from(n: u32) -> Self {
        Self::Fixed(n)
    }
}

/// Add a `size` column next to every maturity column matching `filter`.
///
/// The filter's value type is ignored. Rows without maturity get a null size.
/// Existing size columns are replaced. Returns the number of columns written.
///
/// # Errors
/// Propagates [`contract_size`] errors.
pub fn add_sizes(
    panel: &mut Panel,
    filter: &XsFilter,
    spec: impl Into<SizeSpec>,
) -> Result<usize, SettleError> {
    let spec = spec.into();
    let filter = XsFilter {
        value_type: None,
        ..filter.clone()
    };
    let mut sized = Vec::new();
    for (key, column) in panel.columns() {
        if !key.value_type.is_maturity() || !filter.matches(key) {
            continue;
        }
        let Some(dates) = column.dates() else {
            continue;
        };
        let sizes = dates
            .iter()
            .map(|d| {
                d.map(|m| match spec {
                    SizeSpec::Fixed(n) => Ok(f64::from(n)),
                    SizeSpec::Period(duration) => contract_size(&m, duration).map(f64::from),
                })
                .transpose()
            })
            .collect::<Result<Vec<_>, _>>()?;
        sized.push((key.with_type(ValueType::Other("size".into())), sizes));
    }
    let written = sized.len();
    for (key, sizes) in sized {
        panel.insert_column(key, Column::Values(sizes))?;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn period_lengths() {
        assert_eq!(contract_size(&d(2024, 2), Duration::DaysMonth).unwrap(), 29);
        assert_eq!(contract_size(&d(2024, 2), Duration::HoursMonth).unwrap(), 696);
        assert_eq!(contract_size(&d(2024, 1), Duration::DaysQuarter).unwrap(), 91);
        assert_eq!(contract_size(&d(2025, 1), Duration::HoursQuarter).unwrap(), 2160);
        assert_eq!(contract_size(&d(2024, 1), Duration::DaysYear).unwrap(), 366);
        assert_eq!(contract_size(&d(2025, 1), Duration::HoursYear).unwrap(), 8760);
        assert_eq!(contract_size(&d(2025, 3), Duration::HoursDay).unwrap(), 24);
    }

    #[test]
    fn codes() {
        for code in ["HY", "HQ", "HM", "HD", "DY", "DQ", "DM"] {
            assert_eq!(code.parse::<Duration>().unwrap().as_str(), code);
        }
        assert!("XY".parse::<Duration>().is_err());
        let spec: SizeSpec = serde_json::from_str(r#""HM""#).unwrap();
        assert_eq!(spec, SizeSpec::Period(Duration::HoursMonth));
        let spec: SizeSpec = serde_json::from_str("1000").unwrap();
        assert_eq!(spec, SizeSpec::Fixed(1000));
    }
}
