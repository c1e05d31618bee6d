use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::panel::{Column, Panel, timestamp_to_date};
use crate::timeseries::roll::{roll_cumulative, roll_detailed};
use crate::timeseries::util::{backward_fill, forward_fill, nan_as_null};
use crate::{ColumnKey, FamilyKey, GroupKey, Product, SettleError, ValueType};

/// How the continuous series of one offset is derived from two raw offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollMethod {
    /// Back-adjust at every expiration, preferring observed gaps as roll windows.
    #[default]
    BackAdjust,
    /// Accumulate roll gaps forward from the start of history.
    Cumulative,
}

/// Parameters of [`build_continuous_prices`].
///
/// Unset filters accept every group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuousOptions {
    /// Granularities to roll.
    pub valid_products: Option<BTreeSet<Product>>,
    /// Commodities to roll.
    pub valid_commodities: Option<BTreeSet<String>>,
    /// Areas to roll.
    pub valid_areas: Option<BTreeSet<String>>,
    /// Rows before expiry at which the roll happens.
    pub roll_offset: usize,
    /// Value type of the produced columns.
    pub continuous_type: ValueType,
    /// Roll method.
    pub method: RollMethod,
}

impl Default for ContinuousOptions {
    fn default() -> Self {
        Self {
            valid_products: None,
            valid_commodities: None,
            valid_areas: None,
            roll_offset: 0,
            continuous_type: ValueType::AdjClose,
            method: RollMethod::BackAdjust,
        }
    }
}

impl ContinuousOptions {
    /// Restrict to the given granularities.
    #[must_use]
    pub fn products<I: IntoIterator<Item = Product>>(mut self, products: I) -> Self {
        self.valid_products = Some(products.into_iter().collect());
        self
    }

    /// Restrict to the given commodities.
    #[must_use]
    pub fn commodities<I, S>(mut self, commodities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_commodities = Some(commodities.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to the given areas.
    #[must_use]
    pub fn areas<I, S>(mut self, areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_areas = Some(areas.into_iter().map(Into::into).collect());
        self
    }

    /// Roll this many rows before expiry.
    #[must_use]
    pub const fn roll_offset(mut self, rows: usize) -> Self {
        self.roll_offset = rows;
        self
    }

    /// Store results under this value type.
    #[must_use]
    pub fn continuous_type(mut self, value_type: impl Into<ValueType>) -> Self {
        self.continuous_type = value_type.into();
        self
    }

    /// Use this roll method.
    #[must_use]
    pub const fn method(mut self, method: RollMethod) -> Self {
        self.method = method;
        self
    }

    fn accepts(&self, group: &GroupKey) -> bool {
        self.valid_products
            .as_ref()
            .is_none_or(|s| s.contains(&group.product))
            && self
                .valid_commodities
                .as_ref()
                .is_none_or(|s| s.contains(&group.commodity))
            && self
                .valid_areas
                .as_ref()
                .is_none_or(|s| s.contains(&group.area))
    }
}

/// Compute the continuous series of every instrument family in `panel`.
///
/// - Columns with `offset > 0` are grouped by `(market, commodity, area, product)`;
///   groups excluded by the option filters are skipped.
/// - Each instrument family of a group is rolled on its own, over the rows
///   where at least one of its `close` cells is present.
/// - The highest offset with a `close` on the family's last such row bounds
///   the offsets rolled: offset `k` is rolled into `k + 1` for `k` in
///   `1..max_offset`.
/// - Results are stored under `(family, k, continuous_type)`, null on rows
///   outside the rolled range. Previous continuous columns of a rolled family
///   are replaced.
///
/// # Errors
/// Returns `Err(SettleError::InvalidArg)` if `continuous_type` is `close` or
/// `maturity`, and `Err(SettleError::InvalidPanel)` if a `close` column holds dates.
pub fn build_continuous_prices(
    panel: &Panel,
    options: &ContinuousOptions,
) -> Result<Panel, SettleError> {
    if matches!(options.continuous_type, ValueType::Close | ValueType::Maturity) {
        return Err(SettleError::InvalidArg(format!(
            "continuous type cannot be '{}'",
            options.continuous_type
        )));
    }
    let mut groups: BTreeMap<GroupKey, BTreeSet<FamilyKey>> = BTreeMap::new();
    for key in panel.keys().filter(|k| k.offset > 0) {
        groups.entry(key.group()).or_default().insert(key.family());
    }

    let mut out = panel.clone();
    for (group, families) in groups {
        if !options.accepts(&group) {
            #[cfg(feature = "tracing")]
            tracing::info!(group = %group, "skipping rolling of excluded group");
            continue;
        }
        #[cfg(feature = "tracing")]
        tracing::info!(group = %group, families = families.len(), "processing rolling");
        for family in &families {
            roll_family(panel, family, options, &mut out)?;
        }
    }
    Ok(out)
}

fn roll_family(
    panel: &Panel,
    family: &FamilyKey,
    options: &ContinuousOptions,
    out: &mut Panel,
) -> Result<(), SettleError> {
    let mut closes: BTreeMap<i32, &[Option<f64>]> = BTreeMap::new();
    for (key, column) in panel.columns() {
        if key.offset <= 0 || key.value_type != ValueType::Close || key.family() != *family {
            continue;
        }
        let values = column.values().ok_or_else(|| {
            SettleError::InvalidPanel(format!("close column {key} holds dates"))
        })?;
        closes.insert(key.offset, values);
    }

    let rows: Vec<usize> = (0..panel.n_rows())
        .filter(|&i| closes.values().any(|c| is_present(c[i])))
        .collect();
    let Some(&last) = rows.last() else {
        #[cfg(feature = "tracing")]
        tracing::info!(family = %family, "skipping rolling: no close data available");
        return Ok(());
    };
    let Some(max_offset) = closes
        .iter()
        .filter(|(_, c)| is_present(c[last]))
        .map(|(offset, _)| *offset)
        .max()
    else {
        return Ok(());
    };

    out.retain_columns(|k, _| !(k.value_type == options.continuous_type && k.family() == *family));

    for offset in 1..max_offset {
        let (Some(front), Some(next)) = (closes.get(&offset), closes.get(&(offset + 1))) else {
            continue;
        };
        let front = nan_as_null(&pick(front, &rows));
        let next = nan_as_null(&pick(next, &rows));
        let maturity_key = family.column(offset, ValueType::Maturity);
        let maturity = pick(&maturity_dates(panel.column(&maturity_key), panel.n_rows()), &rows);

        let values = match options.method {
            RollMethod::BackAdjust => {
                let rolled = roll_detailed(
                    &front,
                    &forward_fill(&next),
                    &expirations(&maturity),
                    options.roll_offset,
                )?;
                #[cfg(feature = "tracing")]
                if let Some(at) = rolled.truncated_at {
                    tracing::info!(
                        family = %family,
                        offset,
                        as_of = %panel.index()[rows[at]],
                        "no price to roll into, continuous series truncated"
                    );
                }
                rolled.values
            }
            RollMethod::Cumulative => roll_cumulative(&front, &next, &maturity)?,
        };

        let mut column = vec![None; panel.n_rows()];
        for (&row, value) in rows.iter().zip(values) {
            column[row] = value;
        }
        let key: ColumnKey = family.column(offset, options.continuous_type.clone());
        out.insert_column(key, Column::Values(column))?;
    }
    Ok(())
}

fn is_present(v: Option<f64>) -> bool {
    v.is_some_and(|x| !x.is_nan())
}

fn pick<T: Copy>(values: &[Option<T>], rows: &[usize]) -> Vec<Option<T>> {
    rows.iter().map(|&i| values[i]).collect()
}

fn maturity_dates(column: Option<&Column>, n: usize) -> Vec<Option<NaiveDate>> {
    match column {
        Some(Column::Dates(d)) => d.clone(),
        Some(Column::Values(v)) => v.iter().map(|x| x.and_then(timestamp_to_date)).collect(),
        None => vec![None; n],
    }
}

/// Rows where the back-filled maturity moves to a later contract.
fn expirations(maturity: &[Option<NaiveDate>]) -> Vec<usize> {
    let filled = backward_fill(maturity);
    filled
        .windows(2)
        .enumerate()
        .filter_map(|(i, w)| match (w[0], w[1]) {
            (Some(a), Some(b)) if b > a => Some(i + 1),
            _ => None,
        })
        .collect()
}
