use std::collections::BTreeSet;
use std::collections::btree_map::{BTreeMap, Entry};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::panel::{Column, Panel, timestamp_to_date};
use crate::timeseries::merge::merge;
use crate::{ColumnKey, ContractKey, Dimension, Product, SettleError, ValueType};

/// Exact or inclusion match on one key dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selector<T: Ord> {
    /// Exactly this value. Fails the query if the panel has no such value.
    One(T),
    /// Any of these values. Values absent from the panel are ignored.
    AnyOf(BTreeSet<T>),
}

impl<T: Ord> Selector<T> {
    /// Inclusion match over the given values.
    pub fn any_of<I: IntoIterator<Item = T>>(values: I) -> Self {
        Self::AnyOf(values.into_iter().collect())
    }

    /// True if `value` is selected.
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Self::One(v) => v == value,
            Self::AnyOf(set) => set.contains(value),
        }
    }
}

impl From<&str> for Selector<String> {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for Selector<String> {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<&str>> for Selector<String> {
    fn from(values: Vec<&str>) -> Self {
        Self::any_of(values.into_iter().map(str::to_string))
    }
}

impl From<Vec<String>> for Selector<String> {
    fn from(values: Vec<String>) -> Self {
        Self::any_of(values)
    }
}

impl From<i32> for Selector<i32> {
    fn from(value: i32) -> Self {
        Self::One(value)
    }
}

impl From<Vec<i32>> for Selector<i32> {
    fn from(values: Vec<i32>) -> Self {
        Self::any_of(values)
    }
}

impl From<Product> for Selector<Product> {
    fn from(value: Product) -> Self {
        Self::One(value)
    }
}

impl From<Vec<Product>> for Selector<Product> {
    fn from(values: Vec<Product>) -> Self {
        Self::any_of(values)
    }
}

impl From<ValueType> for Selector<ValueType> {
    fn from(value: ValueType) -> Self {
        Self::One(value)
    }
}

impl From<&str> for Selector<ValueType> {
    fn from(value: &str) -> Self {
        Self::One(ValueType::from(value))
    }
}

impl From<Vec<ValueType>> for Selector<ValueType> {
    fn from(values: Vec<ValueType>) -> Self {
        Self::any_of(values)
    }
}

impl<T: Ord> From<BTreeSet<T>> for Selector<T> {
    fn from(values: BTreeSet<T>) -> Self {
        Self::AnyOf(values)
    }
}

/// Filters of a cross-section query. Unset dimensions select everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XsFilter {
    /// Data-source name.
    pub market: Option<Selector<String>>,
    /// Commodity.
    pub commodity: Option<Selector<String>>,
    /// Contract family.
    pub instrument: Option<Selector<String>>,
    /// Geography or currency scope.
    pub area: Option<Selector<String>>,
    /// Calendar granularity.
    pub product: Option<Selector<Product>>,
    /// Offset. Cannot be combined with `maturity`.
    pub offset: Option<Selector<i32>>,
    /// Value type. `maturity` columns are only returned when selected here.
    #[serde(rename = "type")]
    pub value_type: Option<Selector<ValueType>>,
    /// Select cells whose contract matures on this date, summed across offsets.
    pub maturity: Option<NaiveDate>,
    /// Keep exact zeros; when false they become nulls.
    pub allow_zero_prices: bool,
}

impl Default for XsFilter {
    fn default() -> Self {
        Self {
            market: None,
            commodity: None,
            instrument: None,
            area: None,
            product: None,
            offset: None,
            value_type: None,
            maturity: None,
            allow_zero_prices: true,
        }
    }
}

impl XsFilter {
    /// Filter on market.
    #[must_use]
    pub fn market(mut self, s: impl Into<Selector<String>>) -> Self {
        self.market = Some(s.into());
        self
    }

    /// Filter on commodity.
    #[must_use]
    pub fn commodity(mut self, s: impl Into<Selector<String>>) -> Self {
        self.commodity = Some(s.into());
        self
    }

    /// Filter on instrument.
    #[must_use]
    pub fn instrument(mut self, s: impl Into<Selector<String>>) -> Self {
        self.instrument = Some(s.into());
        self
    }

    /// Filter on area.
    #[must_use]
    pub fn area(mut self, s: impl Into<Selector<String>>) -> Self {
        self.area = Some(s.into());
        self
    }

    /// Filter on product.
    #[must_use]
    pub fn product(mut self, s: impl Into<Selector<Product>>) -> Self {
        self.product = Some(s.into());
        self
    }

    /// Filter on offset.
    #[must_use]
    pub fn offset(mut self, s: impl Into<Selector<i32>>) -> Self {
        self.offset = Some(s.into());
        self
    }

    /// Filter on value type.
    #[must_use]
    pub fn value_type(mut self, s: impl Into<Selector<ValueType>>) -> Self {
        self.value_type = Some(s.into());
        self
    }

    /// Select by contract maturity instead of offset.
    #[must_use]
    pub const fn maturity(mut self, date: NaiveDate) -> Self {
        self.maturity = Some(date);
        self
    }

    /// Keep or null exact zeros.
    #[must_use]
    pub const fn allow_zero_prices(mut self, allow: bool) -> Self {
        self.allow_zero_prices = allow;
        self
    }

    /// True if `key` passes every dimension filter.
    #[must_use]
    pub fn matches(&self, key: &ColumnKey) -> bool {
        fn ok<T: Ord>(s: Option<&Selector<T>>, v: &T) -> bool {
            s.is_none_or(|s| s.matches(v))
        }
        ok(self.market.as_ref(), &key.market)
            && ok(self.commodity.as_ref(), &key.commodity)
            && ok(self.instrument.as_ref(), &key.instrument)
            && ok(self.area.as_ref(), &key.area)
            && ok(self.product.as_ref(), &key.product)
            && ok(self.offset.as_ref(), &key.offset)
            && ok(self.value_type.as_ref(), &key.value_type)
    }

    fn scalar_labels(&self) -> Vec<(Dimension, String)> {
        let mut out = Vec::new();
        if let Some(Selector::One(v)) = &self.market {
            out.push((Dimension::Market, v.clone()));
        }
        if let Some(Selector::One(v)) = &self.commodity {
            out.push((Dimension::Commodity, v.clone()));
        }
        if let Some(Selector::One(v)) = &self.instrument {
            out.push((Dimension::Instrument, v.clone()));
        }
        if let Some(Selector::One(v)) = &self.area {
            out.push((Dimension::Area, v.clone()));
        }
        if let Some(Selector::One(v)) = &self.product {
            out.push((Dimension::Product, v.to_string()));
        }
        if let Some(Selector::One(v)) = &self.offset {
            out.push((Dimension::Offset, v.to_string()));
        }
        if let Some(Selector::One(v)) = &self.value_type {
            out.push((Dimension::Type, v.to_string()));
        }
        out
    }
}

/// Result of [`settle_xs`].
#[derive(Debug, Clone, PartialEq)]
pub enum CrossSection {
    /// Columns keyed by full key (no maturity filter).
    Offsets(Panel),
    /// Columns keyed without offset (maturity filter).
    Maturity(Panel<ContractKey>),
}

impl CrossSection {
    /// The panel of an offset query.
    #[must_use]
    pub const fn offsets(&self) -> Option<&Panel> {
        match self {
            Self::Offsets(p) => Some(p),
            Self::Maturity(_) => None,
        }
    }

    /// The panel of a maturity query.
    #[must_use]
    pub const fn maturity(&self) -> Option<&Panel<ContractKey>> {
        match self {
            Self::Maturity(p) => Some(p),
            Self::Offsets(_) => None,
        }
    }

    /// Take the panel of an offset query.
    #[must_use]
    pub fn into_offsets(self) -> Option<Panel> {
        match self {
            Self::Offsets(p) => Some(p),
            Self::Maturity(_) => None,
        }
    }

    /// Take the panel of a maturity query.
    #[must_use]
    pub fn into_maturity(self) -> Option<Panel<ContractKey>> {
        match self {
            Self::Maturity(p) => Some(p),
            Self::Offsets(_) => None,
        }
    }

    /// Number of result columns.
    #[must_use]
    pub fn n_columns(&self) -> usize {
        match self {
            Self::Offsets(p) => p.n_columns(),
            Self::Maturity(p) => p.n_columns(),
        }
    }

    /// True if the result has no rows or no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Offsets(p) => p.is_empty(),
            Self::Maturity(p) => p.is_empty(),
        }
    }

    /// Outer-join two results of the same query over different panels.
    ///
    /// # Errors
    /// Returns `Err(SettleError::InvalidArg)` when one result is keyed by offset
    /// and the other by maturity.
    pub fn combine(self, other: Self) -> Result<Self, SettleError> {
        match (self, other) {
            (Self::Offsets(a), Self::Offsets(b)) => merge(&a, &b).map(Self::Offsets),
            (Self::Maturity(a), Self::Maturity(b)) => merge(&a, &b).map(Self::Maturity),
            _ => Err(SettleError::InvalidArg(
                "cannot combine offset and maturity cross-sections".into(),
            )),
        }
    }
}

/// Select a cross-section of `panel`.
///
/// - Each set dimension filter keeps the matching columns.
/// - Without a maturity filter, `maturity` columns are dropped unless the type
///   filter selects them.
/// - With a maturity filter, each cell is kept only on rows where the maturity
///   of its own key equals the date; all-null columns are dropped and the
///   remaining ones are summed across offsets (nulls ignored).
/// - `allow_zero_prices == false` turns exact zeros into nulls.
///
/// # Errors
/// - `ConflictingFilter` if both `offset` and `maturity` are set.
/// - `FilterKeyNotFound` if a scalar filter names a value the panel does not
///   have; the error lists the values available for that dimension.
pub fn settle_xs(panel: &Panel, filter: &XsFilter) -> Result<CrossSection, SettleError> {
    if filter.offset.is_some() && filter.maturity.is_some() {
        return Err(SettleError::conflicting_filter("offset", "maturity"));
    }
    for (dim, label) in filter.scalar_labels() {
        if !panel.keys().any(|k| k.label(dim) == label) {
            let found_in = Dimension::ALL
                .iter()
                .filter(|d| **d != dim && panel.keys().any(|k| k.label(**d) == label))
                .map(|d| d.as_str().to_string())
                .collect();
            return Err(SettleError::filter_key_not_found(
                dim.as_str(),
                label,
                panel.dimension_values(dim).into_iter().collect(),
                found_in,
            ));
        }
    }

    match filter.maturity {
        None => {
            let with_maturity = filter
                .value_type
                .as_ref()
                .is_some_and(|s| s.matches(&ValueType::Maturity));
            let out = panel.select_columns(|k| {
                filter.matches(k) && (with_maturity || !k.value_type.is_maturity())
            });
            let out = if filter.allow_zero_prices { out } else { null_zeros(out)? };
            Ok(CrossSection::Offsets(out))
        }
        Some(date) => {
            let out = by_maturity(panel, filter, date)?;
            let out = if filter.allow_zero_prices { out } else { null_zeros(out)? };
            Ok(CrossSection::Maturity(out))
        }
    }
}

fn by_maturity(
    panel: &Panel,
    filter: &XsFilter,
    date: NaiveDate,
) -> Result<Panel<ContractKey>, SettleError> {
    let mut grouped: BTreeMap<ContractKey, Column> = BTreeMap::new();
    for (key, column) in panel.columns() {
        if !filter.matches(key) {
            continue;
        }
        let Some(maturity) = panel.column(&key.with_type(ValueType::Maturity)) else {
            continue;
        };
        let on_date: Vec<bool> = (0..panel.n_rows())
            .map(|i| match maturity {
                Column::Dates(d) => d[i] == Some(date),
                Column::Values(v) => v[i].and_then(timestamp_to_date) == Some(date),
            })
            .collect();
        let masked = mask(column, &on_date);
        if masked.is_all_null() {
            continue;
        }
        match grouped.entry(key.contract()) {
            Entry::Vacant(slot) => {
                slot.insert(masked);
            }
            Entry::Occupied(mut slot) => {
                let summed = add_columns(slot.get(), &masked);
                slot.insert(summed);
            }
        }
    }
    Panel::from_columns(panel.index().to_vec(), grouped)
}

fn mask(column: &Column, keep: &[bool]) -> Column {
    match column {
        Column::Values(v) => Column::Values(
            v.iter()
                .zip(keep)
                .map(|(x, k)| if *k { x.filter(|x| !x.is_nan()) } else { None })
                .collect(),
        ),
        Column::Dates(v) => {
            Column::Dates(v.iter().zip(keep).map(|(x, k)| if *k { *x } else { None }).collect())
        }
    }
}

fn add_columns(a: &Column, b: &Column) -> Column {
    match (a, b) {
        (Column::Values(a), Column::Values(b)) => Column::Values(
            a.iter()
                .zip(b)
                .map(|(x, y)| match (x, y) {
                    (Some(x), Some(y)) => Some(x + y),
                    (Some(v), None) | (None, Some(v)) => Some(*v),
                    (None, None) => None,
                })
                .collect(),
        ),
        (Column::Dates(a), Column::Dates(b)) => {
            Column::Dates(a.iter().zip(b).map(|(x, y)| x.or(*y)).collect())
        }
        (a, _) => a.clone(),
    }
}

fn null_zeros<K: Ord + Clone>(panel: Panel<K>) -> Result<Panel<K>, SettleError> {
    let (index, columns) = panel.into_parts();
    let columns = columns.into_iter().map(|(k, c)| {
        let c = match c {
            Column::Values(v) => {
                Column::Values(v.into_iter().map(|x| x.filter(|x| *x != 0.0)).collect())
            }
            dates @ Column::Dates(_) => dates,
        };
        (k, c)
    });
    Panel::from_columns(index, columns)
}
