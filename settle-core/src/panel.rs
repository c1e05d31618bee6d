//! The settlement panel: a date-indexed table of columns keyed by [`ColumnKey`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{ColumnKey, Dimension, FamilyKey, SettleError, ValueType};

/// A single non-null cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    /// A numeric value (price, timestamp, volume...).
    Value(f64),
    /// A calendar date (maturity).
    Date(NaiveDate),
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Self::Value(v)
    }
}

impl From<NaiveDate> for Cell {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

/// One column of the panel. `None` is an explicit null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    /// Numeric cells.
    Values(Vec<Option<f64>>),
    /// Date cells, used for maturities while in memory.
    Dates(Vec<Option<NaiveDate>>),
}

impl Column {
    /// Numeric column from raw floats, mapping `NaN` to null.
    #[must_use]
    pub fn from_f64(values: &[f64]) -> Self {
        Self::Values(
            values
                .iter()
                .map(|v| if v.is_nan() { None } else { Some(*v) })
                .collect(),
        )
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Values(v) => v.len(),
            Self::Dates(v) => v.len(),
        }
    }

    /// True if the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell at `row`, `None` if null or out of range.
    #[must_use]
    pub fn get(&self, row: usize) -> Option<Cell> {
        match self {
            Self::Values(v) => v
                .get(row)
                .copied()
                .flatten()
                .filter(|x| !x.is_nan())
                .map(Cell::Value),
            Self::Dates(v) => v.get(row).copied().flatten().map(Cell::Date),
        }
    }

    /// True if the cell at `row` is null.
    #[must_use]
    pub fn is_null(&self, row: usize) -> bool {
        self.get(row).is_none()
    }

    /// True if every cell is null (or the column is empty).
    #[must_use]
    pub fn is_all_null(&self) -> bool {
        (0..self.len()).all(|i| self.is_null(i))
    }

    /// Numeric cells, if this is a numeric column.
    #[must_use]
    pub fn values(&self) -> Option<&[Option<f64>]> {
        match self {
            Self::Values(v) => Some(v),
            Self::Dates(_) => None,
        }
    }

    /// Date cells, if this is a date column.
    #[must_use]
    pub fn dates(&self) -> Option<&[Option<NaiveDate>]> {
        match self {
            Self::Dates(v) => Some(v),
            Self::Values(_) => None,
        }
    }

    /// True if both columns hold the same kind of cells.
    #[must_use]
    pub const fn same_kind(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Values(_), Self::Values(_)) | (Self::Dates(_), Self::Dates(_))
        )
    }

    const fn kind_name(&self) -> &'static str {
        match self {
            Self::Values(_) => "numeric",
            Self::Dates(_) => "date",
        }
    }

    /// An all-null column of the same kind.
    #[must_use]
    pub fn nulls_like(&self, len: usize) -> Self {
        match self {
            Self::Values(_) => Self::Values(vec![None; len]),
            Self::Dates(_) => Self::Dates(vec![None; len]),
        }
    }

    fn nulls_for(cell: Cell, len: usize) -> Self {
        match cell {
            Cell::Value(_) => Self::Values(vec![None; len]),
            Cell::Date(_) => Self::Dates(vec![None; len]),
        }
    }

    /// Overwrite the cell at `row`.
    ///
    /// # Errors
    /// Returns `Err(SettleError::InvalidPanel)` if the row is out of range or the
    /// cell kind does not match the column kind.
    pub fn set(&mut self, row: usize, cell: Option<Cell>) -> Result<(), SettleError> {
        let len = self.len();
        if row >= len {
            return Err(SettleError::InvalidPanel(format!(
                "row {row} out of range for column of length {len}"
            )));
        }
        match (self, cell) {
            (Self::Values(v), None) => v[row] = None,
            (Self::Dates(v), None) => v[row] = None,
            (Self::Values(v), Some(Cell::Value(x))) => {
                v[row] = if x.is_nan() { None } else { Some(x) };
            }
            (Self::Dates(v), Some(Cell::Date(d))) => v[row] = Some(d),
            (col, Some(_)) => {
                return Err(SettleError::InvalidPanel(format!(
                    "cell kind does not match {} column",
                    col.kind_name()
                )));
            }
        }
        Ok(())
    }

    /// Insert a null at `row`, shifting later cells down.
    fn insert_null(&mut self, row: usize) {
        match self {
            Self::Values(v) => v.insert(row, None),
            Self::Dates(v) => v.insert(row, None),
        }
    }

    /// Rows at the given positions, in order.
    #[must_use]
    pub fn take(&self, rows: &[usize]) -> Self {
        match self {
            Self::Values(v) => Self::Values(rows.iter().map(|&i| v.get(i).copied().flatten()).collect()),
            Self::Dates(v) => Self::Dates(rows.iter().map(|&i| v.get(i).copied().flatten()).collect()),
        }
    }

    /// Column gathered from optional source rows; `None` positions are null.
    #[must_use]
    pub fn gather(&self, rows: &[Option<usize>]) -> Self {
        match self {
            Self::Values(v) => Self::Values(
                rows.iter()
                    .map(|r| r.and_then(|i| v.get(i).copied().flatten()))
                    .collect(),
            ),
            Self::Dates(v) => Self::Dates(
                rows.iter()
                    .map(|r| r.and_then(|i| v.get(i).copied().flatten()))
                    .collect(),
            ),
        }
    }
}

/// A 2-D table: rows indexed by as-of date, columns keyed by `K`.
///
/// Invariants:
/// - the index is strictly ascending (no duplicate dates);
/// - every column has exactly one cell per index entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel<K: Ord = ColumnKey> {
    index: Vec<NaiveDate>,
    columns: BTreeMap<K, Column>,
}

impl<K: Ord + Clone> Default for Panel<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone> Panel<K> {
    /// An empty panel.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            index: Vec::new(),
            columns: BTreeMap::new(),
        }
    }

    /// A panel with the given rows and no columns.
    ///
    /// # Errors
    /// Returns `Err(SettleError::InvalidPanel)` if the index is not strictly ascending.
    pub fn with_index(index: Vec<NaiveDate>) -> Result<Self, SettleError> {
        if let Some(w) = index.windows(2).find(|w| w[0] >= w[1]) {
            return Err(SettleError::InvalidPanel(format!(
                "index must be strictly ascending: {} then {}",
                w[0], w[1]
            )));
        }
        Ok(Self {
            index,
            columns: BTreeMap::new(),
        })
    }

    /// Build a panel from an index and columns.
    ///
    /// # Errors
    /// Returns `Err(SettleError::InvalidPanel)` if the index is not strictly
    /// ascending or a column length differs from the index length.
    pub fn from_columns<I>(index: Vec<NaiveDate>, columns: I) -> Result<Self, SettleError>
    where
        I: IntoIterator<Item = (K, Column)>,
    {
        let mut panel = Self::with_index(index)?;
        for (k, c) in columns {
            panel.insert_column(k, c)?;
        }
        Ok(panel)
    }

    /// Row dates, ascending.
    #[must_use]
    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    /// Number of columns.
    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// True if the panel has no rows or no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    /// Column keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.columns.keys()
    }

    /// `(key, column)` pairs, sorted by key.
    pub fn columns(&self) -> impl Iterator<Item = (&K, &Column)> {
        self.columns.iter()
    }

    /// Column for `key`.
    #[must_use]
    pub fn column(&self, key: &K) -> Option<&Column> {
        self.columns.get(key)
    }

    /// True if a column exists for `key`.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.columns.contains_key(key)
    }

    /// Position of `date` in the index.
    #[must_use]
    pub fn row_of(&self, date: NaiveDate) -> Option<usize> {
        self.index.binary_search(&date).ok()
    }

    /// True if `date` is a row of the panel.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.row_of(date).is_some()
    }

    /// Last row date.
    #[must_use]
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.index.last().copied()
    }

    /// Cell at `(date, key)`, `None` if null or absent.
    #[must_use]
    pub fn get(&self, date: NaiveDate, key: &K) -> Option<Cell> {
        let row = self.row_of(date)?;
        self.columns.get(key)?.get(row)
    }

    /// Insert or replace a whole column, returning the previous one.
    ///
    /// # Errors
    /// Returns `Err(SettleError::InvalidPanel)` if the column length differs
    /// from the number of rows.
    pub fn insert_column(&mut self, key: K, column: Column) -> Result<Option<Column>, SettleError> {
        if column.len() != self.index.len() {
            return Err(SettleError::InvalidPanel(format!(
                "column has {} rows, panel has {}",
                column.len(),
                self.index.len()
            )));
        }
        Ok(self.columns.insert(key, column))
    }

    /// Remove a column.
    pub fn remove_column(&mut self, key: &K) -> Option<Column> {
        self.columns.remove(key)
    }

    /// Set one cell, creating the row and the column when needed.
    ///
    /// New rows are null in every other column; new columns are null on every
    /// other row and take their kind from `cell`.
    ///
    /// # Errors
    /// Returns `Err(SettleError::InvalidPanel)` if `cell` does not match the
    /// kind of an existing column.
    pub fn upsert(&mut self, date: NaiveDate, key: K, cell: impl Into<Cell>) -> Result<(), SettleError> {
        let cell = cell.into();
        let row = match self.index.binary_search(&date) {
            Ok(row) => row,
            Err(pos) => {
                self.index.insert(pos, date);
                for col in self.columns.values_mut() {
                    col.insert_null(pos);
                }
                pos
            }
        };
        let len = self.index.len();
        self.columns
            .entry(key)
            .or_insert_with(|| Column::nulls_for(cell, len))
            .set(row, Some(cell))
    }

    /// Keep only the columns for which `keep` returns true.
    pub fn retain_columns<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &Column) -> bool,
    {
        self.columns.retain(|k, c| keep(k, c));
    }

    /// New panel with the same rows and the selected columns.
    #[must_use]
    pub fn select_columns<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&K) -> bool,
    {
        Self {
            index: self.index.clone(),
            columns: self
                .columns
                .iter()
                .filter(|(k, _)| keep(k))
                .map(|(k, c)| (k.clone(), c.clone()))
                .collect(),
        }
    }

    /// New panel with the rows at the given ascending positions.
    #[must_use]
    pub fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            index: rows.iter().filter_map(|&i| self.index.get(i).copied()).collect(),
            columns: self
                .columns
                .iter()
                .map(|(k, c)| (k.clone(), c.take(rows)))
                .collect(),
        }
    }

    /// New panel with the rows whose date falls in `[start, end]` (bounds optional).
    #[must_use]
    pub fn slice(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let rows: Vec<usize> = self
            .index
            .iter()
            .enumerate()
            .filter(|(_, d)| start.is_none_or(|s| **d >= s) && end.is_none_or(|e| **d <= e))
            .map(|(i, _)| i)
            .collect();
        self.take_rows(&rows)
    }

    /// Null every cell on rows within `[start, end]`. Returns the number of rows touched.
    pub fn clear_range(&mut self, start: NaiveDate, end: NaiveDate) -> usize {
        let rows: Vec<usize> = self
            .index
            .iter()
            .enumerate()
            .filter(|(_, d)| **d >= start && **d <= end)
            .map(|(i, _)| i)
            .collect();
        for col in self.columns.values_mut() {
            for &r in &rows {
                let _ = col.set(r, None);
            }
        }
        rows.len()
    }

    /// Realign every column on `index`; dates missing from this panel become null rows.
    ///
    /// # Errors
    /// Returns `Err(SettleError::InvalidPanel)` if `index` is not strictly ascending.
    pub fn reindex(&self, index: Vec<NaiveDate>) -> Result<Self, SettleError> {
        let positions: Vec<Option<usize>> = index.iter().map(|d| self.row_of(*d)).collect();
        let mut out = Self::with_index(index)?;
        for (k, c) in &self.columns {
            out.columns.insert(k.clone(), c.gather(&positions));
        }
        Ok(out)
    }

    /// Decompose into index and columns.
    #[must_use]
    pub fn into_parts(self) -> (Vec<NaiveDate>, BTreeMap<K, Column>) {
        (self.index, self.columns)
    }
}

/// One row of the long (stacked) representation of a panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedRow {
    /// As-of date.
    pub as_of: NaiveDate,
    /// Instrument family.
    pub family: FamilyKey,
    /// Offset of the contract.
    pub offset: i32,
    /// Maturity of the contract on that date.
    pub maturity: NaiveDate,
    /// Non-null values by type (close, adj_close...).
    pub values: BTreeMap<ValueType, f64>,
}

fn date_to_timestamp(d: NaiveDate) -> f64 {
    d.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default() as f64
}

pub(crate) fn timestamp_to_date(ts: f64) -> Option<NaiveDate> {
    if ts.is_nan() || ts <= 0.0 {
        return None;
    }
    DateTime::from_timestamp(ts as i64, 0).map(|dt| dt.date_naive())
}

impl Panel<ColumnKey> {
    /// New panel without the columns of `value_type`.
    #[must_use]
    pub fn drop_type(&self, value_type: &ValueType) -> Self {
        self.select_columns(|k| &k.value_type != value_type)
    }

    /// Distinct values of one dimension across all columns, sorted.
    #[must_use]
    pub fn dimension_values(&self, dim: Dimension) -> BTreeSet<String> {
        self.keys().map(|k| k.label(dim)).collect()
    }

    /// Maturity columns converted to UNIX seconds, the form persisted by stores.
    #[must_use]
    pub fn maturity_to_timestamps(&self) -> Self {
        let mut out = self.clone();
        for (k, col) in &mut out.columns {
            if !k.value_type.is_maturity() {
                continue;
            }
            if let Column::Dates(dates) = col {
                *col = Column::Values(dates.iter().map(|d| d.map(date_to_timestamp)).collect());
            }
        }
        out
    }

    /// Maturity columns converted from UNIX seconds back to dates.
    ///
    /// Null and non-positive timestamps become null.
    #[must_use]
    pub fn maturity_to_dates(&self) -> Self {
        let mut out = self.clone();
        for (k, col) in &mut out.columns {
            if !k.value_type.is_maturity() {
                continue;
            }
            if let Column::Values(values) = col {
                *col = Column::Dates(
                    values
                        .iter()
                        .map(|v| v.and_then(timestamp_to_date))
                        .collect(),
                );
            }
        }
        out
    }

    /// Long representation: one record per `(as_of, family, offset)` that has a maturity.
    #[must_use]
    pub fn stack(&self) -> Vec<StackedRow> {
        let mut out = Vec::new();
        let maturities: Vec<(&ColumnKey, &Column)> = self
            .columns
            .iter()
            .filter(|(k, _)| k.value_type.is_maturity())
            .collect();
        for (row, as_of) in self.index.iter().enumerate() {
            for (mkey, mcol) in &maturities {
                let Some(Cell::Date(maturity)) = mcol.get(row) else {
                    continue;
                };
                let family = mkey.family();
                let values: BTreeMap<ValueType, f64> = self
                    .columns
                    .range(family.column(mkey.offset, ValueType::Close)..)
                    .take_while(|(k, _)| k.family() == family && k.offset == mkey.offset)
                    .filter(|(k, _)| !k.value_type.is_maturity())
                    .filter_map(|(k, c)| match c.get(row) {
                        Some(Cell::Value(v)) => Some((k.value_type.clone(), v)),
                        _ => None,
                    })
                    .collect();
                out.push(StackedRow {
                    as_of: *as_of,
                    family,
                    offset: mkey.offset,
                    maturity,
                    values,
                });
            }
        }
        out
    }
}
