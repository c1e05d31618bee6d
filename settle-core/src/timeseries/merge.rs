use core::fmt;
use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::SettleError;
use crate::panel::{Column, Panel};

/// Fill-only merge of `new` into `old`.
///
/// - Row index is the sorted union of both indexes; column set is the union.
/// - A non-null cell of `old` is never replaced; `new` only fills nulls and
///   brings new rows and columns.
///
/// # Errors
/// Returns `Err(SettleError::InvalidPanel)` if a column is numeric in one panel
/// and holds dates in the other.
pub fn merge<K>(old: &Panel<K>, new: &Panel<K>) -> Result<Panel<K>, SettleError>
where
    K: Ord + Clone + fmt::Debug,
{
    let mut index: Vec<NaiveDate> = old.index().iter().chain(new.index()).copied().collect();
    index.sort_unstable();
    index.dedup();
    let old_rows: Vec<Option<usize>> = index.iter().map(|d| old.row_of(*d)).collect();
    let new_rows: Vec<Option<usize>> = index.iter().map(|d| new.row_of(*d)).collect();

    let keys: BTreeSet<&K> = old.keys().chain(new.keys()).collect();
    let mut out = Panel::with_index(index)?;
    for key in keys {
        let column = match (old.column(key), new.column(key)) {
            (Some(o), Some(n)) => {
                if !o.same_kind(n) {
                    return Err(SettleError::InvalidPanel(format!(
                        "column {key:?} changes kind between panels"
                    )));
                }
                combine_first(o.gather(&old_rows), &n.gather(&new_rows))
            }
            (Some(o), None) => o.gather(&old_rows),
            (None, Some(n)) => n.gather(&new_rows),
            (None, None) => continue,
        };
        out.insert_column(key.clone(), column)?;
    }
    Ok(out)
}

fn combine_first(primary: Column, fallback: &Column) -> Column {
    match (primary, fallback) {
        (Column::Values(mut a), Column::Values(b)) => {
            for (x, y) in a.iter_mut().zip(b) {
                if x.is_none_or(f64::is_nan) {
                    *x = *y;
                }
            }
            Column::Values(a)
        }
        (Column::Dates(mut a), Column::Dates(b)) => {
            for (x, y) in a.iter_mut().zip(b) {
                if x.is_none() {
                    *x = *y;
                }
            }
            Column::Dates(a)
        }
        (a, _) => a,
    }
}

/// Merge `new` into an optional existing panel; without one, `new` is the result.
///
/// # Errors
/// Same as [`merge`].
pub fn update_panel<K>(existing: Option<&Panel<K>>, new: &Panel<K>) -> Result<Panel<K>, SettleError>
where
    K: Ord + Clone + fmt::Debug,
{
    match existing {
        Some(old) => merge(old, new),
        None => Ok(new.clone()),
    }
}

/// Columns of `panel` that must be persisted to bring `reference` up to date.
///
/// A column is changed if `reference` lacks it, if it holds a different kind of
/// cells, or if any cell differs over the union of both indexes. Numeric nulls
/// (and `NaN`) compare as 0; dates compare as optional values.
#[must_use]
pub fn diff_columns<K>(panel: &Panel<K>, reference: &Panel<K>) -> BTreeSet<K>
where
    K: Ord + Clone,
{
    let mut index: Vec<NaiveDate> = panel.index().iter().chain(reference.index()).copied().collect();
    index.sort_unstable();
    index.dedup();
    let rows: Vec<Option<usize>> = index.iter().map(|d| panel.row_of(*d)).collect();
    let ref_rows: Vec<Option<usize>> = index.iter().map(|d| reference.row_of(*d)).collect();

    panel
        .columns()
        .filter(|(key, column)| {
            let Some(before) = reference.column(key) else {
                return true;
            };
            match (column.gather(&rows), before.gather(&ref_rows)) {
                (Column::Values(a), Column::Values(b)) => {
                    a.iter().zip(&b).any(|(x, y)| as_zero(*x) != as_zero(*y))
                }
                (Column::Dates(a), Column::Dates(b)) => a != b,
                _ => true,
            }
        })
        .map(|(key, _)| key.clone())
        .collect()
}

fn as_zero(v: Option<f64>) -> f64 {
    v.filter(|x| !x.is_nan()).unwrap_or(0.0)
}
