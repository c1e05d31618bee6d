use std::collections::BTreeSet;

use chrono::NaiveDate;
use proptest::prelude::*;
use settle_core::{Cell, Column, ColumnKey, Panel, Product, diff_columns, merge, update_panel};

fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(u64::from(n))
}

fn key(offset: i32) -> ColumnKey {
    ColumnKey::new("Omip", "Power", "BL", "ES", Product::Month, offset, "close")
}

/// Sparse panel over days 0..30 and offsets 1..4.
fn arb_panel() -> impl Strategy<Value = Panel> {
    proptest::collection::vec((0u32..30, 1i32..4, proptest::option::of(0i32..100)), 0..60).prop_map(
        |cells| {
            let mut p = Panel::new();
            for (d, o, v) in cells {
                match v {
                    Some(v) => p.upsert(day(d), key(o), f64::from(v)).unwrap(),
                    // a null cell still creates the row and column
                    None => {
                        p.upsert(day(d), key(o), 0.0).unwrap();
                        let row = p.row_of(day(d)).unwrap();
                        let (index, mut cols) = p.into_parts();
                        cols.get_mut(&key(o)).unwrap().set(row, None).unwrap();
                        p = Panel::from_columns(index, cols).unwrap();
                    }
                }
            }
            p
        },
    )
}

proptest! {
    #[test]
    fn merge_never_overwrites_known_cells(old in arb_panel(), new in arb_panel()) {
        let merged = merge(&old, &new).unwrap();
        for (k, col) in old.columns() {
            for (row, date) in old.index().iter().enumerate() {
                if let Some(cell) = col.get(row) {
                    prop_assert_eq!(merged.get(*date, k), Some(cell));
                }
            }
        }
        // every new non-null cell survives where old had nothing
        for (k, col) in new.columns() {
            for (row, date) in new.index().iter().enumerate() {
                if let Some(cell) = col.get(row) && old.get(*date, k).is_none() {
                    prop_assert_eq!(merged.get(*date, k), Some(cell));
                }
            }
        }
        let expected: BTreeSet<NaiveDate> = old.index().iter().chain(new.index()).copied().collect();
        prop_assert_eq!(merged.index().to_vec(), expected.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn diff_reports_exactly_the_filled_columns(old in arb_panel(), new in arb_panel()) {
        let merged = merge(&old, &new).unwrap();
        let diff = diff_columns(&merged, &old);
        for k in merged.keys() {
            let introduced = !old.contains_key(k)
                || new.index().iter().any(|d| {
                    matches!(new.get(*d, k), Some(Cell::Value(v)) if v != 0.0)
                        && old.get(*d, k).is_none()
                });
            prop_assert_eq!(diff.contains(k), introduced, "column {}", k);
        }
    }
}

#[test]
fn merge_is_fill_only() {
    let mut old = Panel::new();
    old.upsert(day(0), key(1), 10.0).unwrap();
    old.upsert(day(1), key(1), 11.0).unwrap();
    let (index, mut cols) = old.into_parts();
    cols.get_mut(&key(1)).unwrap().set(1, None).unwrap();
    let old = Panel::from_columns(index, cols).unwrap();

    let mut new = Panel::new();
    new.upsert(day(0), key(1), 99.0).unwrap();
    new.upsert(day(1), key(1), 12.0).unwrap();
    new.upsert(day(2), key(2), 13.0).unwrap();

    let merged = merge(&old, &new).unwrap();
    assert_eq!(merged.get(day(0), &key(1)), Some(Cell::Value(10.0)));
    assert_eq!(merged.get(day(1), &key(1)), Some(Cell::Value(12.0)));
    assert_eq!(merged.get(day(2), &key(2)), Some(Cell::Value(13.0)));
    assert_eq!(merged.get(day(0), &key(2)), None);
    assert_eq!(merged.n_rows(), 3);

    let diff = diff_columns(&merged, &old);
    assert_eq!(diff, BTreeSet::from([key(1), key(2)]));
    assert!(diff_columns(&merged, &merged).is_empty());
}

#[test]
fn null_and_zero_compare_equal_in_diff() {
    let a = Panel::from_columns(vec![day(0)], [(key(1), Column::Values(vec![None]))]).unwrap();
    let b = Panel::from_columns(vec![day(0)], [(key(1), Column::Values(vec![Some(0.0)]))]).unwrap();
    assert!(diff_columns(&a, &b).is_empty());
}

#[test]
fn kind_mismatch_is_rejected() {
    let a = Panel::from_columns(vec![day(0)], [(key(1), Column::Values(vec![Some(1.0)]))]).unwrap();
    let b = Panel::from_columns(vec![day(0)], [(key(1), Column::Dates(vec![Some(day(3))]))]).unwrap();
    assert!(merge(&a, &b).is_err());
}

#[test]
fn update_without_existing_panel_takes_new() {
    let new = Panel::from_columns(vec![day(0)], [(key(1), Column::Values(vec![Some(1.0)]))]).unwrap();
    assert_eq!(update_panel(None, &new).unwrap(), new);
    assert_eq!(update_panel(Some(&Panel::new()), &new).unwrap(), new);
}
