use chrono::NaiveDate;
use settle_core::{roll, roll_cumulative, roll_detailed};

const N: f64 = f64::NAN;

fn s(values: &[f64]) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|v| if v.is_nan() { None } else { Some(*v) })
        .collect()
}

fn assert_close(actual: &[Option<f64>], expected: &[Option<f64>]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        match (a, e) {
            (Some(a), Some(e)) => assert!((a - e).abs() < 1e-9, "row {i}: {a} != {e}"),
            (None, None) => {}
            _ => panic!("row {i}: {a:?} != {e:?}"),
        }
    }
}

#[test]
fn equal_at_expiry() {
    let front = s(&[1., 2., N, N, 1., 2.]);
    let next = s(&[1., 2., 3., 4., 2., 3.]);
    let out = roll(&front, &next, &[3], 0).unwrap();
    assert_close(&out, &s(&[1., 2., 3., 4., 1., 2.]));
}

#[test]
fn gap_forces_late_roll() {
    let front = s(&[1., 2., N, N, N, 2.]);
    let next = s(&[1., 3., 3., 4., 2., 3.]);
    let out = roll(&front, &next, &[3], 0).unwrap();
    assert_close(&out, &s(&[1., 2., 2., 3., 1., 1.]));
}

#[test]
fn dual_expiration() {
    let front = s(&[1., 2., N, N, 1., 2., N, N, 1., 2.]);
    let next = s(&[1., 2., 3., 4., 2., 3., 4., 5., 6., 7.]);
    let out = roll(&front, &next, &[3, 7], 0).unwrap();
    assert_close(&out, &s(&[1., 2., 3., 4., 1., 2., 3., 4., 0., 1.]));
}

#[test]
fn missing_next_price_truncates_history() {
    let front = s(&[5., 6., 7., 8., 9., 10.]);
    let next = s(&[N, N, 8., 9., 10., 11.]);
    // Later expiry rolls normally, earlier one has no anchor.
    let r = roll_detailed(&front, &next, &[1, 4], 0).unwrap();
    assert_eq!(r.truncated_at, Some(1));
    assert_eq!(r.windows, vec![(4, 4)]);
    // roll value at 4 is 10 - 9 = 1
    assert_close(&r.values, &s(&[N, 6., 7., 8., 9., 9.]));
}

#[test]
fn roll_offset_moves_window_left() {
    let front = s(&[10., 11., 12., 13., 20., 21.]);
    let next = s(&[12., 13., 14., 15., 22., 23.]);
    let out = roll(&front, &next, &[3], 1).unwrap();
    // window [2, 3]: roll value 14 - 12 = 2
    assert_close(&out, &s(&[10., 11., 12., 13., 18., 19.]));
}

#[test]
fn trailing_nulls_force_a_roll() {
    let front = s(&[1., 2., 3., N, N]);
    let next = s(&[2., 3., 5., 6., 7.]);
    let r = roll_detailed(&front, &next, &[], 0).unwrap();
    // fake expiry at 4 falls in the null run [3, 4], widened to start at 2
    assert_eq!(r.windows, vec![(2, 4)]);
    assert_close(&r.values, &s(&[1., 2., 3., 4., 5.]));
}

#[test]
fn no_expirations_is_identity() {
    let front = s(&[1., 2., 3.]);
    let next = s(&[4., 5., 6.]);
    assert_close(&roll(&front, &next, &[], 0).unwrap(), &front);
    assert!(roll(&[], &[], &[], 0).unwrap().is_empty());
}

#[test]
fn rejects_misaligned_input() {
    let front = s(&[1., 2., 3.]);
    assert!(roll(&front, &s(&[1., 2.]), &[], 0).is_err());
    assert!(roll(&front, &front, &[3], 0).is_err());
}

#[test]
fn cumulative_adds_gap_on_maturity_change() {
    let d = |m| NaiveDate::from_ymd_opt(2024, m, 1);
    let front = s(&[10., 11., 20., 21.]);
    let next = s(&[19., 20., 30., 31.]);
    let maturity = vec![d(2), d(2), d(3), d(3)];
    let out = roll_cumulative(&front, &next, &maturity).unwrap();
    // row 2 rolls: 11 - 20 = -9
    assert_close(&out, &s(&[10., 11., 11., 12.]));
}

/// Keeps NaN as `Some(NaN)`, the way a float column read from a store may hold it.
fn raw(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().copied().map(Some).collect()
}

#[test]
fn nan_front_rolls_like_a_gap() {
    let front = raw(&[1., 2., N, N, 1., 2.]);
    let next = raw(&[1., 2., 3., 4., 2., 3.]);
    let r = roll_detailed(&front, &next, &[3], 0).unwrap();
    assert_eq!(r.windows, vec![(1, 3)]);
    assert_close(&r.values, &s(&[1., 2., 3., 4., 1., 2.]));
}

#[test]
fn nan_anchor_truncates_history() {
    let front = raw(&[5., 6., 7., 8., 9., 10.]);
    let next = raw(&[N, N, 8., 9., 10., 11.]);
    let r = roll_detailed(&front, &next, &[1, 4], 0).unwrap();
    assert_eq!(r.truncated_at, Some(1));
    assert_close(&r.values, &s(&[N, 6., 7., 8., 9., 9.]));
}

#[test]
fn cumulative_skips_nan_gaps() {
    let d = |m| NaiveDate::from_ymd_opt(2024, m, 1);
    let front = raw(&[10., 11., 20., 21.]);
    let next = raw(&[19., N, 30., 31.]);
    let maturity = vec![d(2), d(2), d(3), d(3)];
    let out = roll_cumulative(&front, &next, &maturity).unwrap();
    assert_close(&out, &s(&[10., 11., 20., 21.]));
}
