use chrono::{NaiveDate, TimeZone};
use proptest::prelude::*;
use settle_core::{
    Product, SettleError, delivery_code, maturity_for, monday_of, offset, offset_for_code,
};

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..40_000).prop_map(|d| ymd(1990, 1, 1) + chrono::Days::new(d as u64))
}

fn arb_product() -> impl Strategy<Value = Product> {
    prop_oneof![
        Just(Product::Year),
        Just(Product::Quarter),
        Just(Product::Month),
        Just(Product::Week),
        Just(Product::Day),
    ]
}

proptest! {
    #[test]
    fn maturity_for_inverts_offset(as_of in arb_date(), product in arb_product(), n in -60i32..60) {
        let maturity = maturity_for(&as_of, product, n).unwrap();
        prop_assert_eq!(offset(&as_of, &maturity, product).unwrap(), n);
    }

    #[test]
    fn week_offset_counts_from_monday(as_of in arb_date(), days in 0u64..400) {
        let maturity = as_of + chrono::Days::new(days);
        let expected = (maturity - monday_of(as_of)).num_days().div_euclid(7);
        prop_assert_eq!(i64::from(offset(&as_of, &maturity, Product::Week).unwrap()), expected);
    }
}

#[test]
fn calendar_conventions() {
    let as_of = ymd(2024, 11, 15);
    assert_eq!(offset(&as_of, &ymd(2025, 1, 1), Product::Year).unwrap(), 1);
    assert_eq!(offset(&as_of, &ymd(2025, 1, 1), Product::Quarter).unwrap(), 1);
    assert_eq!(offset(&as_of, &ymd(2025, 1, 1), Product::Month).unwrap(), 2);
    assert_eq!(offset(&as_of, &ymd(2024, 11, 16), Product::Day).unwrap(), 1);
    // Friday 2024-11-15; Monday of that week is the 11th
    assert_eq!(offset(&as_of, &ymd(2024, 11, 18), Product::Week).unwrap(), 1);
    assert_eq!(offset(&as_of, &ymd(2024, 11, 11), Product::Week).unwrap(), 0);
}

#[test]
fn aware_and_naive_dates_mix() {
    let madrid = chrono_tz::Europe::Madrid
        .with_ymd_and_hms(2024, 3, 31, 23, 30, 0)
        .unwrap();
    let maturity = ymd(2024, 4, 1);
    assert_eq!(offset(&madrid, &maturity, Product::Day).unwrap(), 1);
    assert_eq!(offset(&madrid, &maturity, Product::Month).unwrap(), 1);
    let naive_dt = ymd(2024, 3, 31).and_hms_opt(12, 0, 0).unwrap();
    assert_eq!(offset(&naive_dt, &madrid, Product::Day).unwrap(), 0);
}

#[test]
fn hourly_and_unknown_granularities_fail() {
    let d = ymd(2024, 1, 1);
    let err = offset(&d, &d, Product::Hour).unwrap_err();
    assert!(matches!(err, SettleError::InvalidGranularity { ref value } if value == "H"));
    assert!(err.is_usage_error());
    let err = offset_for_code(&d, &d, "X").unwrap_err();
    assert!(matches!(err, SettleError::InvalidGranularity { ref value } if value == "X"));
    assert!(maturity_for(&d, Product::Hour, 1).is_err());
}

#[test]
fn delivery_codes() {
    assert_eq!(delivery_code(&ymd(2025, 12, 3)), "Z25");
    assert_eq!(delivery_code(&ymd(2026, 1, 1)), "F26");
    assert_eq!(delivery_code(&ymd(2009, 6, 30)), "M09");
}
