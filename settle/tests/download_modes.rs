mod helpers;

use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::sync::Arc;

use chrono::NaiveDate;
use helpers::*;
use proptest::prelude::*;
use settle::{
    Column, DownloadMode, HolidayCalendar, Panel, SeriesFilter, SettleError, TargetCalendar,
};
use settle_mock::{DateBehavior, FixtureSource, InMemoryStore, fixture_price};

#[tokio::test]
async fn missing_mode_skips_dates_already_held() {
    let Fixture {
        source, mut book, ..
    } = omip();
    book.download(Some(d(2024, 1, 1)), Some(d(2024, 1, 3)), DownloadMode::Missing)
        .await
        .unwrap();
    let days = book
        .download(Some(d(2024, 1, 1)), Some(d(2024, 1, 5)), DownloadMode::Missing)
        .await
        .unwrap();
    assert_eq!(days, 2);
    assert_eq!(
        fetched_dates(&source).await,
        vec![
            d(2024, 1, 1),
            d(2024, 1, 2),
            d(2024, 1, 3),
            d(2024, 1, 4),
            d(2024, 1, 5)
        ]
    );
}

#[tokio::test]
async fn default_start_is_last_stored_date() {
    let Fixture {
        source, mut book, ..
    } = omip();
    book.download(Some(d(2024, 1, 1)), Some(d(2024, 1, 3)), DownloadMode::Missing)
        .await
        .unwrap();
    book.download(None, Some(d(2024, 1, 5)), DownloadMode::Missing)
        .await
        .unwrap();
    let prepared = source.prepared().await;
    assert_eq!(prepared[1], (d(2024, 1, 3), d(2024, 1, 5), false));
}

#[tokio::test]
async fn force_refetches_and_new_values_win() {
    let Fixture {
        source,
        store,
        mut book,
    } = omip();
    book.download(Some(d(2024, 1, 1)), Some(d(2024, 1, 2)), DownloadMode::Missing)
        .await
        .unwrap();

    source.set_price_shift(1.0).await;
    let days = book
        .download(Some(d(2024, 1, 1)), Some(d(2024, 1, 2)), DownloadMode::Force)
        .await
        .unwrap();
    assert_eq!(days, 2);

    let k = key("Omip", "BL", "ES", 1, "close");
    let expected = fixture_price(d(2024, 2, 1), d(2024, 1, 2)) + 1.0;
    assert_eq!(book.panel().get(d(2024, 1, 2), &k), Some(expected.into()));

    let mut fresh = builder(&source, &store).build().unwrap();
    fresh.load().await.unwrap();
    assert_eq!(fresh.panel(), book.panel());
    assert!(source.prepared().await[1].2);
}

#[tokio::test]
async fn force_matching_refetches_only_selected_series() {
    let Fixture {
        source, mut book, ..
    } = omip();
    book.download(Some(d(2024, 1, 1)), Some(d(2024, 1, 2)), DownloadMode::Missing)
        .await
        .unwrap();
    source.set_price_shift(1.0).await;

    let mode = DownloadMode::matching(SeriesFilter::instrument("FTK"));
    book.download(Some(d(2024, 1, 1)), Some(d(2024, 1, 2)), mode)
        .await
        .unwrap();

    let calls = source.calls().await;
    assert_eq!(calls.len(), 4);
    for (_, ids) in &calls[2..] {
        assert_eq!(ids, &vec!["FTK,EL,ES".to_string()]);
    }

    let as_of = d(2024, 1, 2);
    let price = fixture_price(d(2024, 2, 1), as_of);
    let panel = book.panel();
    assert_eq!(
        panel.get(as_of, &key("Omip", "PK", "ES", 1, "close")),
        Some((price + 1.0).into())
    );
    assert_eq!(
        panel.get(as_of, &key("Omip", "BL", "ES", 1, "close")),
        Some(price.into())
    );
}

#[tokio::test]
async fn force_matching_without_matches_downloads_nothing() {
    let Fixture {
        source, mut book, ..
    } = omip();
    let mode = DownloadMode::matching(SeriesFilter::instrument("NOPE"));
    let days = book
        .download(Some(d(2024, 1, 1)), Some(d(2024, 1, 2)), mode)
        .await
        .unwrap();
    assert_eq!(days, 0);
    assert!(source.calls().await.is_empty());
}

#[tokio::test]
async fn filter_on_unknown_field_is_rejected() {
    let Fixture { mut book, .. } = omip();
    let mode = DownloadMode::matching(SeriesFilter::symbol("CKZ25"));
    let err = book
        .download(Some(d(2024, 1, 1)), Some(d(2024, 1, 2)), mode)
        .await
        .unwrap_err();
    assert!(matches!(err, SettleError::InvalidConfig { .. }), "{err:?}");
}

#[tokio::test]
async fn unforced_start_is_clamped_to_lookback() {
    let Fixture {
        source,
        store,
        mut book,
    } = omip();
    let seeded = Panel::from_columns(
        vec![d(2024, 6, 14)],
        [(
            key("Omip", "BL", "ES", 1, "close"),
            Column::Values(vec![Some(60.0)]),
        )],
    )
    .unwrap();
    store.seed(DB, "Omip", seeded).await;

    book.download(Some(d(2010, 1, 1)), Some(d(2015, 1, 5)), DownloadMode::Missing)
        .await
        .unwrap();
    assert_eq!(
        source.prepared().await,
        vec![(d(2015, 1, 1), d(2015, 1, 5), false)]
    );
    assert_eq!(
        fetched_dates(&source).await,
        vec![d(2015, 1, 1), d(2015, 1, 2), d(2015, 1, 5)]
    );

    // forced downloads are not clamped
    book.download(Some(d(2014, 12, 31)), Some(d(2014, 12, 31)), DownloadMode::Force)
        .await
        .unwrap();
    assert_eq!(source.prepared().await[1].0, d(2014, 12, 31));
}

#[tokio::test]
async fn empty_dates_are_not_counted() {
    let Fixture {
        source, mut book, ..
    } = omip();
    source.set_behavior(d(2024, 1, 2), DateBehavior::Empty).await;
    let days = book
        .download(Some(d(2024, 1, 1)), Some(d(2024, 1, 3)), DownloadMode::Missing)
        .await
        .unwrap();
    assert_eq!(days, 2);
    assert!(!book.panel().contains_date(d(2024, 1, 2)));
}

#[tokio::test]
async fn source_failure_keeps_earlier_chunks() {
    let Fixture {
        source,
        store,
        mut book,
    } = omip();
    source
        .set_behavior(
            d(2024, 1, 3),
            DateBehavior::Fail(SettleError::Other("boom".into())),
        )
        .await;
    let err = book
        .download(Some(d(2024, 1, 1)), Some(d(2024, 1, 5)), DownloadMode::Missing)
        .await
        .unwrap_err();
    match err {
        SettleError::Source { market, msg } => {
            assert_eq!(market, "Omip");
            assert!(msg.contains("boom"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    let stored = store.stored(DB, "Omip").await.unwrap();
    assert_eq!(stored.index(), &[d(2024, 1, 1), d(2024, 1, 2)]);
}

#[tokio::test]
async fn holidays_are_skipped() {
    let source = Arc::new(FixtureSource::new("Omip", omip_configs()));
    let store = Arc::new(InMemoryStore::new());
    let mut book = builder(&source, &store)
        .calendar(Arc::new(TargetCalendar::new()))
        .build()
        .unwrap();
    // Good Friday and Easter Monday 2024
    book.download(Some(d(2024, 3, 28)), Some(d(2024, 4, 2)), DownloadMode::Missing)
        .await
        .unwrap();
    assert_eq!(
        fetched_dates(&source).await,
        vec![d(2024, 3, 28), d(2024, 4, 2)]
    );
}

struct BrokenCalendar;

impl HolidayCalendar for BrokenCalendar {
    fn holidays(&self, _years: RangeInclusive<i32>) -> Result<BTreeSet<NaiveDate>, SettleError> {
        Err(SettleError::not_found("holiday feed"))
    }
}

#[tokio::test]
async fn failing_calendar_falls_back_to_weekdays() {
    let source = Arc::new(FixtureSource::new("Omip", omip_configs()));
    let store = Arc::new(InMemoryStore::new());
    let mut book = builder(&source, &store)
        .calendar(Arc::new(BrokenCalendar))
        .build()
        .unwrap();
    let days = book
        .download(Some(d(2024, 3, 28)), Some(d(2024, 4, 2)), DownloadMode::Missing)
        .await
        .unwrap();
    assert_eq!(days, 4);
}

#[tokio::test]
async fn start_defaults_to_earliest_publication_date() {
    let Fixture {
        source, mut book, ..
    } = omip();
    book.download(None, Some(d(2006, 7, 4)), DownloadMode::Missing)
        .await
        .unwrap();
    assert_eq!(
        fetched_dates(&source).await,
        vec![d(2006, 7, 3), d(2006, 7, 4)]
    );
}

#[tokio::test]
async fn no_start_date_is_an_error() {
    let source = Arc::new(FixtureSource::new("EEX", eex_configs()));
    let store = Arc::new(InMemoryStore::new());
    let mut book = builder(&source, &store).build().unwrap();
    let err = book
        .download(None, Some(d(2024, 1, 5)), DownloadMode::Missing)
        .await
        .unwrap_err();
    assert!(matches!(err, SettleError::InvalidArg(_)));
}

#[test]
fn modes_read_from_settings() {
    let mode: DownloadMode = serde_json::from_str(r#""missing""#).unwrap();
    assert_eq!(mode, DownloadMode::Missing);
    let mode: DownloadMode =
        serde_json::from_str(r#"{"force_matching": [{"instrument": "FTK", "zone": "ES"}]}"#)
            .unwrap();
    let DownloadMode::ForceMatching(filters) = &mode else {
        panic!("unexpected: {mode:?}");
    };
    assert_eq!(filters[0].zone.as_deref(), Some("ES"));
    assert!(mode.is_forced());
    assert_eq!(mode.select(&omip_configs()).unwrap().len(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 16, .. ProptestConfig::default() })]
    #[test]
    fn unforced_download_fetches_each_date_once(held in proptest::collection::btree_set(0usize..10, 0..10)) {
        tokio_test::block_on(async move {
            let Fixture { source, mut book, .. } = omip();
            let all: Vec<NaiveDate> = settle::business_days(
                d(2024, 1, 1),
                d(2024, 1, 12),
                &BTreeSet::new(),
            );
            for &i in &held {
                book.download(Some(all[i]), Some(all[i]), DownloadMode::Missing)
                    .await
                    .unwrap();
            }
            let before = source.calls().await.len();
            let days = book
                .download(Some(d(2024, 1, 1)), Some(d(2024, 1, 12)), DownloadMode::Missing)
                .await
                .unwrap();

            assert_eq!(days, all.len() - held.len());
            let mut fetched: Vec<NaiveDate> = fetched_dates(&source).await;
            fetched.sort_unstable();
            fetched.dedup();
            assert_eq!(fetched.len(), source.calls().await.len());
            assert_eq!(source.calls().await.len() - before, days);
            assert_eq!(book.panel().index(), all.as_slice());
        });
    }
}
