// Shared fixtures so tests can `use helpers::*;`
#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use settle::{
    ColumnKey, NoHolidays, Product, SeriesConfig, SettlementBook, SettlementBookBuilder, ValueType,
    load_series_configs,
};
use settle_mock::{FixtureSource, InMemoryStore};

pub const DB: &str = "commodity_data";

/// Build a date without unwrap noise in tests.
pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
}

/// Omip baseload and peak load of Spanish power.
pub fn omip_configs() -> Vec<SeriesConfig> {
    load_series_configs(
        r#"[
            {"commodity_cfg": {"commodity": "Power", "instrument": "BL", "area": "ES"},
             "download_cfg": {"source": "Omip", "instrument": "FTB", "zone": "ES",
                              "start_t": "2006-07-03", "product": "EL"}},
            {"commodity_cfg": {"commodity": "Power", "instrument": "PK", "area": "ES"},
             "download_cfg": {"source": "Omip", "instrument": "FTK", "zone": "ES",
                              "start_t": "2006-07-03", "product": "EL"}}
        ]"#,
    )
    .expect("valid omip configs")
}

/// EEX baseload of German power.
pub fn eex_configs() -> Vec<SeriesConfig> {
    load_series_configs(
        r#"[{"commodity_cfg": {"commodity": "Power", "instrument": "BL", "area": "DE"},
             "download_cfg": {"source": "EEX", "instrument": "DEBM", "product": "F1BM"}}]"#,
    )
    .expect("valid eex configs")
}

/// Key of a monthly contract column.
pub fn key(market: &str, instrument: &str, area: &str, offset: i32, value_type: &str) -> ColumnKey {
    ColumnKey::new(
        market,
        "Power",
        instrument,
        area,
        Product::Month,
        offset,
        ValueType::from(value_type),
    )
}

/// A source, the store it persists to and a book over both.
pub struct Fixture {
    pub source: Arc<FixtureSource>,
    pub store: Arc<InMemoryStore>,
    pub book: SettlementBook,
}

/// Builder wired to `source` and `store`, weekdays only, no rolling.
pub fn builder(source: &Arc<FixtureSource>, store: &Arc<InMemoryStore>) -> SettlementBookBuilder {
    SettlementBook::builder()
        .source(source.clone())
        .store(store.clone())
        .calendar(Arc::new(NoHolidays))
        .roll_expirations(false)
}

/// Omip fixture on a fresh store.
pub fn omip() -> Fixture {
    let source = Arc::new(FixtureSource::new("Omip", omip_configs()));
    let store = Arc::new(InMemoryStore::new());
    let book = builder(&source, &store).build().expect("valid book");
    Fixture {
        source,
        store,
        book,
    }
}

/// Business-day dates of the fixture source calls, in call order.
pub async fn fetched_dates(source: &FixtureSource) -> Vec<NaiveDate> {
    source.calls().await.into_iter().map(|(d, _)| d).collect()
}
