use std::sync::Arc;

use chrono::NaiveDate;
use settle::{
    DownloadMode, Markets, Product, SettlementBook, TargetCalendar, ValueType, XsFilter,
    load_series_configs,
};
use settle_mock::{FixtureSource, InMemoryStore};
use tracing_subscriber::fmt::format::FmtSpan;

const OMIP: &str = r#"[
    {"commodity_cfg": {"commodity": "Power", "instrument": "BL", "area": "ES"},
     "download_cfg": {"source": "Omip", "instrument": "FTB", "zone": "ES",
                      "start_t": "2006-07-03", "product": "EL"}}
]"#;

const EEX: &str = r#"[
    {"commodity_cfg": {"commodity": "Power", "instrument": "BL", "area": "DE"},
     "download_cfg": {"source": "EEX", "instrument": "DEBM", "product": "F1BM"}}
]"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Suggested: RUST_LOG=info,settle=debug
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE)
        .try_init();

    let store = Arc::new(InMemoryStore::new());
    let omip = SettlementBook::builder()
        .source(Arc::new(FixtureSource::new("Omip", load_series_configs(OMIP)?)))
        .store(store.clone())
        .build()?;
    let eex = SettlementBook::builder()
        .source(Arc::new(FixtureSource::new("EEX", load_series_configs(EEX)?)))
        .store(store.clone())
        .calendar(Arc::new(
            TargetCalendar::new().with_extra_days(&[(12, 24), (12, 31)]),
        ))
        .build()?;
    let mut markets = Markets::new().with_book(omip).with_book(eex);

    // Two weeks across a month end so the front month rolls
    let start = NaiveDate::from_ymd_opt(2024, 1, 22).ok_or("bad date")?;
    let end = NaiveDate::from_ymd_opt(2024, 2, 2).ok_or("bad date")?;
    let days = markets
        .download(Some(start), Some(end), &DownloadMode::Missing, None)
        .await?;
    println!("downloaded days: {days:?}");

    let xs = markets.settle_xs(
        &XsFilter::default()
            .commodity("Power")
            .product(Product::Month)
            .offset(1)
            .value_type(vec![ValueType::Close, ValueType::AdjClose]),
    )?;
    if let Some(panel) = xs.offsets() {
        for (key, column) in panel.columns() {
            println!("{key}: {:?}", column.values());
        }
    }

    let stacked = markets.data_stack(Some(end), None)?;
    for row in &stacked {
        println!(
            "{} {:?} +{} matures {}: {:?}",
            row.as_of, row.family, row.offset, row.maturity, row.values
        );
    }
    Ok(())
}
