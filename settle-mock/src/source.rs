use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use settle_core::{
    Panel, Product, Record, SeriesConfig, SettleError, SettlementSource, ValueType, maturity_for,
    pivot_records,
};

/// How [`FixtureSource::fetch_date`] answers for one date.
#[derive(Debug, Clone)]
pub enum DateBehavior {
    /// Nothing published that day.
    Empty,
    /// Fail with the given error.
    Fail(SettleError),
    /// Return this panel instead of generated data.
    Panel(Panel),
}

#[derive(Default)]
struct SourceState {
    behaviors: HashMap<NaiveDate, DateBehavior>,
    calls: Vec<(NaiveDate, Vec<String>)>,
    prepared: Vec<(NaiveDate, NaiveDate, bool)>,
    price_shift: f64,
}

/// Deterministic source of monthly contracts.
///
/// Every configured series publishes offsets `1..=max_offset` of monthly
/// contracts on every requested date, priced by [`fixture_price`].
pub struct FixtureSource {
    name: String,
    configs: Vec<SeriesConfig>,
    max_offset: i32,
    state: Mutex<SourceState>,
}

/// Close of the contract delivering at `maturity`, as published on `as_of`.
#[must_use]
pub fn fixture_price(maturity: NaiveDate, as_of: NaiveDate) -> f64 {
    50.0 + f64::from(maturity.month0()) * 2.0 + f64::from(as_of.day()) * 0.1
}

impl FixtureSource {
    /// Source named `name` (also the market label) publishing three offsets.
    pub fn new(name: impl Into<String>, configs: Vec<SeriesConfig>) -> Self {
        Self {
            name: name.into(),
            configs,
            max_offset: 3,
            state: Mutex::new(SourceState::default()),
        }
    }

    /// Publish offsets `1..=max_offset`.
    #[must_use]
    pub const fn with_max_offset(mut self, max_offset: i32) -> Self {
        self.max_offset = max_offset;
        self
    }

    /// Override the answer for `date`.
    pub async fn set_behavior(&self, date: NaiveDate, behavior: DateBehavior) {
        self.state.lock().await.behaviors.insert(date, behavior);
    }

    /// Add `shift` to every generated price from now on.
    pub async fn set_price_shift(&self, shift: f64) {
        self.state.lock().await.price_shift = shift;
    }

    /// Fetched dates with the ids of the requested series, in call order.
    pub async fn calls(&self) -> Vec<(NaiveDate, Vec<String>)> {
        self.state.lock().await.calls.clone()
    }

    /// Arguments of every `prepare` call.
    pub async fn prepared(&self) -> Vec<(NaiveDate, NaiveDate, bool)> {
        self.state.lock().await.prepared.clone()
    }

    fn records(
        &self,
        as_of: NaiveDate,
        configs: &[SeriesConfig],
        shift: f64,
    ) -> Result<Vec<Record>, SettleError> {
        let mut records = Vec::with_capacity(configs.len() * self.max_offset.max(0) as usize);
        for cfg in configs {
            for offset in 1..=self.max_offset {
                let maturity = maturity_for(&as_of, Product::Month, offset)?;
                let value = json!({
                    "as_of": as_of.to_string(),
                    "market": self.name,
                    "commodity": cfg.commodity_cfg.commodity,
                    "instrument": cfg.commodity_cfg.instrument,
                    "area": cfg.commodity_cfg.area,
                    "product": Product::Month.as_str(),
                    "offset": offset,
                    "close": fixture_price(maturity, as_of) + shift,
                    "maturity": maturity.to_string(),
                });
                if let Value::Object(map) = value {
                    records.push(map);
                }
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl SettlementSource for FixtureSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn configs(&self) -> &[SeriesConfig] {
        &self.configs
    }

    async fn prepare(&self, start: NaiveDate, end: NaiveDate, force: bool) -> Result<(), SettleError> {
        self.state.lock().await.prepared.push((start, end, force));
        Ok(())
    }

    async fn fetch_date(
        &self,
        as_of: NaiveDate,
        configs: &[SeriesConfig],
    ) -> Result<Option<Panel>, SettleError> {
        let (behavior, shift) = {
            let mut guard = self.state.lock().await;
            guard
                .calls
                .push((as_of, configs.iter().map(SeriesConfig::id).collect()));
            (guard.behaviors.get(&as_of).cloned(), guard.price_shift)
        };
        match behavior {
            Some(DateBehavior::Empty) => Ok(None),
            Some(DateBehavior::Fail(e)) => Err(e),
            Some(DateBehavior::Panel(p)) => Ok(Some(p)),
            None if configs.is_empty() => Ok(None),
            None => {
                let records = self.records(as_of, configs, shift)?;
                pivot_records(&records, &[ValueType::Close, ValueType::Maturity]).map(Some)
            }
        }
    }
}
