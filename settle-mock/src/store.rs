use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use settle_core::{ColumnKey, Panel, SettleError, SettlementStore, merge};

/// One accepted call to [`SettlementStore::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    /// Target database.
    pub database: String,
    /// Target sensor.
    pub sensor: String,
    /// Columns carried by the write.
    pub columns: BTreeSet<ColumnKey>,
    /// Rows carried by the write.
    pub rows: usize,
}

#[derive(Default)]
struct StoreState {
    sensors: HashMap<(String, String), Panel>,
    writes: Vec<WriteRecord>,
    reject_writes: bool,
}

/// In-memory store keyed by `(database, sensor)`.
///
/// Writes overwrite the written cells, nulls included, so nulling a date range
/// and writing it back deletes those values. Rows without any value are not
/// returned by reads.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    /// An empty store that accepts every write.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes return `Ok(false)`.
    pub async fn reject_writes(&self, reject: bool) {
        self.state.lock().await.reject_writes = reject;
    }

    /// Put `panel` under `sensor` as is, bypassing the write log.
    pub async fn seed(&self, database: &str, sensor: &str, panel: Panel) {
        let mut guard = self.state.lock().await;
        guard
            .sensors
            .insert((database.to_string(), sensor.to_string()), panel);
    }

    /// Accepted writes, oldest first.
    pub async fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().await.writes.clone()
    }

    /// Forget the write log.
    pub async fn clear_writes(&self) {
        self.state.lock().await.writes.clear();
    }

    /// Raw stored panel of `sensor`, maturities as UNIX seconds.
    pub async fn stored(&self, database: &str, sensor: &str) -> Option<Panel> {
        let guard = self.state.lock().await;
        guard
            .sensors
            .get(&(database.to_string(), sensor.to_string()))
            .cloned()
    }
}

fn overwrite(stored: Option<&Panel>, written: &Panel) -> Result<Panel, SettleError> {
    let merged = match stored {
        Some(old) => merge(written, old)?,
        None => written.clone(),
    };
    let (index, mut columns) = merged.into_parts();
    for (key, column) in written.columns() {
        let Some(target) = columns.get_mut(key) else {
            continue;
        };
        for (row, date) in written.index().iter().enumerate() {
            if column.is_null(row)
                && let Ok(pos) = index.binary_search(date)
            {
                target.set(pos, None)?;
            }
        }
    }
    Panel::from_columns(index, columns)
}

fn non_empty_rows(panel: &Panel) -> Vec<usize> {
    (0..panel.n_rows())
        .filter(|&row| panel.columns().any(|(_, c)| !c.is_null(row)))
        .collect()
}

#[async_trait]
impl SettlementStore for InMemoryStore {
    async fn write(&self, database: &str, sensor: &str, panel: &Panel) -> Result<bool, SettleError> {
        let mut guard = self.state.lock().await;
        if guard.reject_writes {
            return Ok(false);
        }
        let id = (database.to_string(), sensor.to_string());
        let updated = overwrite(guard.sensors.get(&id), panel)?;
        guard.sensors.insert(id, updated);
        guard.writes.push(WriteRecord {
            database: database.to_string(),
            sensor: sensor.to_string(),
            columns: panel.keys().cloned().collect(),
            rows: panel.n_rows(),
        });
        Ok(true)
    }

    async fn read(
        &self,
        database: &str,
        sensor: &str,
        since: Option<NaiveDate>,
    ) -> Result<Panel, SettleError> {
        let guard = self.state.lock().await;
        let Some(panel) = guard.sensors.get(&(database.to_string(), sensor.to_string())) else {
            return Ok(Panel::new());
        };
        let panel = panel.take_rows(&non_empty_rows(panel));
        Ok(panel.slice(since, None))
    }

    async fn last_date(&self, database: &str, sensor: &str) -> Result<Option<NaiveDate>, SettleError> {
        let guard = self.state.lock().await;
        Ok(guard
            .sensors
            .get(&(database.to_string(), sensor.to_string()))
            .and_then(|p| non_empty_rows(p).last().map(|&row| p.index()[row])))
    }

    async fn delete_sensor(&self, database: &str, sensor: &str) -> Result<bool, SettleError> {
        let mut guard = self.state.lock().await;
        Ok(guard
            .sensors
            .remove(&(database.to_string(), sensor.to_string()))
            .is_some_and(|p| !p.is_empty()))
    }
}
