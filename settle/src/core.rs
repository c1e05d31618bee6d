use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use settle_core::{
    ContinuousOptions, CrossSection, HolidayCalendar, Panel, SettleConfig, SettleError,
    SettlementSource, SettlementStore, XsFilter, build_continuous_prices, diff_columns,
    merge, update_panel,
};

use crate::calendar::{TargetCalendar, business_days, holidays_or_empty, split_chunks};
use crate::download::{DownloadMode, earliest_start, fetch_dates, lookback_start};

/// Settlement prices of one market, held in memory and mirrored to a store.
///
/// The book owns the panel of its market. Every mutation (download, roll,
/// deletion) is written to the store before the call returns, so a fresh book
/// built on the same store and loaded sees the same data.
pub struct SettlementBook {
    source: Arc<dyn SettlementSource>,
    store: Arc<dyn SettlementStore>,
    calendar: Arc<dyn HolidayCalendar>,
    cfg: SettleConfig,
    panel: Panel,
    last_date: Option<NaiveDate>,
    loaded: bool,
}

/// Builder for a [`SettlementBook`].
pub struct SettlementBookBuilder {
    source: Option<Arc<dyn SettlementSource>>,
    store: Option<Arc<dyn SettlementStore>>,
    calendar: Arc<dyn HolidayCalendar>,
    cfg: SettleConfig,
}

impl Default for SettlementBookBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SettlementBookBuilder {
    /// Builder with default settings and the TARGET2 holiday calendar.
    #[must_use]
    pub fn new() -> Self {
        Self {
            source: None,
            store: None,
            calendar: Arc::new(TargetCalendar::new()),
            cfg: SettleConfig::default(),
        }
    }

    /// Data source of the market. Its name is the sensor the book persists under.
    #[must_use]
    pub fn source(mut self, source: Arc<dyn SettlementSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Store the book loads from and writes to.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn SettlementStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Holiday calendar used to enumerate business days.
    #[must_use]
    pub fn calendar(mut self, calendar: Arc<dyn HolidayCalendar>) -> Self {
        self.calendar = calendar;
        self
    }

    /// Replace all runtime settings.
    #[must_use]
    pub fn config(mut self, cfg: SettleConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Database the book persists into.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.cfg.database = database.into();
        self
    }

    /// Recompute continuous prices after downloads that brought data.
    #[must_use]
    pub const fn roll_expirations(mut self, yes: bool) -> Self {
        self.cfg.roll_expirations = yes;
        self
    }

    /// Rows before expiry at which contracts are rolled.
    #[must_use]
    pub const fn roll_offset(mut self, rows: usize) -> Self {
        self.cfg.roll_offset = rows;
        self
    }

    /// First date to load and to download when nothing is stored.
    #[must_use]
    pub const fn history_start(mut self, date: NaiveDate) -> Self {
        self.cfg.history_start = Some(date);
        self
    }

    /// Maximum concurrent per-date fetches.
    #[must_use]
    pub const fn download_concurrency(mut self, n: usize) -> Self {
        self.cfg.download_concurrency = n;
        self
    }

    /// Build the book. Nothing is loaded until [`SettlementBook::load`] or the
    /// first download.
    ///
    /// # Errors
    /// Returns `Err(SettleError::InvalidArg)` without a source or a store, and
    /// `Err(SettleError::InvalidConfig)` if the settings or a series
    /// configuration of the source are invalid.
    pub fn build(self) -> Result<SettlementBook, SettleError> {
        let source = self.source.ok_or_else(|| {
            SettleError::InvalidArg("no source set; add one via source(...)".to_string())
        })?;
        let store = self.store.ok_or_else(|| {
            SettleError::InvalidArg("no store set; add one via store(...)".to_string())
        })?;
        self.cfg.validate()?;
        for (i, series) in source.configs().iter().enumerate() {
            series.validate().map_err(|e| match e {
                SettleError::InvalidConfig { field, message } => {
                    SettleError::invalid_config(format!("{}[{i}].{field}", source.name()), message)
                }
                other => other,
            })?;
        }
        Ok(SettlementBook {
            source,
            store,
            calendar: self.calendar,
            cfg: self.cfg,
            panel: Panel::new(),
            last_date: None,
            loaded: false,
        })
    }
}

impl SettlementBook {
    /// Start building a book.
    #[must_use]
    pub fn builder() -> SettlementBookBuilder {
        SettlementBookBuilder::new()
    }

    /// Market name, also the sensor the book persists under.
    #[must_use]
    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// Runtime settings.
    #[must_use]
    pub const fn config(&self) -> &SettleConfig {
        &self.cfg
    }

    /// In-memory panel; empty until loaded or downloaded.
    #[must_use]
    pub const fn panel(&self) -> &Panel {
        &self.panel
    }

    /// True once the panel was loaded from the store.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Roll parameters derived from the settings.
    #[must_use]
    pub fn continuous_options(&self) -> ContinuousOptions {
        ContinuousOptions::default()
            .roll_offset(self.cfg.roll_offset)
            .continuous_type(self.cfg.continuous_type.clone())
    }

    /// Last date with stored data, as reported by the store.
    ///
    /// # Errors
    /// Propagates store errors.
    pub async fn last_date(&mut self) -> Result<Option<NaiveDate>, SettleError> {
        self.last_date = self
            .store
            .last_date(&self.cfg.database, self.source.name())
            .await?;
        Ok(self.last_date)
    }

    /// Replace the panel with what the store holds since `history_start`.
    ///
    /// # Errors
    /// Propagates store errors.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "settle::book::load", skip(self), fields(market = %self.name()))
    )]
    pub async fn load(&mut self) -> Result<(), SettleError> {
        self.panel = match self.last_date().await? {
            None => Panel::new(),
            Some(_) => self
                .store
                .read(&self.cfg.database, self.source.name(), self.cfg.history_start)
                .await?
                .maturity_to_dates(),
        };
        self.loaded = true;
        #[cfg(feature = "tracing")]
        tracing::info!(
            rows = self.panel.n_rows(),
            columns = self.panel.n_columns(),
            last_date = ?self.last_date,
            "loaded settlement data"
        );
        Ok(())
    }

    /// Download settlement prices for the business days of `[start, end]`.
    ///
    /// - `start` defaults to the last stored date, then `history_start`, then the
    ///   earliest publication date of the configured series.
    /// - `end` defaults to today.
    /// - Unless forced, `start` never goes further back than `lookback_years`
    ///   year starts before the last stored date, and dates already held are
    ///   skipped.
    /// - Business days are split into `download_chunks` chunks; each chunk is
    ///   fetched concurrently, merged into the panel and written to the store.
    /// - If any day brought data and `roll_expirations` is set, continuous
    ///   prices are recomputed once at the end.
    ///
    /// Returns the number of days that brought data.
    ///
    /// # Errors
    /// - `InvalidArg` when no start date can be determined.
    /// - `InvalidConfig` for a filter naming an unknown configuration field.
    /// - `Source` when the source fails; chunks written before the failure stay stored.
    /// - `StoreData` when the store rejects a write.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "settle::book::download", skip(self), fields(market = %self.name()))
    )]
    pub async fn download(
        &mut self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        mode: DownloadMode,
    ) -> Result<usize, SettleError> {
        let configs = mode.select(self.source.configs())?;
        if configs.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::info!("no series selected for download");
            return Ok(0);
        }
        if !self.loaded {
            self.load().await?;
        }
        let forced = mode.is_forced();
        let last = self.last_date().await?;
        let Some(mut start) = start
            .or(last)
            .or(self.cfg.history_start)
            .or_else(|| earliest_start(&configs))
        else {
            return Err(SettleError::InvalidArg(format!(
                "no start date for {}: nothing stored and no history_start configured",
                self.name()
            )));
        };
        let end = end.unwrap_or_else(|| Utc::now().date_naive());
        if let Some(last) = last
            && !forced
        {
            start = start.max(lookback_start(last, self.cfg.lookback_years));
        }

        self.source.prepare(start, end, forced).await?;
        let holidays = holidays_or_empty(self.calendar.as_ref(), start, end);
        let dates = business_days(start, end, &holidays);

        let mut downloaded = 0;
        for chunk in split_chunks(&dates, self.cfg.download_chunks) {
            if chunk.is_empty() {
                break;
            }
            let wanted: Vec<NaiveDate> = chunk
                .iter()
                .copied()
                .filter(|d| forced || !self.panel.contains_date(*d))
                .collect();
            let (fetched, new_data) = fetch_dates(
                self.source.as_ref(),
                &wanted,
                &configs,
                self.cfg.download_concurrency,
            )
            .await?;
            if fetched == 0 {
                continue;
            }
            downloaded += fetched;
            self.panel = if forced {
                merge(&new_data, &self.panel)?
            } else {
                update_panel(Some(&self.panel), &new_data)?
            };
            self.dump(&new_data).await?;
        }

        if downloaded > 0 && self.cfg.roll_expirations {
            #[cfg(feature = "tracing")]
            tracing::info!("adjusting expirations");
            let options = self.continuous_options();
            self.roll_expiration(&options).await?;
        }
        self.last_date().await?;
        #[cfg(feature = "tracing")]
        tracing::info!(downloaded, %start, %end, "download finished");
        Ok(downloaded)
    }

    /// Recompute continuous prices and persist the columns that changed.
    ///
    /// Returns the number of columns written. An unloaded book is loaded first.
    ///
    /// # Errors
    /// Propagates roll and store errors.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "settle::book::roll_expiration", skip(self, options), fields(market = %self.name()))
    )]
    pub async fn roll_expiration(&mut self, options: &ContinuousOptions) -> Result<usize, SettleError> {
        if !self.loaded {
            self.load().await?;
        }
        let rolled = build_continuous_prices(&self.panel, options)?;
        let changed = diff_columns(&rolled, &self.panel);
        if changed.is_empty() {
            return Ok(0);
        }
        self.panel = rolled;
        let slice = self.panel.select_columns(|k| changed.contains(k));
        self.dump(&slice).await?;
        Ok(changed.len())
    }

    /// Write `panel` to the store, maturities as UNIX seconds. An empty panel is not written.
    ///
    /// # Errors
    /// Returns `Err(SettleError::StoreData)` if the store rejects the write and
    /// propagates store errors.
    pub async fn dump(&self, panel: &Panel) -> Result<bool, SettleError> {
        if panel.is_empty() {
            return Ok(true);
        }
        let persisted = panel.maturity_to_timestamps();
        #[cfg(feature = "tracing")]
        let started = tokio::time::Instant::now();
        let ok = self
            .store
            .write(&self.cfg.database, self.source.name(), &persisted)
            .await?;
        #[cfg(feature = "tracing")]
        tracing::info!(
            rows = persisted.n_rows(),
            columns = persisted.n_columns(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "wrote data to store"
        );
        if !ok {
            #[cfg(feature = "tracing")]
            tracing::error!(database = %self.cfg.database, sensor = %self.name(), "could not dump data");
            return Err(SettleError::StoreData(format!(
                "{} rejected a write of {} rows to {}",
                self.name(),
                persisted.n_rows(),
                self.cfg.database
            )));
        }
        Ok(true)
    }

    /// Null every value on `[start, end]`, write the nulls, and reload if asked.
    ///
    /// Returns the number of rows cleared. An unloaded book is loaded first, so
    /// the nulls reach the store even before any read.
    ///
    /// # Errors
    /// Propagates store errors, including `StoreData` on a rejected write.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "settle::book::delete_dates", skip(self), fields(market = %self.name()))
    )]
    pub async fn delete_dates(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        reload: bool,
    ) -> Result<usize, SettleError> {
        if !self.loaded {
            self.load().await?;
        }
        let cleared = self.panel.clear_range(start, end);
        let slice = self.panel.slice(Some(start), Some(end));
        self.dump(&slice).await?;
        if reload {
            self.load().await?;
        }
        Ok(cleared)
    }

    /// Delete everything stored for this market and empty the panel.
    ///
    /// Returns whether the store deleted anything.
    ///
    /// # Errors
    /// Propagates store errors.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "settle::book::delete_all_data", skip(self), fields(market = %self.name()))
    )]
    pub async fn delete_all_data(&mut self) -> Result<bool, SettleError> {
        let deleted = self
            .store
            .delete_sensor(&self.cfg.database, self.source.name())
            .await?;
        if deleted {
            #[cfg(feature = "tracing")]
            tracing::info!(database = %self.cfg.database, "deleted all market data");
            self.panel = Panel::new();
            self.last_date = None;
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!(database = %self.cfg.database, "could not delete market data");
        }
        Ok(deleted)
    }

    /// Cross-section of the in-memory panel.
    ///
    /// # Errors
    /// Returns `Err(SettleError::InvalidArg)` if the book was never loaded, otherwise
    /// see [`settle_core::settle_xs`].
    pub fn settle_xs(&self, filter: &XsFilter) -> Result<CrossSection, SettleError> {
        if !self.loaded {
            return Err(SettleError::InvalidArg(format!(
                "{} is not loaded, call load() or download() first",
                self.name()
            )));
        }
        settle_core::settle_xs(&self.panel, filter)
    }
}
