use chrono::{Datelike, NaiveDate};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use settle_core::{
    DownloadCfg, Panel, SeriesConfig, SeriesFilter, SettleError, SettlementSource, merge,
};

/// Which dates and series a download fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMode {
    /// Every series, only for dates the book does not hold yet.
    #[default]
    Missing,
    /// Every series, every date, even if already held.
    Force,
    /// Every date, but only the series meeting any of the filters.
    ForceMatching(Vec<SeriesFilter>),
}

impl DownloadMode {
    /// Re-download a subset of series selected by a single filter.
    #[must_use]
    pub fn matching(filter: SeriesFilter) -> Self {
        Self::ForceMatching(vec![filter])
    }

    /// True unless only missing dates are fetched.
    #[must_use]
    pub const fn is_forced(&self) -> bool {
        !matches!(self, Self::Missing)
    }

    /// Configurations fetched in this mode, in configuration order.
    ///
    /// # Errors
    /// Returns `Err(SettleError::InvalidConfig)` if a filter names a field a
    /// configuration does not have.
    pub fn select(&self, configs: &[SeriesConfig]) -> Result<Vec<SeriesConfig>, SettleError> {
        let Self::ForceMatching(filters) = self else {
            return Ok(configs.to_vec());
        };
        let mut out = Vec::new();
        for cfg in configs {
            for filter in filters {
                if cfg.download_cfg.meets(filter)? {
                    out.push(cfg.clone());
                    break;
                }
            }
        }
        Ok(out)
    }
}

/// Earliest start allowed for an unforced download when data ends on `last`.
///
/// Goes back `years` year starts from `last`: January 1st of `last.year() - years`,
/// or of `last.year() - years + 1` when `last` is not itself a January 1st.
pub(crate) fn lookback_start(last: NaiveDate, years: u32) -> NaiveDate {
    let back = if last.ordinal() == 1 {
        years
    } else {
        years.saturating_sub(1)
    };
    let year = i32::try_from(back)
        .ok()
        .and_then(|b| last.year().checked_sub(b))
        .unwrap_or(i32::MIN);
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Earliest publication date among the configurations that declare one.
pub(crate) fn earliest_start(configs: &[SeriesConfig]) -> Option<NaiveDate> {
    configs
        .iter()
        .filter_map(|cfg| match &cfg.download_cfg {
            DownloadCfg::Omip { start_t, .. } => Some(*start_t),
            _ => None,
        })
        .min()
}

fn tag_err(market: &str, e: SettleError) -> SettleError {
    match e {
        e @ SettleError::Source { .. } => e,
        other => SettleError::source_failed(market, other.to_string()),
    }
}

/// Fetch `dates` with at most `concurrency` requests in flight.
///
/// Dates without data are dropped; the panels of the others are merged into
/// one, maturities as dates. The first failing date aborts the chunk.
pub(crate) async fn fetch_dates(
    source: &dyn SettlementSource,
    dates: &[NaiveDate],
    configs: &[SeriesConfig],
    concurrency: usize,
) -> Result<(usize, Panel), SettleError> {
    let panels: Vec<Option<Panel>> = stream::iter(dates.iter().copied())
        .map(|as_of| async move {
            source
                .fetch_date(as_of, configs)
                .await
                .map_err(|e| tag_err(source.name(), e))
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let mut fetched = 0;
    let mut out = Panel::new();
    for panel in panels.into_iter().flatten() {
        fetched += 1;
        out = merge(&out, &panel.maturity_to_dates())?;
    }
    Ok((fetched, out))
}
