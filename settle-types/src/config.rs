//! Configuration types: instrument definitions per data source and runtime settings.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Product, SettleError, ValueType};

/// Commodity identity fields attached to every downloaded series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommodityCfg {
    /// Commodity (Power, Gas, CO2...).
    pub commodity: String,
    /// Contract family (BL, PK, EUA...).
    pub instrument: String,
    /// Geography or currency scope.
    #[serde(default)]
    pub area: String,
}

const fn default_barchart_product() -> Product {
    Product::Day
}

/// Download parameters, one variant per data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", deny_unknown_fields)]
#[non_exhaustive]
pub enum DownloadCfg {
    /// OMIP derivatives market.
    Omip {
        /// Exchange instrument code, e.g. "FTB".
        instrument: String,
        /// Market zone, e.g. "ES".
        zone: String,
        /// First date with published data.
        start_t: NaiveDate,
        /// Exchange product code, e.g. "EL" for electricity.
        product: String,
    },
    /// Barchart futures, one symbol per contract.
    Barchart {
        /// Barchart symbol, e.g. "CKZ25".
        symbol: String,
        /// Contract granularity.
        #[serde(default = "default_barchart_product")]
        product: Product,
        /// Contract expiry, when known.
        #[serde(default)]
        expiry: Option<NaiveDate>,
    },
    /// European Energy Exchange.
    #[serde(rename = "EEX")]
    Eex {
        /// Exchange instrument code.
        instrument: String,
        /// Exchange product code.
        product: String,
    },
}

impl DownloadCfg {
    /// Name of the data source this configuration targets.
    #[must_use]
    pub const fn source(&self) -> &'static str {
        match self {
            Self::Omip { .. } => "Omip",
            Self::Barchart { .. } => "Barchart",
            Self::Eex { .. } => "EEX",
        }
    }

    fn fields(&self) -> BTreeMap<&'static str, String> {
        let mut out = BTreeMap::new();
        match self {
            Self::Omip {
                instrument,
                zone,
                start_t,
                product,
            } => {
                out.insert("instrument", instrument.clone());
                out.insert("zone", zone.clone());
                out.insert("start_t", start_t.to_string());
                out.insert("product", product.clone());
            }
            Self::Barchart {
                symbol,
                product,
                expiry,
            } => {
                out.insert("symbol", symbol.clone());
                out.insert("product", product.to_string());
                if let Some(e) = expiry {
                    out.insert("expiry", e.to_string());
                }
            }
            Self::Eex {
                instrument,
                product,
            } => {
                out.insert("instrument", instrument.clone());
                out.insert("product", product.clone());
            }
        }
        out
    }

    const fn field_names(&self) -> &'static [&'static str] {
        match self {
            Self::Omip { .. } => &["instrument", "zone", "start_t", "product"],
            Self::Barchart { .. } => &["symbol", "product", "expiry"],
            Self::Eex { .. } => &["instrument", "product"],
        }
    }

    /// True if every field set in `filter` equals this configuration's value.
    ///
    /// # Errors
    /// Returns `Err(SettleError::InvalidConfig)` if the filter names a field this
    /// source does not have.
    pub fn meets(&self, filter: &SeriesFilter) -> Result<bool, SettleError> {
        let names = self.field_names();
        let fields = self.fields();
        let mut all = true;
        for (name, wanted) in filter.iter() {
            if !names.contains(&name) {
                return Err(SettleError::invalid_config(
                    format!("filter.{name}"),
                    format!("{} configuration has no field '{name}'", self.source()),
                ));
            }
            all &= fields.get(name).is_some_and(|v| v == wanted);
        }
        Ok(all)
    }
}

/// Partial match over download parameters, used to force re-download of a subset.
///
/// Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesFilter {
    /// Exchange instrument code.
    #[serde(default)]
    pub instrument: Option<String>,
    /// Product code (exchange code or granularity letter).
    #[serde(default)]
    pub product: Option<String>,
    /// Market zone.
    #[serde(default)]
    pub zone: Option<String>,
    /// Barchart symbol.
    #[serde(default)]
    pub symbol: Option<String>,
}

impl SeriesFilter {
    /// Filter on the instrument code only.
    pub fn instrument(value: impl Into<String>) -> Self {
        Self {
            instrument: Some(value.into()),
            ..Self::default()
        }
    }

    /// Filter on the symbol only.
    pub fn symbol(value: impl Into<String>) -> Self {
        Self {
            symbol: Some(value.into()),
            ..Self::default()
        }
    }

    fn iter(&self) -> impl Iterator<Item = (&'static str, &String)> {
        [
            ("instrument", self.instrument.as_ref()),
            ("product", self.product.as_ref()),
            ("zone", self.zone.as_ref()),
            ("symbol", self.symbol.as_ref()),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
    }
}

/// One configured series: what to download and how to label it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeriesConfig {
    /// Commodity identity used to build panel keys.
    pub commodity_cfg: CommodityCfg,
    /// Source-specific download parameters.
    pub download_cfg: DownloadCfg,
}

impl SeriesConfig {
    /// Identifier used to overlay user configuration on the defaults.
    #[must_use]
    pub fn id(&self) -> String {
        match &self.download_cfg {
            DownloadCfg::Omip {
                instrument,
                zone,
                product,
                ..
            } => [instrument.as_str(), product.as_str(), zone.as_str()].join(","),
            DownloadCfg::Barchart { symbol, .. } => symbol.clone(),
            DownloadCfg::Eex { instrument, .. } => instrument.clone(),
        }
    }

    /// Validate identifiers and granularities.
    ///
    /// # Errors
    /// Returns `Err(SettleError::InvalidConfig)` naming the first offending field.
    pub fn validate(&self) -> Result<(), SettleError> {
        non_empty("commodity_cfg.commodity", &self.commodity_cfg.commodity)?;
        non_empty("commodity_cfg.instrument", &self.commodity_cfg.instrument)?;
        match &self.download_cfg {
            DownloadCfg::Omip {
                instrument,
                zone,
                product,
                ..
            } => {
                non_empty("download_cfg.instrument", instrument)?;
                non_empty("download_cfg.zone", zone)?;
                non_empty("download_cfg.product", product)?;
            }
            DownloadCfg::Barchart {
                symbol, product, ..
            } => {
                non_empty("download_cfg.symbol", symbol)?;
                if !product.has_offsets() {
                    return Err(SettleError::invalid_config(
                        "download_cfg.product",
                        format!("must be one of YMQDW, got {product}"),
                    ));
                }
            }
            DownloadCfg::Eex {
                instrument,
                product,
            } => {
                non_empty("download_cfg.instrument", instrument)?;
                non_empty("download_cfg.product", product)?;
            }
        }
        Ok(())
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), SettleError> {
    if value.trim().is_empty() {
        return Err(SettleError::invalid_config(field, "must not be empty"));
    }
    Ok(())
}

/// Parse and validate a JSON array of series configurations.
///
/// # Errors
/// Returns `Err(SettleError::InvalidConfig)` if the document does not match the
/// schema or any entry fails validation; the field path names the entry.
pub fn load_series_configs(json: &str) -> Result<Vec<SeriesConfig>, SettleError> {
    let configs: Vec<SeriesConfig> = serde_json::from_str(json).map_err(|e| {
        SettleError::invalid_config(format!("line {} column {}", e.line(), e.column()), e.to_string())
    })?;
    for (i, cfg) in configs.iter().enumerate() {
        cfg.validate().map_err(|e| match e {
            SettleError::InvalidConfig { field, message } => {
                SettleError::invalid_config(format!("[{i}].{field}"), message)
            }
            other => other,
        })?;
    }
    Ok(configs)
}

/// Combine the built-in defaults with user configuration.
///
/// - No user configuration: the defaults.
/// - `use_default == false`: the user configuration alone.
/// - Otherwise: defaults overlaid by user entries with the same [`SeriesConfig::id`];
///   default order is kept and new ids are appended in user order.
#[must_use]
pub fn combine_configs(
    defaults: Vec<SeriesConfig>,
    overrides: Option<Vec<SeriesConfig>>,
    use_default: bool,
) -> Vec<SeriesConfig> {
    let Some(overrides) = overrides else {
        return defaults;
    };
    if !use_default {
        return overrides;
    }
    let mut out = defaults;
    for cfg in overrides {
        let id = cfg.id();
        if let Some(slot) = out.iter_mut().find(|c| c.id() == id) {
            *slot = cfg;
        } else {
            out.push(cfg);
        }
    }
    out
}

/// Runtime settings of a settlement book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Database the book persists into.
    pub database: String,
    /// Recompute continuous prices after every download that brought new rows.
    pub roll_expirations: bool,
    /// Rows before expiry at which contracts are rolled.
    pub roll_offset: usize,
    /// First date to load and download when nothing is stored yet.
    pub history_start: Option<NaiveDate>,
    /// Without a forced download, never go further back than this many years
    /// before the last stored date.
    pub lookback_years: u32,
    /// Number of chunks the business-day range is split into.
    pub download_chunks: usize,
    /// Maximum concurrent per-date fetches inside a chunk.
    pub download_concurrency: usize,
    /// Value type written by the roll pass.
    pub continuous_type: ValueType,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            database: "commodity_data".to_string(),
            roll_expirations: true,
            roll_offset: 0,
            history_start: None,
            lookback_years: 10,
            download_chunks: 20,
            download_concurrency: 4,
            continuous_type: ValueType::AdjClose,
        }
    }
}

impl SettleConfig {
    /// Validate numeric settings.
    ///
    /// # Errors
    /// Returns `Err(SettleError::InvalidConfig)` for empty names or zero-sized
    /// chunking/concurrency.
    pub fn validate(&self) -> Result<(), SettleError> {
        non_empty("database", &self.database)?;
        if self.download_chunks == 0 {
            return Err(SettleError::invalid_config("download_chunks", "must be > 0"));
        }
        if self.download_concurrency == 0 {
            return Err(SettleError::invalid_config(
                "download_concurrency",
                "must be > 0",
            ));
        }
        if matches!(self.continuous_type, ValueType::Close | ValueType::Maturity) {
            return Err(SettleError::invalid_config(
                "continuous_type",
                format!("'{}' is reserved for raw data", self.continuous_type),
            ));
        }
        Ok(())
    }
}
