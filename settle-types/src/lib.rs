//! Settle-specific key model, error type and configuration primitives.
//!
//! - `key`: the compound column key of the settlement panel and its parts.
//! - `error`: the unified [`SettleError`].
//! - `config`: typed, validated instrument configuration and runtime settings.
#![warn(missing_docs)]

mod config;
mod error;
mod key;

pub use config::{
    CommodityCfg, DownloadCfg, SeriesConfig, SeriesFilter, SettleConfig, combine_configs,
    load_series_configs,
};
pub use error::SettleError;
pub use key::{ColumnKey, ContractKey, Dimension, FamilyKey, GroupKey, Product, ValueType};
