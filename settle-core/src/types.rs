//! Re-export of foundational types from `settle-types`.
// Consolidated re-exports so downstream crates can depend on `settle-core` only

pub use settle_types::SettleError;
pub use settle_types::{ColumnKey, ContractKey, Dimension, FamilyKey, GroupKey, Product, ValueType};
pub use settle_types::{
    CommodityCfg, DownloadCfg, SeriesConfig, SeriesFilter, SettleConfig, combine_configs,
    load_series_configs,
};
