//! Settle keeps daily settlement prices of commodity futures markets.
//!
//! Overview
//! - A [`SettlementBook`] holds the settlement panel of one market: prices and
//!   maturities of every contract, keyed by offset from the as-of date.
//! - Books download missing business days from a [`SettlementSource`], merge
//!   them into the panel, persist them through a [`SettlementStore`] and
//!   recompute continuous (back-adjusted) prices.
//! - [`Markets`] groups several books and answers cross-market queries.
//!
//! Key behaviors and trade-offs
//! - Downloads are chunked: each chunk of business days is fetched
//!   concurrently, merged and written before the next one starts, so a failure
//!   midway keeps the chunks already stored.
//! - Unforced downloads only fetch dates the book does not hold and never go
//!   further back than `lookback_years` before the last stored date. Forced
//!   downloads fetch everything in range and let fresh values win.
//! - After a roll only the columns whose values changed are written.
//! - A holiday calendar that fails degrades to weekdays only.
//!
//! Examples
//! Building a book and keeping it up to date:
//! ```rust,ignore
//! use std::sync::Arc;
//! use settle::{DownloadMode, SettlementBook};
//!
//! let mut book = SettlementBook::builder()
//!     .source(Arc::new(OmipSource::new(configs)))
//!     .store(Arc::new(store))
//!     .roll_expirations(true)
//!     .build()?;
//! book.load().await?;
//! let days = book.download(None, None, DownloadMode::Missing).await?;
//! ```
//!
//! Querying the front-month continuous price of Spanish baseload power:
//! ```rust,ignore
//! use settle::{Product, XsFilter};
//!
//! let xs = markets.settle_xs(
//!     &XsFilter::default()
//!         .commodity("Power")
//!         .area("ES")
//!         .product(Product::Month)
//!         .offset(1)
//!         .value_type("adj_close"),
//! )?;
//! ```
//!
//! See `settle/examples/` for a runnable end-to-end demonstration.
#![warn(missing_docs)]

/// Holiday calendars and business-day iteration.
pub mod calendar;
pub(crate) mod core;
mod download;
mod markets;

pub use calendar::{NoHolidays, TargetCalendar, business_days, easter_sunday, split_chunks};
pub use core::{SettlementBook, SettlementBookBuilder};
pub use download::DownloadMode;
pub use markets::Markets;

// Re-export core types for convenience
pub use settle_core::{
    Cell, Column, ColumnKey, CommodityCfg, ContinuousOptions, ContractKey, CrossSection,
    Dimension, DownloadCfg, Duration, FamilyKey, GroupKey, HolidayCalendar, Panel, Product,
    Record, RollMethod, Selector, SeriesConfig, SeriesFilter, SettleConfig, SettleError,
    SettlementSource, SettlementStore, SizeSpec, StackedRow, ValueType, XsFilter, add_sizes,
    combine_configs, contract_size, load_series_configs,
};
