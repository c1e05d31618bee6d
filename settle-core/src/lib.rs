//! settle-core
//!
//! Core types, traits, and algorithms shared across the settle ecosystem.
//!
//! - `types`: keys, configuration and the error type re-exported from `settle-types`.
//! - `panel`: the date-indexed settlement panel.
//! - `offsets`: offsets between as-of dates and maturities.
//! - `pivot`: long records from data sources into a panel.
//! - `connector`: the store and source traits implemented by collaborators.
//! - `timeseries`: roll engine, continuous prices, merge and diff.
//! - `query`: cross-section selection over a panel.
//! - `sizing`: contract sizes from delivery periods.
#![warn(missing_docs)]

/// Persistence and data-source traits.
pub mod connector;
/// Offset calculation between as-of dates and maturities.
pub mod offsets;
pub mod panel;
/// Pivoting long records into a panel.
pub mod pivot;
/// Cross-section queries.
pub mod query;
/// Contract sizes.
pub mod sizing;
/// Time-series utilities: rolling, continuous prices, merge and diff.
pub mod timeseries;
pub mod types;

pub use connector::{HolidayCalendar, SettlementSource, SettlementStore};
pub use offsets::{CalendarDate, delivery_code, maturity_for, monday_of, offset, offset_for_code};
pub use panel::{Cell, Column, Panel, StackedRow};
pub use pivot::{Record, pivot_records};
pub use query::{CrossSection, Selector, XsFilter, settle_xs};
pub use sizing::{Duration, SizeSpec, add_sizes, contract_size};
pub use timeseries::continuous::{ContinuousOptions, RollMethod, build_continuous_prices};
pub use timeseries::merge::{diff_columns, merge, update_panel};
pub use timeseries::roll::{RolledSeries, roll, roll_cumulative, roll_detailed};
pub use types::*;
