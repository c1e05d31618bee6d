//! Time-series utilities shared by the book and its collaborators.
//!
//! Modules include:
//! - `roll`: splice a front and a next series into one continuous series
//! - `continuous`: apply the roll to every instrument family of a panel
//! - `merge`: fill-only merge of panels and column-level diffs
//! - `util`: null-aware fills, shifts and run detection
/// Continuous-price construction over a whole panel.
pub mod continuous;
/// Merge and diff utilities for panels.
pub mod merge;
/// The contract roll engine.
pub mod roll;
/// Null-aware helpers for `Option` series.
pub mod util;
