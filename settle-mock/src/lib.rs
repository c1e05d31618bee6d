//! Test doubles for the settle collaborator traits.
//!
//! - [`InMemoryStore`]: a [`settle_core::SettlementStore`] backed by a map of
//!   panels, with write logging and write rejection.
//! - [`FixtureSource`]: a [`settle_core::SettlementSource`] producing
//!   deterministic monthly contracts for every configured series.

mod source;
mod store;

pub use source::{DateBehavior, FixtureSource, fixture_price};
pub use store::{InMemoryStore, WriteRecord};
