//! Finds profitable station trading hauls inside one EVE Online market region.
//!
//! The pipeline is fetch then match: [`infra::orders::OrderFetcher`] pages
//! through the regional order book, and [`engine::MatchEngine`] pairs sell
//! orders with buy orders of the same item, consulting the
//! [`infra::reference::ReferenceCache`] for item volumes and route lengths.

pub mod domain;
pub mod engine;
pub mod infra;
pub mod util;
