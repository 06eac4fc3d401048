//! Market data types and the pure hauling rules.

pub mod entities;
pub mod progress;
pub mod trade_match;

pub use entities::{
    ItemInfo, LocationId, MarketOrder, OrderId, RegionId, RegionInfo, SearchCriteria, StationInfo,
    SystemId, SystemInfo, TypeId,
};
pub use progress::{Progress, ProgressSink};
pub use trade_match::{
    compare_matches, jumps_from_route, partition_by_type, profit_per_jump, quote_pair,
    sort_matches, MatchResult, PairQuote, TypeOrders,
};
