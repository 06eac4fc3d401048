//! Seams to the remote order book and reference data.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    ItemInfo, LocationId, MarketOrder, RegionId, RegionInfo, StationInfo, SystemId, SystemInfo,
    TypeId,
};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("unexpected payload: {0}")]
    Decode(String),
}

/// One page of a regional order book.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderPage {
    pub orders: Vec<MarketOrder>,
    /// The provider reported at least one page after this one.
    pub has_more: bool,
}

#[async_trait]
pub trait OrderBookProvider: Send + Sync {
    /// Pages are numbered from 1.
    async fn get_orders(&self, region_id: RegionId, page: u32) -> Result<OrderPage, ProviderError>;
}

#[async_trait]
pub trait ReferenceProvider: Send + Sync {
    async fn get_item(&self, type_id: TypeId) -> Result<ItemInfo, ProviderError>;

    async fn get_system(&self, system_id: SystemId) -> Result<SystemInfo, ProviderError>;

    async fn get_station(&self, station_id: LocationId) -> Result<StationInfo, ProviderError>;

    /// Systems travelled from `source` to `destination`, both endpoints included.
    async fn get_route(
        &self,
        source: SystemId,
        destination: SystemId,
    ) -> Result<Vec<SystemId>, ProviderError>;

    async fn get_region(&self, region_id: RegionId) -> Result<RegionInfo, ProviderError>;

    async fn get_region_ids(&self) -> Result<Vec<RegionId>, ProviderError>;
}
