//! Thin asynchronous client for the public EVE Swagger Interface (ESI).
//!
//! - Implements both provider seams: regional order books and universe data.
//! - Uses only unauthenticated endpoints.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::debug;

use crate::domain::{
    ItemInfo, LocationId, MarketOrder, RegionId, RegionInfo, StationInfo, SystemId, SystemInfo,
    TypeId,
};
use crate::infra::provider::{OrderBookProvider, OrderPage, ProviderError, ReferenceProvider};
use crate::util::version::user_agent;

pub const DEFAULT_BASE_URL: &str = "https://esi.evetech.net/latest/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DATASOURCE: &str = "tranquility";
const PAGES_HEADER: &str = "x-pages";

#[derive(Clone)]
pub struct EsiClient {
    http: Client,
    base_url: Url,
}

impl EsiClient {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(DEFAULT_BASE_URL, DEFAULT_TIMEOUT, None)
    }

    /// `contact` is appended to the user agent so ESI operators can reach out.
    pub fn with_base_url(
        base: &str,
        timeout: Duration,
        contact: Option<&str>,
    ) -> Result<Self, ProviderError> {
        let base_url = Url::parse(base)?;
        let http = Client::builder()
            .user_agent(user_agent(contact))
            .timeout(timeout)
            .build()?;
        Ok(Self { http, base_url })
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ProviderError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorDto>(&body)
            .map(|dto| dto.error)
            .unwrap_or(body);
        Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch_data<T>(&self, path: &str) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        debug!(%url, "requesting ESI resource");
        let response = self.send(self.http.get(url).query(&[("datasource", DATASOURCE)])).await?;
        Ok(response.json().await?)
    }

    fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }
}

#[async_trait]
impl OrderBookProvider for EsiClient {
    async fn get_orders(&self, region_id: RegionId, page: u32) -> Result<OrderPage, ProviderError> {
        let url = self.url(&format!("markets/{region_id}/orders/"))?;
        let page_param = page.to_string();
        let response = self
            .send(self.http.get(url).query(&[
                ("datasource", DATASOURCE),
                ("order_type", "all"),
                ("page", page_param.as_str()),
            ]))
            .await?;

        let total_pages = response
            .headers()
            .get(PAGES_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u32>().ok());
        let dtos: Vec<OrderDto> = response.json().await?;

        // Without the header keep paging until the provider stops answering.
        let has_more = total_pages.map_or(!dtos.is_empty(), |total| page < total);
        Ok(OrderPage {
            orders: dtos.into_iter().map(MarketOrder::from).collect(),
            has_more,
        })
    }
}

#[async_trait]
impl ReferenceProvider for EsiClient {
    async fn get_item(&self, type_id: TypeId) -> Result<ItemInfo, ProviderError> {
        let dto: TypeDto = self.fetch_data(&format!("universe/types/{type_id}/")).await?;
        Ok(dto.into())
    }

    async fn get_system(&self, system_id: SystemId) -> Result<SystemInfo, ProviderError> {
        let dto: SystemDto = self
            .fetch_data(&format!("universe/systems/{system_id}/"))
            .await?;
        Ok(dto.into())
    }

    async fn get_station(&self, station_id: LocationId) -> Result<StationInfo, ProviderError> {
        // Player structures live above the station id range and need auth.
        if i32::try_from(station_id).is_err() {
            return Err(ProviderError::Api {
                status: 403,
                message: format!("location {station_id} is a player structure"),
            });
        }
        let dto: StationDto = self
            .fetch_data(&format!("universe/stations/{station_id}/"))
            .await?;
        Ok(dto.into())
    }

    async fn get_route(
        &self,
        source: SystemId,
        destination: SystemId,
    ) -> Result<Vec<SystemId>, ProviderError> {
        let path: Vec<SystemId> = self
            .fetch_data(&format!("route/{source}/{destination}/"))
            .await?;
        if path.is_empty() {
            return Err(ProviderError::Decode(format!(
                "empty route from {source} to {destination}"
            )));
        }
        Ok(path)
    }

    async fn get_region(&self, region_id: RegionId) -> Result<RegionInfo, ProviderError> {
        let dto: RegionDto = self
            .fetch_data(&format!("universe/regions/{region_id}/"))
            .await?;
        Ok(dto.into())
    }

    async fn get_region_ids(&self) -> Result<Vec<RegionId>, ProviderError> {
        self.fetch_data("universe/regions/").await
    }
}

#[derive(Debug, Deserialize)]
struct ErrorDto {
    error: String,
}

#[derive(Debug, Deserialize)]
struct OrderDto {
    order_id: i64,
    type_id: i32,
    is_buy_order: bool,
    price: Decimal,
    volume_remain: u64,
    location_id: i64,
    system_id: i32,
    #[serde(default)]
    volume_total: Option<u64>,
    #[serde(default)]
    min_volume: Option<u64>,
    #[serde(default)]
    range: Option<String>,
    #[serde(default)]
    duration: Option<u32>,
    #[serde(default)]
    issued: Option<String>,
}

impl From<OrderDto> for MarketOrder {
    fn from(dto: OrderDto) -> Self {
        Self {
            order_id: dto.order_id,
            type_id: dto.type_id,
            is_buy_order: dto.is_buy_order,
            price: dto.price,
            volume_remain: dto.volume_remain,
            location_id: dto.location_id,
            system_id: dto.system_id,
            volume_total: dto.volume_total,
            min_volume: dto.min_volume,
            range: dto.range,
            duration: dto.duration,
            issued: dto.issued.as_deref().and_then(parse_timestamp_str),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TypeDto {
    type_id: i32,
    name: String,
    #[serde(default)]
    volume: Option<Decimal>,
    #[serde(default)]
    packaged_volume: Option<Decimal>,
    #[serde(default)]
    group_id: Option<i32>,
}

impl From<TypeDto> for ItemInfo {
    fn from(dto: TypeDto) -> Self {
        Self {
            type_id: dto.type_id,
            name: dto.name,
            volume: dto.volume.unwrap_or(Decimal::ZERO),
            packaged_volume: dto.packaged_volume,
            group_id: dto.group_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SystemDto {
    system_id: i32,
    name: String,
    #[serde(default)]
    security_status: Option<f64>,
    #[serde(default)]
    constellation_id: Option<i32>,
}

impl From<SystemDto> for SystemInfo {
    fn from(dto: SystemDto) -> Self {
        Self {
            system_id: dto.system_id,
            name: dto.name,
            security_status: dto.security_status,
            constellation_id: dto.constellation_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StationDto {
    station_id: i64,
    name: String,
    system_id: i32,
}

impl From<StationDto> for StationInfo {
    fn from(dto: StationDto) -> Self {
        Self {
            station_id: dto.station_id,
            name: dto.name,
            system_id: dto.system_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegionDto {
    region_id: i32,
    name: String,
    #[serde(default)]
    constellations: Vec<i32>,
}

impl From<RegionDto> for RegionInfo {
    fn from(dto: RegionDto) -> Self {
        Self {
            region_id: dto.region_id,
            name: dto.name,
            constellations: dto.constellations,
        }
    }
}

fn parse_timestamp_str(raw: &str) -> Option<SystemTime> {
    let dt = OffsetDateTime::parse(raw, &Rfc3339).ok()?;
    let secs = u64::try_from(dt.unix_timestamp()).ok()?;
    SystemTime::UNIX_EPOCH
        .checked_add(Duration::from_secs(secs))
        .and_then(|time| time.checked_add(Duration::from_nanos(u64::from(dt.nanosecond()))))
}
