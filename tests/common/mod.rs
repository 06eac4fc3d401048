//! In-memory universe and order book shared by the integration tests.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tempfile::TempDir;

use haul_scanner::{
    domain::{
        ItemInfo, LocationId, MarketOrder, OrderId, RegionId, RegionInfo, StationInfo, SystemId,
        SystemInfo, TypeId,
    },
    infra::{
        provider::{OrderBookProvider, OrderPage, ProviderError, ReferenceProvider},
        reference::ReferenceCache,
        store::DiskStore,
    },
};

pub const JITA: SystemId = 30000142;
pub const PERIMETER: SystemId = 30000144;
pub const AMARR: SystemId = 30002187;
pub const ISOLATED: SystemId = 30009999;

#[derive(Default)]
pub struct FakeUniverse {
    items: HashMap<TypeId, ItemInfo>,
    failing_items: HashSet<TypeId>,
    routes: HashMap<(SystemId, SystemId), Vec<SystemId>>,
    item_delay: Option<Duration>,
    item_calls: AtomicUsize,
    route_calls: AtomicUsize,
}

impl FakeUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, type_id: TypeId, name: &str, volume: Decimal) -> Self {
        self.items.insert(
            type_id,
            ItemInfo {
                type_id,
                name: name.to_string(),
                volume,
                packaged_volume: None,
                group_id: None,
            },
        );
        self
    }

    /// Every item lookup sleeps this long before answering.
    pub fn with_item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = Some(delay);
        self
    }

    pub fn with_failing_item(mut self, type_id: TypeId) -> Self {
        self.failing_items.insert(type_id);
        self
    }

    /// Register `source -> destination` as a path with `jumps` hops.
    pub fn with_route(mut self, source: SystemId, destination: SystemId, jumps: u32) -> Self {
        let mut path = vec![source];
        path.extend((1..jumps).map(|hop| 31000000 + hop as SystemId));
        path.push(destination);
        self.routes.insert((source, destination), path);
        self
    }

    pub fn item_calls(&self) -> usize {
        self.item_calls.load(Ordering::SeqCst)
    }

    pub fn route_calls(&self) -> usize {
        self.route_calls.load(Ordering::SeqCst)
    }
}

fn not_found(what: &str) -> ProviderError {
    ProviderError::Api {
        status: 404,
        message: format!("{what} not found"),
    }
}

#[async_trait]
impl ReferenceProvider for FakeUniverse {
    async fn get_item(&self, type_id: TypeId) -> Result<ItemInfo, ProviderError> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.item_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_items.contains(&type_id) {
            return Err(ProviderError::Api {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        self.items.get(&type_id).cloned().ok_or_else(|| not_found("type"))
    }

    async fn get_system(&self, system_id: SystemId) -> Result<SystemInfo, ProviderError> {
        Ok(SystemInfo {
            system_id,
            name: format!("system {system_id}"),
            security_status: Some(0.9),
            constellation_id: None,
        })
    }

    async fn get_station(&self, station_id: LocationId) -> Result<StationInfo, ProviderError> {
        Ok(StationInfo {
            station_id,
            name: format!("station {station_id}"),
            system_id: (station_id / 10) as SystemId,
        })
    }

    async fn get_route(
        &self,
        source: SystemId,
        destination: SystemId,
    ) -> Result<Vec<SystemId>, ProviderError> {
        self.route_calls.fetch_add(1, Ordering::SeqCst);
        self.routes
            .get(&(source, destination))
            .cloned()
            .ok_or_else(|| not_found("route"))
    }

    async fn get_region(&self, region_id: RegionId) -> Result<RegionInfo, ProviderError> {
        Ok(RegionInfo {
            region_id,
            name: "The Forge".to_string(),
            constellations: Vec::new(),
        })
    }

    async fn get_region_ids(&self) -> Result<Vec<RegionId>, ProviderError> {
        Ok(vec![10000002])
    }
}

/// Order book served from fixed pages.
pub struct StaticBook {
    pages: Vec<Vec<MarketOrder>>,
}

impl StaticBook {
    pub fn new(pages: Vec<Vec<MarketOrder>>) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl OrderBookProvider for StaticBook {
    async fn get_orders(&self, _region_id: RegionId, page: u32) -> Result<OrderPage, ProviderError> {
        let index = page as usize - 1;
        let orders = self.pages.get(index).cloned().ok_or_else(|| not_found("page"))?;
        Ok(OrderPage {
            orders,
            has_more: index + 1 < self.pages.len(),
        })
    }
}

pub fn sell(order_id: OrderId, type_id: TypeId, price: Decimal, volume: u64, system_id: SystemId) -> MarketOrder {
    order(order_id, type_id, false, price, volume, system_id)
}

pub fn buy(order_id: OrderId, type_id: TypeId, price: Decimal, volume: u64, system_id: SystemId) -> MarketOrder {
    order(order_id, type_id, true, price, volume, system_id)
}

fn order(
    order_id: OrderId,
    type_id: TypeId,
    is_buy_order: bool,
    price: Decimal,
    volume_remain: u64,
    system_id: SystemId,
) -> MarketOrder {
    MarketOrder {
        order_id,
        type_id,
        is_buy_order,
        price,
        volume_remain,
        location_id: system_id as LocationId * 10,
        system_id,
        volume_total: Some(volume_remain),
        min_volume: Some(1),
        range: Some("region".to_string()),
        duration: Some(90),
        issued: None,
    }
}

/// Reference cache over `universe` backed by a fresh temp directory.
pub fn reference_cache(universe: Arc<FakeUniverse>) -> (Arc<ReferenceCache>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = DiskStore::open(dir.path()).unwrap();
    (Arc::new(ReferenceCache::new(universe, store)), dir)
}
