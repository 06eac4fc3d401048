//! Read-through cache for universe reference data.
//!
//! - Every lookup checks the disk store first and only then asks the provider.
//! - Concurrent misses on one key share a single provider call.
//! - Corrupted entries are refetched and overwritten.

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use futures::{
    future::{BoxFuture, Shared},
    stream, FutureExt, StreamExt,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{
    jumps_from_route, ItemInfo, LocationId, RegionId, RegionInfo, StationInfo, SystemId,
    SystemInfo, TypeId,
};
use crate::infra::{
    provider::{ProviderError, ReferenceProvider},
    store::{CacheKey, DiskStore, StoreError},
};

/// Region lookups run this many requests at a time when scanning by name.
const REGION_SCAN_CONCURRENCY: usize = 8;

/// Cloneable so that every waiter on a shared fetch receives the same error.
#[derive(Clone, Debug, Error)]
pub enum LookupError {
    #[error("reference lookup {key} failed: {message}")]
    Provider { key: String, message: String },
    #[error("reference payload {key} could not be decoded: {message}")]
    Decode { key: String, message: String },
    #[error("cache maintenance failed: {0}")]
    Store(String),
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Value>, LookupError>>>;

pub struct ReferenceCache {
    provider: Arc<dyn ReferenceProvider>,
    store: DiskStore,
    inflight: Mutex<HashMap<String, (u64, SharedFetch)>>,
    next_flight: AtomicU64,
}

impl ReferenceCache {
    pub fn new(provider: Arc<dyn ReferenceProvider>, store: DiskStore) -> Self {
        Self {
            provider,
            store,
            inflight: Mutex::new(HashMap::new()),
            next_flight: AtomicU64::new(1),
        }
    }

    pub async fn item_info(&self, type_id: TypeId) -> Result<ItemInfo, LookupError> {
        self.lookup(CacheKey::Item(type_id), move |provider| async move {
            provider.get_item(type_id).await
        })
        .await
    }

    pub async fn system_info(&self, system_id: SystemId) -> Result<SystemInfo, LookupError> {
        self.lookup(CacheKey::System(system_id), move |provider| async move {
            provider.get_system(system_id).await
        })
        .await
    }

    pub async fn station_info(&self, station_id: LocationId) -> Result<StationInfo, LookupError> {
        self.lookup(CacheKey::Station(station_id), move |provider| async move {
            provider.get_station(station_id).await
        })
        .await
    }

    /// Travel path from `source` to `destination`, both endpoints included.
    ///
    /// A route inside one system is `[source]` and never reaches the provider.
    pub async fn route_info(
        &self,
        source: SystemId,
        destination: SystemId,
    ) -> Result<Vec<SystemId>, LookupError> {
        if source == destination {
            return Ok(vec![source]);
        }
        self.lookup(CacheKey::Route(source, destination), move |provider| async move {
            provider.get_route(source, destination).await
        })
        .await
    }

    /// Jump count between two systems.
    pub async fn jumps(&self, source: SystemId, destination: SystemId) -> Result<u32, LookupError> {
        let path = self.route_info(source, destination).await?;
        Ok(jumps_from_route(&path))
    }

    pub async fn region_info(&self, region_id: RegionId) -> Result<RegionInfo, LookupError> {
        self.lookup(CacheKey::Region(region_id), move |provider| async move {
            provider.get_region(region_id).await
        })
        .await
    }

    pub async fn region_ids(&self) -> Result<Vec<RegionId>, LookupError> {
        self.lookup(CacheKey::RegionList, |provider| async move {
            provider.get_region_ids().await
        })
        .await
    }

    /// Case-insensitive region lookup by display name.
    pub async fn region_by_name(&self, name: &str) -> Result<Option<RegionInfo>, LookupError> {
        let wanted = name.trim().to_lowercase();
        let ids = self.region_ids().await?;

        let mut regions = stream::iter(ids)
            .map(|id| self.region_info(id))
            .buffered(REGION_SCAN_CONCURRENCY);

        while let Some(region) = regions.next().await {
            let region = region?;
            if region.name.to_lowercase() == wanted {
                return Ok(Some(region));
            }
        }
        Ok(None)
    }

    /// Drop one cached payload so the next lookup refetches it.
    pub fn invalidate(&self, key: CacheKey) -> Result<bool, LookupError> {
        self.store
            .invalidate(&key.to_string())
            .map_err(|err| LookupError::Store(err.to_string()))
    }

    pub fn clear(&self) -> Result<usize, LookupError> {
        self.store
            .clear()
            .map_err(|err| LookupError::Store(err.to_string()))
    }

    async fn lookup<T, F, Fut>(&self, key: CacheKey, fetch: F) -> Result<T, LookupError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(Arc<dyn ReferenceProvider>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>> + Send + 'static,
    {
        let key = key.to_string();

        match self.store.read::<T>(&key) {
            Ok(Some(hit)) => return Ok(hit),
            Ok(None) => {}
            Err(StoreError::Corrupted { reason, .. }) => {
                warn!(key = %key, reason = %reason, "corrupted cache entry; refetching");
            }
            Err(err) => {
                warn!(key = %key, error = %err, "cache read failed; refetching");
            }
        }

        let (flight_id, flight) = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(&key) {
                Some((id, flight)) => {
                    debug!(key = %key, "joining in-flight lookup");
                    (*id, flight.clone())
                }
                None => {
                    // A flight may have stored the value and left since the read above.
                    if let Ok(Some(hit)) = self.store.read::<T>(&key) {
                        return Ok(hit);
                    }
                    let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    let flight = fetch_and_store(
                        self.store.clone(),
                        key.clone(),
                        fetch(Arc::clone(&self.provider)),
                    )
                    .boxed()
                    .shared();
                    inflight.insert(key.clone(), (id, flight.clone()));
                    (id, flight)
                }
            }
        };

        let outcome = flight.await;

        {
            let mut inflight = self.inflight.lock().await;
            if inflight.get(&key).is_some_and(|(id, _)| *id == flight_id) {
                inflight.remove(&key);
            }
        }

        let value = outcome?;
        <T as Deserialize>::deserialize(&*value).map_err(|err| LookupError::Decode {
            key,
            message: err.to_string(),
        })
    }
}

async fn fetch_and_store<T, Fut>(
    store: DiskStore,
    key: String,
    fetch: Fut,
) -> Result<Arc<Value>, LookupError>
where
    T: Serialize,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    debug!(key = %key, "reference cache miss");
    let data = fetch.await.map_err(|err| LookupError::Provider {
        key: key.clone(),
        message: err.to_string(),
    })?;

    let value = serde_json::to_value(&data).map_err(|err| LookupError::Decode {
        key: key.clone(),
        message: err.to_string(),
    })?;

    // A failed write only costs a refetch later.
    if let Err(err) = store.write(&key, &value) {
        warn!(key = %key, error = %err, "failed to persist reference entry");
    }

    Ok(Arc::new(value))
}
