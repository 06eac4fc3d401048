//! Sequential pagination over a region's order book.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{MarketOrder, Progress, ProgressSink, RegionId, SearchCriteria};
use crate::infra::{
    provider::OrderBookProvider,
    store::{CacheKey, DiskStore, StoreError},
};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("order fetch cancelled after {pages} page(s)")]
    Cancelled { pages: u32 },
}

/// How pagination ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The provider reported no further pages.
    Complete,
    /// Served from the local snapshot without touching the network.
    Cached,
    /// A page failed or came back empty; everything before it was kept.
    Truncated { page: u32, reason: String },
}

#[derive(Clone, Debug)]
pub struct FetchedOrders {
    pub region_id: RegionId,
    pub orders: Vec<MarketOrder>,
    pub outcome: FetchOutcome,
}

impl FetchedOrders {
    pub fn is_truncated(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Truncated { .. })
    }
}

pub struct OrderFetcher {
    provider: Arc<dyn OrderBookProvider>,
    store: DiskStore,
}

impl OrderFetcher {
    pub fn new(provider: Arc<dyn OrderBookProvider>, store: DiskStore) -> Self {
        Self { provider, store }
    }

    /// Load every order of `criteria.region_id`.
    ///
    /// With `use_cache` a stored snapshot is returned as is. Otherwise pages
    /// are requested one after another from page 1; a failed or empty page
    /// ends pagination and marks the result truncated. Only complete order
    /// books are written back to the store.
    pub async fn fetch_region_orders(
        &self,
        criteria: &SearchCriteria,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<FetchedOrders, FetchError> {
        let region_id = criteria.region_id;
        let key = CacheKey::Market(region_id).to_string();

        if criteria.use_cache {
            if let Some(orders) = self.cached_orders(&key) {
                info!(region_id, orders = orders.len(), "using cached order book");
                progress.emit(Progress::LoadedFromCache {
                    region_id,
                    orders: orders.len(),
                });
                return Ok(FetchedOrders {
                    region_id,
                    orders,
                    outcome: FetchOutcome::Cached,
                });
            }
        }

        let mut orders = Vec::new();
        let mut page = 1;
        let outcome = loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled { pages: page - 1 });
            }

            progress.emit(Progress::FetchingPage { region_id, page });
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled { pages: page - 1 }),
                result = self.provider.get_orders(region_id, page) => result,
            };

            match result {
                Ok(batch) if batch.orders.is_empty() && (batch.has_more || page > 1) => {
                    break FetchOutcome::Truncated {
                        page,
                        reason: "page returned no orders".to_string(),
                    };
                }
                Ok(batch) => {
                    debug!(region_id, page, orders = batch.orders.len(), "fetched order page");
                    orders.extend(batch.orders);
                    if !batch.has_more {
                        break FetchOutcome::Complete;
                    }
                    page += 1;
                }
                Err(err) => {
                    break FetchOutcome::Truncated {
                        page,
                        reason: err.to_string(),
                    };
                }
            }
        };

        match &outcome {
            FetchOutcome::Truncated { page, reason } => {
                warn!(
                    region_id,
                    page,
                    reason = %reason,
                    orders = orders.len(),
                    "order book fetch truncated"
                );
            }
            _ => {
                info!(region_id, pages = page, orders = orders.len(), "fetched order book");
                if criteria.use_cache {
                    if let Err(err) = self.store.write(&key, &orders) {
                        warn!(region_id, error = %err, "failed to cache order book");
                    }
                }
            }
        }

        Ok(FetchedOrders {
            region_id,
            orders,
            outcome,
        })
    }

    fn cached_orders(&self, key: &str) -> Option<Vec<MarketOrder>> {
        match self.store.read::<Vec<MarketOrder>>(key) {
            Ok(Some(orders)) if !orders.is_empty() => Some(orders),
            Ok(_) => None,
            Err(StoreError::Corrupted { reason, .. }) => {
                warn!(key, reason = %reason, "corrupted order book snapshot; refetching");
                None
            }
            Err(err) => {
                warn!(key, error = %err, "failed to read order book snapshot");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    use super::*;
    use crate::infra::provider::{OrderPage, ProviderError};

    /// Serves scripted pages; requests past the script fail.
    struct ScriptedBook {
        pages: Vec<Result<OrderPage, u16>>,
        requested: Mutex<Vec<u32>>,
    }

    impl ScriptedBook {
        fn new(pages: Vec<Result<OrderPage, u16>>) -> Self {
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OrderBookProvider for ScriptedBook {
        async fn get_orders(&self, _region_id: RegionId, page: u32) -> Result<OrderPage, ProviderError> {
            self.requested.lock().unwrap().push(page);
            match self.pages.get(page as usize - 1) {
                Some(Ok(batch)) => Ok(batch.clone()),
                Some(Err(status)) => Err(ProviderError::Api {
                    status: *status,
                    message: "Requested page does not exist!".to_string(),
                }),
                None => Err(ProviderError::Api {
                    status: 404,
                    message: "out of script".to_string(),
                }),
            }
        }
    }

    fn page(first_id: i64, count: i64, has_more: bool) -> OrderPage {
        let orders = (first_id..first_id + count)
            .map(|id| MarketOrder {
                order_id: id,
                type_id: 34,
                is_buy_order: id % 2 == 0,
                price: Decimal::from(5),
                volume_remain: 100,
                location_id: 60003760,
                system_id: 30000142,
                volume_total: Some(100),
                min_volume: Some(1),
                range: Some("region".to_string()),
                duration: Some(90),
                issued: None,
            })
            .collect();
        OrderPage { orders, has_more }
    }

    fn criteria(use_cache: bool) -> SearchCriteria {
        SearchCriteria {
            use_cache,
            ..SearchCriteria::default()
        }
    }

    #[tokio::test]
    async fn failing_third_page_truncates_after_twenty_orders() {
        let dir = tempdir().unwrap();
        let book = Arc::new(ScriptedBook::new(vec![
            Ok(page(1, 10, true)),
            Ok(page(11, 10, true)),
            Err(500),
        ]));
        let fetcher = OrderFetcher::new(book.clone(), DiskStore::open(dir.path()).unwrap());

        let fetched = fetcher
            .fetch_region_orders(&criteria(true), &ProgressSink::disabled(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fetched.orders.len(), 20);
        assert!(fetched.is_truncated());
        assert!(matches!(fetched.outcome, FetchOutcome::Truncated { page: 3, .. }));
        assert_eq!(book.requested(), vec![1, 2, 3]);

        // Partial books are never cached.
        let store = DiskStore::open(dir.path()).unwrap();
        assert!(store.read::<Vec<MarketOrder>>("market-10000002").unwrap().is_none());
    }

    #[tokio::test]
    async fn complete_book_is_cached_and_reused() {
        let dir = tempdir().unwrap();
        let book = Arc::new(ScriptedBook::new(vec![Ok(page(1, 10, true)), Ok(page(11, 5, false))]));
        let fetcher = OrderFetcher::new(book.clone(), DiskStore::open(dir.path()).unwrap());
        let (sink, mut rx) = ProgressSink::channel();

        let first = fetcher
            .fetch_region_orders(&criteria(true), &sink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(first.outcome, FetchOutcome::Complete);
        assert_eq!(first.orders.len(), 15);
        assert_eq!(rx.try_recv().unwrap(), Progress::FetchingPage { region_id: 10000002, page: 1 });
        assert_eq!(rx.try_recv().unwrap(), Progress::FetchingPage { region_id: 10000002, page: 2 });

        let second = fetcher
            .fetch_region_orders(&criteria(true), &sink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(second.outcome, FetchOutcome::Cached);
        assert_eq!(second.orders, first.orders);
        assert_eq!(book.requested(), vec![1, 2]);
    }

    #[tokio::test]
    async fn cache_disabled_always_hits_the_network() {
        let dir = tempdir().unwrap();
        let book = Arc::new(ScriptedBook::new(vec![Ok(page(1, 3, false))]));
        let fetcher = OrderFetcher::new(book.clone(), DiskStore::open(dir.path()).unwrap());

        for _ in 0..2 {
            fetcher
                .fetch_region_orders(&criteria(false), &ProgressSink::disabled(), &CancellationToken::new())
                .await
                .unwrap();
        }
        assert_eq!(book.requested(), vec![1, 1]);
    }

    #[tokio::test]
    async fn empty_page_while_more_promised_is_truncation() {
        let dir = tempdir().unwrap();
        let book = Arc::new(ScriptedBook::new(vec![Ok(page(1, 4, true)), Ok(page(5, 0, true))]));
        let fetcher = OrderFetcher::new(book, DiskStore::open(dir.path()).unwrap());

        let fetched = fetcher
            .fetch_region_orders(&criteria(false), &ProgressSink::disabled(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(fetched.orders.len(), 4);
        assert!(matches!(fetched.outcome, FetchOutcome::Truncated { page: 2, .. }));
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_page() {
        let dir = tempdir().unwrap();
        let book = Arc::new(ScriptedBook::new(vec![Ok(page(1, 4, false))]));
        let fetcher = OrderFetcher::new(book.clone(), DiskStore::open(dir.path()).unwrap());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetcher
            .fetch_region_orders(&criteria(false), &ProgressSink::disabled(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Cancelled { pages: 0 }));
        assert!(book.requested().is_empty());
    }
}
