//! Match pass over a fetched order book.
//!
//! Item types are independent, so they run through a bounded pool of
//! futures. Results are ranked before they are returned, which keeps the
//! output order independent of completion order.

use std::sync::Arc;

use futures::{stream, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{
    partition_by_type, quote_pair, sort_matches, MarketOrder, MatchResult, Progress, ProgressSink,
    SearchCriteria, TypeId, TypeOrders,
};
use crate::infra::reference::ReferenceCache;

pub const DEFAULT_WORKERS: usize = 8;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("match pass cancelled after {processed} of {total} item types")]
    Cancelled { processed: usize, total: usize },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchReport {
    /// Ranked by profit per jump, then profit.
    pub matches: Vec<MatchResult>,
    /// Item types that had both sell and buy orders.
    pub types_total: usize,
    pub pairs_evaluated: usize,
    /// Pairs dropped because a reference lookup failed.
    pub skipped_pairs: usize,
}

impl MatchReport {
    pub fn is_partial(&self) -> bool {
        self.skipped_pairs > 0
    }
}

#[derive(Default)]
struct TypeOutcome {
    matches: Vec<MatchResult>,
    pairs_evaluated: usize,
    skipped_pairs: usize,
}

pub struct MatchEngine {
    references: Arc<ReferenceCache>,
    workers: usize,
}

impl MatchEngine {
    pub fn new(references: Arc<ReferenceCache>) -> Self {
        Self {
            references,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Number of item types evaluated concurrently.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub async fn run(
        &self,
        orders: &[MarketOrder],
        criteria: &SearchCriteria,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<MatchReport, MatchError> {
        if criteria.multi_trip {
            debug!("multi-trip hauling requested; evaluating single trips");
        }

        let tradeable: Vec<(TypeId, TypeOrders)> = partition_by_type(orders)
            .into_iter()
            .filter(|(_, type_orders)| type_orders.is_tradeable())
            .collect();
        let total = tradeable.len();
        let mut report = MatchReport {
            types_total: total,
            ..MatchReport::default()
        };

        let mut outcomes = stream::iter(tradeable)
            .map(|(type_id, type_orders)| self.match_type(type_id, type_orders, criteria))
            .buffer_unordered(self.workers);

        let mut processed = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(MatchError::Cancelled { processed, total });
                }
                next = outcomes.next() => next,
            };
            let Some(outcome) = next else {
                break;
            };

            processed += 1;
            progress.emit(Progress::Matching { processed, total });
            report.pairs_evaluated += outcome.pairs_evaluated;
            report.skipped_pairs += outcome.skipped_pairs;
            report.matches.extend(outcome.matches);
        }

        sort_matches(&mut report.matches);
        info!(
            types = total,
            pairs = report.pairs_evaluated,
            matches = report.matches.len(),
            skipped = report.skipped_pairs,
            "match pass finished"
        );
        Ok(report)
    }

    async fn match_type(
        &self,
        type_id: TypeId,
        type_orders: TypeOrders,
        criteria: &SearchCriteria,
    ) -> TypeOutcome {
        let pairs = type_orders.pair_count();
        let item = match self.references.item_info(type_id).await {
            Ok(item) => item,
            Err(err) => {
                warn!(type_id, skipped = pairs, error = %err, "item lookup failed; skipping type");
                return TypeOutcome {
                    skipped_pairs: pairs,
                    ..TypeOutcome::default()
                };
            }
        };

        let mut outcome = TypeOutcome {
            pairs_evaluated: pairs,
            ..TypeOutcome::default()
        };

        for sell_order in &type_orders.sell_orders {
            for buy_order in &type_orders.buy_orders {
                let Some(quote) = quote_pair(sell_order, buy_order, item.volume, criteria) else {
                    continue;
                };

                match self
                    .references
                    .jumps(sell_order.system_id, buy_order.system_id)
                    .await
                {
                    Ok(jumps) => outcome.matches.push(MatchResult::new(
                        sell_order,
                        buy_order,
                        item.volume,
                        quote,
                        jumps,
                    )),
                    Err(err) => {
                        warn!(
                            type_id,
                            sell_order = sell_order.order_id,
                            buy_order = buy_order.order_id,
                            error = %err,
                            "route lookup failed; skipping pair"
                        );
                        outcome.skipped_pairs += 1;
                    }
                }
            }
        }

        outcome
    }
}
