//! Sell-to-buy order matching rules and ranking.

use std::{cmp::Ordering, collections::BTreeMap};

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};

use super::entities::{MarketOrder, SearchCriteria, SystemId, TypeId};

/// All orders for one item type, split by side.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeOrders {
    pub sell_orders: Vec<MarketOrder>,
    pub buy_orders: Vec<MarketOrder>,
}

impl TypeOrders {
    /// A type is only worth evaluating when both sides have at least one order.
    pub fn is_tradeable(&self) -> bool {
        !self.sell_orders.is_empty() && !self.buy_orders.is_empty()
    }

    pub fn pair_count(&self) -> usize {
        self.sell_orders.len() * self.buy_orders.len()
    }
}

/// Group orders by type in ascending type id order.
///
/// Orders inside each side keep ascending order id order so the pair
/// traversal is the same no matter how the input was shuffled.
pub fn partition_by_type(orders: &[MarketOrder]) -> BTreeMap<TypeId, TypeOrders> {
    let mut table: BTreeMap<TypeId, TypeOrders> = BTreeMap::new();

    for order in orders {
        let entry = table.entry(order.type_id).or_default();
        if order.is_buy_order {
            entry.buy_orders.push(order.clone());
        } else {
            entry.sell_orders.push(order.clone());
        }
    }

    for entry in table.values_mut() {
        entry.sell_orders.sort_by_key(|o| o.order_id);
        entry.buy_orders.sort_by_key(|o| o.order_id);
    }

    table
}

/// Quantity and money for one accepted sell/buy pair, before routing.
#[derive(Clone, Debug, PartialEq)]
pub struct PairQuote {
    pub move_quantity: u64,
    pub move_volume_total: Decimal,
    pub cost: Decimal,
    pub revenue: Decimal,
    pub profit: Decimal,
}

/// Apply the cargo and profit rules to one pair.
///
/// Returns `None` when the pair cannot beat `criteria.min_profit` or when not
/// a single unit fits in the hold.
pub fn quote_pair(
    sell_order: &MarketOrder,
    buy_order: &MarketOrder,
    item_volume: Decimal,
    criteria: &SearchCriteria,
) -> Option<PairQuote> {
    let move_quantity = cargo_limited_quantity(
        sell_order.volume_remain.min(buy_order.volume_remain),
        item_volume,
        criteria.ship_capacity,
    );
    if move_quantity == 0 {
        return None;
    }

    let quantity = Decimal::from(move_quantity);
    let mut cost = quantity.checked_mul(sell_order.price)?;
    if !criteria.tax_rate_percent.is_zero() {
        cost = cost.checked_mul(Decimal::ONE + criteria.tax_rate_percent / Decimal::ONE_HUNDRED)?;
    }
    let revenue = quantity.checked_mul(buy_order.price)?;
    let profit = revenue - cost;

    if profit <= criteria.min_profit {
        return None;
    }

    Some(PairQuote {
        move_quantity,
        move_volume_total: quantity * item_volume,
        cost,
        revenue,
        profit,
    })
}

/// The order size wins unless it overflows the hold; then the hold wins.
fn cargo_limited_quantity(order_quantity: u64, item_volume: Decimal, capacity: Decimal) -> u64 {
    if capacity <= Decimal::ZERO {
        return 0;
    }
    if item_volume <= Decimal::ZERO {
        return order_quantity;
    }

    let fits = Decimal::from(order_quantity)
        .checked_mul(item_volume)
        .map(|total| total <= capacity)
        .unwrap_or(false);
    if fits {
        return order_quantity;
    }

    (capacity / item_volume)
        .floor()
        .to_u64()
        .unwrap_or(0)
        .min(order_quantity)
}

/// Route paths include both endpoints.
pub fn jumps_from_route(path: &[SystemId]) -> u32 {
    u32::try_from(path.len().saturating_sub(1)).unwrap_or(u32::MAX)
}

/// Same-system hauls count as a single jump for ranking purposes.
pub fn profit_per_jump(profit: Decimal, jumps: u32) -> Decimal {
    if jumps == 0 {
        profit
    } else {
        profit / Decimal::from(jumps)
    }
}

/// A ranked hauling opportunity: buy from `sell_order`, resell into `buy_order`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub type_id: TypeId,
    pub sell_order: MarketOrder,
    pub buy_order: MarketOrder,
    pub item_volume: Decimal,
    pub move_quantity: u64,
    pub move_volume_total: Decimal,
    pub cost: Decimal,
    pub revenue: Decimal,
    pub profit: Decimal,
    pub jumps: u32,
    pub profit_per_jump: Decimal,
}

impl MatchResult {
    pub fn new(
        sell_order: &MarketOrder,
        buy_order: &MarketOrder,
        item_volume: Decimal,
        quote: PairQuote,
        jumps: u32,
    ) -> Self {
        Self {
            type_id: sell_order.type_id,
            sell_order: sell_order.clone(),
            buy_order: buy_order.clone(),
            item_volume,
            move_quantity: quote.move_quantity,
            move_volume_total: quote.move_volume_total,
            cost: quote.cost,
            revenue: quote.revenue,
            profit: quote.profit,
            jumps,
            profit_per_jump: profit_per_jump(quote.profit, jumps),
        }
    }

    /// Both orders sit in the same solar system.
    pub fn is_local(&self) -> bool {
        self.jumps == 0
    }
}

/// Best profit per jump first, then best absolute profit.
pub fn compare_matches(a: &MatchResult, b: &MatchResult) -> Ordering {
    b.profit_per_jump
        .cmp(&a.profit_per_jump)
        .then_with(|| b.profit.cmp(&a.profit))
        .then_with(|| a.type_id.cmp(&b.type_id))
        .then_with(|| a.sell_order.order_id.cmp(&b.sell_order.order_id))
        .then_with(|| a.buy_order.order_id.cmp(&b.buy_order.order_id))
}

pub fn sort_matches(matches: &mut [MatchResult]) {
    matches.sort_by(compare_matches);
}
