use std::time::SystemTime;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Item type identifier used by the market and universe endpoints.
pub type TypeId = i32;
pub type SystemId = i32;
pub type RegionId = i32;
/// Stations and player structures share one id space; structure ids exceed `i32`.
pub type LocationId = i64;
pub type OrderId = i64;

/// One standing order from a regional order book snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketOrder {
    pub order_id: OrderId,
    pub type_id: TypeId,
    pub is_buy_order: bool,
    pub price: Decimal,
    pub volume_remain: u64,
    pub location_id: LocationId,
    pub system_id: SystemId,
    #[serde(default)]
    pub volume_total: Option<u64>,
    #[serde(default)]
    pub min_volume: Option<u64>,
    /// Buy order reach ("station", "region", "solarsystem" or a jump count).
    #[serde(default)]
    pub range: Option<String>,
    /// Order lifetime in days.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub issued: Option<SystemTime>,
}

/// Item type details from the universe endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub type_id: TypeId,
    pub name: String,
    /// Assembled volume in m³.
    pub volume: Decimal,
    #[serde(default)]
    pub packaged_volume: Option<Decimal>,
    #[serde(default)]
    pub group_id: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub system_id: SystemId,
    pub name: String,
    #[serde(default)]
    pub security_status: Option<f64>,
    #[serde(default)]
    pub constellation_id: Option<i32>,
}

impl SystemInfo {
    /// Security status rounded the way the game client displays it.
    pub fn display_security(&self) -> Option<f64> {
        self.security_status.map(|sec| (sec * 10.0).round() / 10.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StationInfo {
    pub station_id: LocationId,
    pub name: String,
    pub system_id: SystemId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub region_id: RegionId,
    pub name: String,
    #[serde(default)]
    pub constellations: Vec<i32>,
}

/// Parameters for one hauling search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub region_id: RegionId,
    /// Matches must beat this profit strictly.
    pub min_profit: Decimal,
    /// Cargo hold size in m³.
    pub ship_capacity: Decimal,
    /// Applied as a surcharge on the purchase cost.
    pub tax_rate_percent: Decimal,
    /// Accepted for compatibility; matching is single-trip only.
    #[serde(default)]
    pub multi_trip: bool,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

fn default_use_cache() -> bool {
    true
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            // The Forge
            region_id: 10000002,
            min_profit: Decimal::from(1_000_000),
            ship_capacity: Decimal::from(2_500),
            tax_rate_percent: Decimal::ZERO,
            multi_trip: false,
            use_cache: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_is_rounded_to_one_decimal() {
        let system = SystemInfo {
            system_id: 30000142,
            name: "Jita".to_string(),
            security_status: Some(0.945913),
            constellation_id: None,
        };
        assert_eq!(system.display_security(), Some(0.9));
    }

    #[test]
    fn criteria_without_cache_flag_defaults_to_cached() {
        let raw = r#"{
            "region_id": 10000043,
            "min_profit": "500",
            "ship_capacity": "60000",
            "tax_rate_percent": "0"
        }"#;
        let criteria: SearchCriteria = serde_json::from_str(raw).unwrap();
        assert!(criteria.use_cache);
        assert!(!criteria.multi_trip);
        assert_eq!(criteria.region_id, 10000043);
    }
}
