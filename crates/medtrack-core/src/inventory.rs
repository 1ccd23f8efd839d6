//! # Inventory Status
//!
//! Derives the display status of an inventory item from its stock level,
//! expiry date and the pharmacy's alert thresholds.
//!
//! ## Precedence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  expiry < today                      → EXPIRED        (cannot be sold) │
//! │  quantity == 0                       → OUT_OF_STOCK                    │
//! │  expiry <= today + warning days      → EXPIRING_SOON                   │
//! │  quantity <= low stock threshold     → LOW_STOCK                       │
//! │  otherwise                           → IN_STOCK                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The first matching rule wins, so an expired batch with zero units is
//! reported as EXPIRED, not OUT_OF_STOCK.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{AlertSettings, InventoryItem, InventoryStatus};
use crate::{DEFAULT_EXPIRY_WARNING_DAYS, DEFAULT_LOW_STOCK_THRESHOLD};

/// Alert thresholds used for status derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryThresholds {
    pub low_stock: i64,
    pub expiry_warning_days: i64,
}

impl Default for InventoryThresholds {
    fn default() -> Self {
        InventoryThresholds {
            low_stock: DEFAULT_LOW_STOCK_THRESHOLD,
            expiry_warning_days: DEFAULT_EXPIRY_WARNING_DAYS,
        }
    }
}

impl From<&AlertSettings> for InventoryThresholds {
    fn from(settings: &AlertSettings) -> Self {
        InventoryThresholds {
            low_stock: settings.low_stock_threshold.max(0),
            expiry_warning_days: settings.expiry_warning_days.max(0),
        }
    }
}

/// Derives the status of a stock record.
pub fn derive_status(
    quantity: i64,
    expiry_date: NaiveDate,
    today: NaiveDate,
    thresholds: &InventoryThresholds,
) -> InventoryStatus {
    if expiry_date < today {
        return InventoryStatus::Expired;
    }
    if quantity <= 0 {
        return InventoryStatus::OutOfStock;
    }
    if expiry_date <= today + Duration::days(thresholds.expiry_warning_days) {
        return InventoryStatus::ExpiringSoon;
    }
    if quantity <= thresholds.low_stock {
        return InventoryStatus::LowStock;
    }
    InventoryStatus::InStock
}

/// An inventory item annotated with its derived status.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ItemWithStatus {
    #[serde(flatten)]
    #[ts(flatten)]
    pub item: InventoryItem,
    pub status: InventoryStatus,
    /// Days until expiry; negative once expired.
    pub days_to_expiry: i64,
}

impl ItemWithStatus {
    pub fn new(item: InventoryItem, today: NaiveDate, thresholds: &InventoryThresholds) -> Self {
        let status = derive_status(item.quantity, item.expiry_date, today, thresholds);
        let days_to_expiry = (item.expiry_date - today).num_days();
        ItemWithStatus {
            item,
            status,
            days_to_expiry,
        }
    }
}

/// Annotates a list of items.
pub fn annotate(
    items: Vec<InventoryItem>,
    today: NaiveDate,
    thresholds: &InventoryThresholds,
) -> Vec<ItemWithStatus> {
    items
        .into_iter()
        .map(|item| ItemWithStatus::new(item, today, thresholds))
        .collect()
}

/// Tally of items per derived status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StatusCounts {
    pub in_stock: i64,
    pub low_stock: i64,
    pub out_of_stock: i64,
    pub expiring_soon: i64,
    pub expired: i64,
}

impl StatusCounts {
    pub fn record(&mut self, status: InventoryStatus) {
        match status {
            InventoryStatus::InStock => self.in_stock += 1,
            InventoryStatus::LowStock => self.low_stock += 1,
            InventoryStatus::OutOfStock => self.out_of_stock += 1,
            InventoryStatus::ExpiringSoon => self.expiring_soon += 1,
            InventoryStatus::Expired => self.expired += 1,
        }
    }

    pub fn total(&self) -> i64 {
        self.in_stock + self.low_stock + self.out_of_stock + self.expiring_soon + self.expired
    }

    /// Items that need attention (everything except IN_STOCK).
    pub fn needing_attention(&self) -> i64 {
        self.total() - self.in_stock
    }
}

impl<'a> FromIterator<&'a ItemWithStatus> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = &'a ItemWithStatus>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for entry in iter {
            counts.record(entry.status);
        }
        counts
    }
}

/// Sum of `price * quantity` over the given items.
pub fn stock_value<'a>(items: impl IntoIterator<Item = &'a InventoryItem>) -> Money {
    items.into_iter().map(InventoryItem::stock_value).sum()
}

/// Value of stock on hand, excluding expired batches.
pub fn sellable_stock_value(items: &[ItemWithStatus]) -> Money {
    items
        .iter()
        .filter(|entry| entry.status != InventoryStatus::Expired)
        .map(|entry| entry.item.stock_value())
        .sum()
}

/// Items whose status needs attention, most urgent first.
pub fn alerts(items: Vec<ItemWithStatus>) -> Vec<ItemWithStatus> {
    let mut flagged: Vec<ItemWithStatus> = items
        .into_iter()
        .filter(|entry| entry.status != InventoryStatus::InStock)
        .collect();
    flagged.sort_by(|a, b| {
        urgency(a.status)
            .cmp(&urgency(b.status))
            .then(a.item.expiry_date.cmp(&b.item.expiry_date))
            .then(a.item.name.cmp(&b.item.name))
    });
    flagged
}

fn urgency(status: InventoryStatus) -> u8 {
    match status {
        InventoryStatus::Expired => 0,
        InventoryStatus::OutOfStock => 1,
        InventoryStatus::ExpiringSoon => 2,
        InventoryStatus::LowStock => 3,
        InventoryStatus::InStock => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn item(name: &str, quantity: i64, price_cents: i64, expiry: NaiveDate) -> InventoryItem {
        InventoryItem {
            id: name.to_lowercase(),
            pharmacy_id: "ph".to_string(),
            name: name.to_string(),
            batch: "B-1".to_string(),
            category: "General".to_string(),
            quantity,
            price_cents,
            expiry_date: expiry,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_precedence() {
        let today = date(2026, 6, 1);
        let t = InventoryThresholds::default();

        assert_eq!(derive_status(0, date(2026, 5, 31), today, &t), InventoryStatus::Expired);
        assert_eq!(derive_status(0, date(2027, 1, 1), today, &t), InventoryStatus::OutOfStock);
        assert_eq!(derive_status(3, date(2026, 6, 20), today, &t), InventoryStatus::ExpiringSoon);
        assert_eq!(derive_status(3, date(2027, 1, 1), today, &t), InventoryStatus::LowStock);
        assert_eq!(derive_status(50, date(2027, 1, 1), today, &t), InventoryStatus::InStock);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let today = date(2026, 6, 1);
        let t = InventoryThresholds {
            low_stock: 10,
            expiry_warning_days: 30,
        };

        // Expires today: still sellable, but expiring.
        assert_eq!(derive_status(50, today, today, &t), InventoryStatus::ExpiringSoon);
        assert_eq!(derive_status(50, date(2026, 7, 1), today, &t), InventoryStatus::ExpiringSoon);
        assert_eq!(derive_status(50, date(2026, 7, 2), today, &t), InventoryStatus::InStock);
        assert_eq!(derive_status(10, date(2027, 1, 1), today, &t), InventoryStatus::LowStock);
        assert_eq!(derive_status(11, date(2027, 1, 1), today, &t), InventoryStatus::InStock);
    }

    #[test]
    fn test_thresholds_from_settings() {
        let mut settings = AlertSettings::defaults("ph");
        settings.low_stock_threshold = 25;
        settings.expiry_warning_days = -3;
        let t = InventoryThresholds::from(&settings);
        assert_eq!(t.low_stock, 25);
        assert_eq!(t.expiry_warning_days, 0);
    }

    #[test]
    fn test_counts_value_and_alerts() {
        let today = date(2026, 6, 1);
        let t = InventoryThresholds::default();
        let annotated = annotate(
            vec![
                item("Zinc", 100, 100, date(2028, 1, 1)),
                item("Aspirin", 5, 200, date(2028, 1, 1)),
                item("Cough Syrup", 20, 500, date(2026, 1, 1)),
                item("Insulin", 0, 3000, date(2027, 1, 1)),
                item("Vitamin C", 40, 50, date(2026, 6, 10)),
            ],
            today,
            &t,
        );

        let counts: StatusCounts = annotated.iter().collect();
        assert_eq!(counts.total(), 5);
        assert_eq!(counts.in_stock, 1);
        assert_eq!(counts.needing_attention(), 4);

        // Zinc 100*100 + Aspirin 5*200 + Vitamin C 40*50; expired syrup excluded.
        assert_eq!(sellable_stock_value(&annotated).cents(), 10_000 + 1_000 + 2_000);
        assert_eq!(stock_value(annotated.iter().map(|e| &e.item)).cents(), 13_000 + 10_000);

        let names: Vec<String> = alerts(annotated).into_iter().map(|e| e.item.name).collect();
        assert_eq!(names, vec!["Cough Syrup", "Insulin", "Vitamin C", "Aspirin"]);
    }

    #[test]
    fn test_days_to_expiry() {
        let today = date(2026, 6, 1);
        let entry = ItemWithStatus::new(item("A", 1, 1, date(2026, 5, 30)), today, &InventoryThresholds::default());
        assert_eq!(entry.days_to_expiry, -2);
    }
}
