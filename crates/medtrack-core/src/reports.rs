//! # Reports
//!
//! Aggregations behind the reports screens. The database layer loads the
//! sales and expenses of a [`DateRange`]; everything here is arithmetic
//! and grouping over those rows.
//!
//! ## Report Types
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  profit_and_loss   revenue − expenses, margin, expense breakdown       │
//! │  sales_by_period   buckets: 2026-03-14 | 2026-W11 | 2026-03            │
//! │  top_items         units and revenue per item, best sellers first      │
//! │  inventory_report  stock value, status counts, per-category stock      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dates are UTC calendar days. A range is inclusive on both ends.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::inventory::{sellable_stock_value, stock_value, ItemWithStatus, StatusCounts};
use crate::money::Money;
use crate::types::{Expense, ReportPeriod, SaleDetail};
use crate::validation::{parse_date, ValidationResult};

/// Days covered by a range when the caller gives no bounds.
pub const DEFAULT_RANGE_DAYS: i64 = 30;

// =============================================================================
// Date Range
// =============================================================================

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DateRange {
    #[ts(as = "String")]
    pub from: NaiveDate,
    #[ts(as = "String")]
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> ValidationResult<Self> {
        if from > to {
            return Err(ValidationError::InvalidFormat {
                field: "from".to_string(),
                reason: "must not be after 'to'".to_string(),
            });
        }
        Ok(DateRange { from, to })
    }

    /// The last [`DEFAULT_RANGE_DAYS`] days, ending today.
    pub fn last_days(today: NaiveDate) -> Self {
        DateRange {
            from: today - Duration::days(DEFAULT_RANGE_DAYS - 1),
            to: today,
        }
    }

    /// Builds a range from optional `YYYY-MM-DD` query parameters.
    ///
    /// A missing `to` means today; a missing `from` means 30 days back
    /// from `to`.
    ///
    /// ```rust
    /// use chrono::NaiveDate;
    /// use medtrack_core::reports::DateRange;
    ///
    /// let today = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
    /// let range = DateRange::parse(None, None, today).unwrap();
    /// assert_eq!(range.from.to_string(), "2026-03-02");
    /// assert_eq!(range.days(), 30);
    ///
    /// assert!(DateRange::parse(Some("2026-03-10"), Some("2026-03-01"), today).is_err());
    /// ```
    pub fn parse(from: Option<&str>, to: Option<&str>, today: NaiveDate) -> ValidationResult<Self> {
        let to = match to.filter(|s| !s.trim().is_empty()) {
            Some(value) => parse_date("to", value)?,
            None => today,
        };
        let from = match from.filter(|s| !s.trim().is_empty()) {
            Some(value) => parse_date("from", value)?,
            None => to - Duration::days(DEFAULT_RANGE_DAYS - 1),
        };
        DateRange::new(from, to)
    }

    /// Number of calendar days covered.
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }

    /// First instant of `from`.
    pub fn start(&self) -> DateTime<Utc> {
        self.from.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// First instant after `to`; use as an exclusive upper bound.
    pub fn end_exclusive(&self) -> DateTime<Utc> {
        (self.to + Duration::days(1)).and_time(chrono::NaiveTime::MIN).and_utc()
    }
}

// =============================================================================
// Profit & Loss
// =============================================================================

/// Amount attributed to one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategoryTotal {
    pub category: String,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProfitAndLoss {
    pub range: DateRange,
    pub revenue_cents: i64,
    pub expenses_cents: i64,
    pub net_cents: i64,
    /// Net over revenue in basis points; 0 when there was no revenue.
    pub margin_bps: i64,
    pub sale_count: i64,
    pub units_sold: i64,
    pub revenue_by_category: Vec<CategoryTotal>,
    pub expenses_by_category: Vec<CategoryTotal>,
}

impl ProfitAndLoss {
    pub fn net(&self) -> Money {
        Money::from_cents(self.net_cents)
    }
}

/// Computes profit and loss over rows already filtered to `range`.
pub fn profit_and_loss(range: DateRange, sales: &[SaleDetail], expenses: &[Expense]) -> ProfitAndLoss {
    let revenue: Money = sales.iter().map(SaleDetail::total).sum();
    let spent: Money = expenses.iter().map(Expense::amount).sum();
    let net = revenue - spent;

    ProfitAndLoss {
        range,
        revenue_cents: revenue.cents(),
        expenses_cents: spent.cents(),
        net_cents: net.cents(),
        margin_bps: net.ratio_bps(revenue),
        sale_count: sales.len() as i64,
        units_sold: sales.iter().fold(0i64, |acc, s| acc.saturating_add(s.quantity)),
        revenue_by_category: group_totals(sales.iter().map(|s| (s.category.as_str(), s.total_price_cents))),
        expenses_by_category: group_totals(expenses.iter().map(|e| (e.category.as_str(), e.amount_cents))),
    }
}

/// Sums amounts per category, largest first.
fn group_totals<'a>(rows: impl Iterator<Item = (&'a str, i64)>) -> Vec<CategoryTotal> {
    let mut totals: HashMap<&str, i64> = HashMap::new();
    for (category, cents) in rows {
        let total = totals.entry(category).or_default();
        *total = total.saturating_add(cents);
    }

    let mut out: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, amount_cents)| CategoryTotal {
            category: category.to_string(),
            amount_cents,
        })
        .collect();
    out.sort_by(|a, b| b.amount_cents.cmp(&a.amount_cents).then_with(|| a.category.cmp(&b.category)));
    out
}

// =============================================================================
// Sales by Period
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PeriodBucket {
    /// `YYYY-MM-DD`, `YYYY-Www` or `YYYY-MM` depending on the period.
    pub key: String,
    pub revenue_cents: i64,
    pub units: i64,
    pub transactions: i64,
}

/// Bucket key of a date.
///
/// ```rust
/// use chrono::NaiveDate;
/// use medtrack_core::reports::period_key;
/// use medtrack_core::ReportPeriod;
///
/// let d = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
/// assert_eq!(period_key(d, ReportPeriod::Daily), "2026-01-01");
/// assert_eq!(period_key(d, ReportPeriod::Weekly), "2026-W01");
/// assert_eq!(period_key(d, ReportPeriod::Monthly), "2026-01");
/// ```
pub fn period_key(date: NaiveDate, period: ReportPeriod) -> String {
    match period {
        ReportPeriod::Daily => date.format("%Y-%m-%d").to_string(),
        ReportPeriod::Weekly => {
            let week = date.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        ReportPeriod::Monthly => date.format("%Y-%m").to_string(),
    }
}

/// Groups sales into period buckets, ascending by key. Periods without
/// sales are omitted.
pub fn sales_by_period(sales: &[SaleDetail], period: ReportPeriod) -> Vec<PeriodBucket> {
    let mut buckets: BTreeMap<String, PeriodBucket> = BTreeMap::new();

    for sale in sales {
        let key = period_key(sale.created_at.date_naive(), period);
        let bucket = buckets.entry(key.clone()).or_insert_with(|| PeriodBucket {
            key,
            revenue_cents: 0,
            units: 0,
            transactions: 0,
        });
        bucket.revenue_cents = bucket.revenue_cents.saturating_add(sale.total_price_cents);
        bucket.units = bucket.units.saturating_add(sale.quantity);
        bucket.transactions += 1;
    }

    buckets.into_values().collect()
}

// =============================================================================
// Top Items
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TopItem {
    pub item_id: String,
    pub item_name: String,
    pub units: i64,
    pub revenue_cents: i64,
}

/// Best sellers by revenue, ties broken by name.
pub fn top_items(sales: &[SaleDetail], limit: usize) -> Vec<TopItem> {
    let mut by_item: HashMap<&str, TopItem> = HashMap::new();

    for sale in sales {
        let entry = by_item.entry(sale.item_id.as_str()).or_insert_with(|| TopItem {
            item_id: sale.item_id.clone(),
            item_name: sale.item_name.clone(),
            units: 0,
            revenue_cents: 0,
        });
        entry.units = entry.units.saturating_add(sale.quantity);
        entry.revenue_cents = entry.revenue_cents.saturating_add(sale.total_price_cents);
    }

    let mut items: Vec<TopItem> = by_item.into_values().collect();
    items.sort_by(|a, b| {
        b.revenue_cents
            .cmp(&a.revenue_cents)
            .then_with(|| a.item_name.cmp(&b.item_name))
    });
    items.truncate(limit);
    items
}

// =============================================================================
// Inventory Report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategoryStock {
    pub category: String,
    pub items: i64,
    pub units: i64,
    pub value_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InventoryReport {
    pub total_items: i64,
    pub total_units: i64,
    /// Value of all units on hand, expired batches included.
    pub stock_value_cents: i64,
    /// Value excluding expired batches.
    pub sellable_value_cents: i64,
    pub counts: StatusCounts,
    pub by_category: Vec<CategoryStock>,
}

pub fn inventory_report(items: &[ItemWithStatus]) -> InventoryReport {
    let mut categories: BTreeMap<&str, CategoryStock> = BTreeMap::new();
    for entry in items {
        let stock = categories
            .entry(entry.item.category.as_str())
            .or_insert_with(|| CategoryStock {
                category: entry.item.category.clone(),
                items: 0,
                units: 0,
                value_cents: 0,
            });
        stock.items += 1;
        stock.units = stock.units.saturating_add(entry.item.quantity);
        stock.value_cents = (Money::from_cents(stock.value_cents) + entry.item.stock_value()).cents();
    }

    let total_value = stock_value(items.iter().map(|e| &e.item));

    InventoryReport {
        total_items: items.len() as i64,
        total_units: items.iter().fold(0i64, |acc, e| acc.saturating_add(e.item.quantity)),
        stock_value_cents: total_value.cents(),
        sellable_value_cents: sellable_stock_value(items).cents(),
        counts: items.iter().collect(),
        by_category: categories.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{annotate, InventoryThresholds};
    use crate::types::InventoryItem;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sale(item: &str, category: &str, qty: i64, cents: i64, at: DateTime<Utc>) -> SaleDetail {
        SaleDetail {
            id: format!("{}-{}", item, at.timestamp()),
            item_id: item.to_lowercase(),
            item_name: item.to_string(),
            category: category.to_string(),
            quantity: qty,
            total_price_cents: cents,
            user_id: "u".to_string(),
            user_name: "Clerk".to_string(),
            prescription_id: None,
            created_at: at,
        }
    }

    fn expense(category: &str, cents: i64) -> Expense {
        Expense {
            id: format!("e-{}-{}", category, cents),
            pharmacy_id: "ph".to_string(),
            category: category.to_string(),
            amount_cents: cents,
            description: None,
            date: date(2026, 3, 1),
            user_id: "u".to_string(),
            created_at: Utc::now(),
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_date_range_parse() {
        let today = date(2026, 3, 31);

        let explicit = DateRange::parse(Some("2026-03-01"), Some("2026-03-15"), today).unwrap();
        assert_eq!(explicit.days(), 15);
        assert!(explicit.contains(date(2026, 3, 15)));
        assert!(!explicit.contains(date(2026, 3, 16)));

        let only_to = DateRange::parse(None, Some("2026-02-28"), today).unwrap();
        assert_eq!(only_to.from, date(2026, 1, 30));

        let blank = DateRange::parse(Some(""), Some(" "), today).unwrap();
        assert_eq!(blank, DateRange::last_days(today));

        assert!(DateRange::parse(Some("03/01/2026"), None, today).is_err());
    }

    #[test]
    fn test_date_range_bounds() {
        let range = DateRange::new(date(2026, 3, 1), date(2026, 3, 1)).unwrap();
        assert_eq!(range.start(), at(2026, 3, 1, 0));
        assert_eq!(range.end_exclusive(), at(2026, 3, 2, 0));
    }

    #[test]
    fn test_profit_and_loss() {
        let range = DateRange::new(date(2026, 3, 1), date(2026, 3, 31)).unwrap();
        let sales = vec![
            sale("Aspirin", "Analgesic", 2, 400, at(2026, 3, 2, 9)),
            sale("Amoxicillin", "Antibiotic", 1, 1200, at(2026, 3, 3, 9)),
            sale("Ibuprofen", "Analgesic", 4, 400, at(2026, 3, 4, 9)),
        ];
        let expenses = vec![expense("Rent", 1000), expense("Utilities", 300), expense("Rent", 200)];

        let pl = profit_and_loss(range, &sales, &expenses);
        assert_eq!(pl.revenue_cents, 2000);
        assert_eq!(pl.expenses_cents, 1500);
        assert_eq!(pl.net_cents, 500);
        assert_eq!(pl.margin_bps, 2500);
        assert_eq!(pl.sale_count, 3);
        assert_eq!(pl.units_sold, 7);
        assert_eq!(
            pl.expenses_by_category,
            vec![
                CategoryTotal {
                    category: "Rent".to_string(),
                    amount_cents: 1200
                },
                CategoryTotal {
                    category: "Utilities".to_string(),
                    amount_cents: 300
                },
            ]
        );
        assert_eq!(pl.revenue_by_category[0].category, "Antibiotic");
        assert_eq!(pl.revenue_by_category[1].amount_cents, 800);
    }

    #[test]
    fn test_profit_and_loss_without_revenue() {
        let range = DateRange::last_days(date(2026, 3, 31));
        let pl = profit_and_loss(range, &[], &[expense("Rent", 1000)]);
        assert_eq!(pl.net_cents, -1000);
        assert_eq!(pl.margin_bps, 0);
        assert!(pl.net().is_negative());
    }

    #[test]
    fn test_sales_by_period_buckets() {
        let sales = vec![
            sale("A", "X", 1, 100, at(2026, 3, 2, 23)),
            sale("A", "X", 2, 200, at(2026, 3, 2, 8)),
            sale("B", "X", 1, 500, at(2026, 3, 9, 12)),
            sale("B", "X", 1, 700, at(2026, 2, 27, 12)),
        ];

        let daily = sales_by_period(&sales, ReportPeriod::Daily);
        let keys: Vec<&str> = daily.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["2026-02-27", "2026-03-02", "2026-03-09"]);
        assert_eq!(daily[1].revenue_cents, 300);
        assert_eq!(daily[1].units, 3);
        assert_eq!(daily[1].transactions, 2);

        // 2026-02-27 is a Friday of W09; 2026-03-02 is the Monday of W10.
        let weekly = sales_by_period(&sales, ReportPeriod::Weekly);
        let keys: Vec<&str> = weekly.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["2026-W09", "2026-W10", "2026-W11"]);

        let monthly = sales_by_period(&sales, ReportPeriod::Monthly);
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[1].key, "2026-03");
        assert_eq!(monthly[1].revenue_cents, 800);
    }

    #[test]
    fn test_iso_week_crosses_year() {
        // 2027-01-01 is a Friday belonging to ISO week 53 of 2026.
        assert_eq!(period_key(date(2027, 1, 1), ReportPeriod::Weekly), "2026-W53");
    }

    #[test]
    fn test_top_items() {
        let sales = vec![
            sale("Aspirin", "A", 5, 500, at(2026, 3, 1, 9)),
            sale("Zinc", "A", 1, 900, at(2026, 3, 1, 9)),
            sale("Aspirin", "A", 5, 500, at(2026, 3, 2, 9)),
            sale("Biotin", "A", 2, 1000, at(2026, 3, 2, 9)),
        ];

        let top = top_items(&sales, 2);
        assert_eq!(top.len(), 2);
        // Aspirin and Biotin tie at 1000; name decides.
        assert_eq!(top[0].item_name, "Aspirin");
        assert_eq!(top[0].units, 10);
        assert_eq!(top[1].item_name, "Biotin");
    }

    #[test]
    fn test_inventory_report() {
        let today = date(2026, 6, 1);
        let items = annotate(
            vec![
                stock("Aspirin", "Analgesic", 20, 100, date(2028, 1, 1)),
                stock("Ibuprofen", "Analgesic", 5, 200, date(2028, 1, 1)),
                stock("Old Syrup", "Cough", 10, 300, date(2026, 1, 1)),
            ],
            today,
            &InventoryThresholds::default(),
        );

        let report = inventory_report(&items);
        assert_eq!(report.total_items, 3);
        assert_eq!(report.total_units, 35);
        assert_eq!(report.stock_value_cents, 2000 + 1000 + 3000);
        assert_eq!(report.sellable_value_cents, 3000);
        assert_eq!(report.counts.expired, 1);
        assert_eq!(report.counts.low_stock, 1);
        assert_eq!(report.by_category.len(), 2);
        assert_eq!(report.by_category[0].category, "Analgesic");
        assert_eq!(report.by_category[0].units, 25);
    }

    #[test]
    fn test_reports_saturate_on_oversized_rows() {
        let today = date(2026, 6, 1);
        let items = annotate(
            vec![
                stock("Bulk", "General", 1_000_000_000_000, 100_000_000, date(2028, 1, 1)),
                stock("Gold", "General", 3, i64::MAX / 2, date(2028, 1, 1)),
            ],
            today,
            &InventoryThresholds::default(),
        );

        let report = inventory_report(&items);
        assert_eq!(report.stock_value_cents, i64::MAX);
        assert_eq!(report.by_category[0].value_cents, i64::MAX);

        let range = DateRange::new(date(2026, 3, 1), date(2026, 3, 31)).unwrap();
        let sales = vec![
            sale("Gold", "General", 1, i64::MAX, at(2026, 3, 2, 9)),
            sale("Gold", "General", 1, i64::MAX, at(2026, 3, 2, 10)),
        ];
        let pl = profit_and_loss(range, &sales, &[expense("Rent", 100)]);
        assert_eq!(pl.revenue_cents, i64::MAX);
        assert_eq!(pl.revenue_by_category[0].amount_cents, i64::MAX);
        assert_eq!(sales_by_period(&sales, ReportPeriod::Daily)[0].revenue_cents, i64::MAX);
        assert_eq!(top_items(&sales, 1)[0].revenue_cents, i64::MAX);
    }

    fn stock(name: &str, category: &str, quantity: i64, price_cents: i64, expiry: NaiveDate) -> InventoryItem {
        InventoryItem {
            id: name.to_lowercase(),
            pharmacy_id: "ph".to_string(),
            name: name.to_string(),
            batch: "B".to_string(),
            category: category.to_string(),
            quantity,
            price_cents,
            expiry_date: expiry,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
