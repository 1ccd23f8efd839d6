//! # Sale Planning
//!
//! Turns a checkout request into priced, stock-checked lines before the
//! database layer records them.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /api/sales { items: [{itemId, quantity}], prescriptionId? }      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  merge_lines()      ← duplicate item ids collapse into one line        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  plan_line() × N    ← quantity rules, expiry, stock check, pricing     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SalePlan           ← handed to SaleRepository::record_sale            │
//! │       │                (one DB transaction: decrement + insert + log)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Planning runs against a snapshot of the items; the database decrement
//! re-checks stock (`WHERE quantity >= ?`) so a concurrent sale cannot
//! push a quantity below zero.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::InventoryItem;
use crate::validation::validate_quantity;
use crate::MAX_SALE_LINES;

/// A requested line of a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleLine {
    pub item_id: String,
    pub quantity: i64,
}

/// A validated, priced line ready to be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlannedLine {
    pub item_id: String,
    pub item_name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

impl PlannedLine {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// The full checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SalePlan {
    pub lines: Vec<PlannedLine>,
    pub prescription_id: Option<String>,
}

impl SalePlan {
    pub fn total(&self) -> Money {
        self.lines.iter().map(PlannedLine::total).sum()
    }

    pub fn units(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// One-line description for the activity log.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self
            .lines
            .iter()
            .map(|l| format!("{} x {}", l.quantity, l.item_name))
            .collect();
        format!("Sold {} (total {})", parts.join(", "), self.total())
    }
}

/// Collapses repeated item ids, keeping first-seen order.
///
/// ```rust
/// use medtrack_core::sale::{merge_lines, SaleLine};
///
/// let merged = merge_lines(&[
///     SaleLine { item_id: "a".into(), quantity: 1 },
///     SaleLine { item_id: "b".into(), quantity: 2 },
///     SaleLine { item_id: "a".into(), quantity: 3 },
/// ]).unwrap();
/// assert_eq!(merged.len(), 2);
/// assert_eq!(merged[0].quantity, 4);
/// ```
pub fn merge_lines(lines: &[SaleLine]) -> CoreResult<Vec<SaleLine>> {
    if lines.is_empty() {
        return Err(CoreError::EmptySale);
    }

    let mut merged: Vec<SaleLine> = Vec::with_capacity(lines.len());
    for line in lines {
        validate_quantity(line.quantity)?;
        match merged.iter_mut().find(|m| m.item_id == line.item_id) {
            Some(existing) => existing.quantity += line.quantity,
            None => merged.push(line.clone()),
        }
    }

    if merged.len() > MAX_SALE_LINES {
        return Err(CoreError::SaleTooLarge {
            max: MAX_SALE_LINES,
        });
    }
    for line in &merged {
        validate_quantity(line.quantity)?;
    }

    Ok(merged)
}

/// Validates one line against the current item snapshot and prices it.
pub fn plan_line(item: &InventoryItem, quantity: i64, today: NaiveDate) -> CoreResult<PlannedLine> {
    validate_quantity(quantity)?;

    if item.is_expired(today) {
        return Err(CoreError::ItemExpired {
            item: item.name.clone(),
            expiry_date: item.expiry_date.to_string(),
        });
    }

    if item.quantity < quantity {
        return Err(CoreError::InsufficientStock {
            item: item.name.clone(),
            available: item.quantity,
            requested: quantity,
        });
    }

    let total = item
        .price()
        .checked_multiply_quantity(quantity)
        .ok_or_else(|| CoreError::AmountTooLarge {
            item: item.name.clone(),
        })?;

    Ok(PlannedLine {
        item_id: item.id.clone(),
        item_name: item.name.clone(),
        quantity,
        unit_price_cents: item.price_cents,
        total_cents: total.cents(),
    })
}

/// Plans a whole checkout. `lookup` resolves an item id within the
/// caller's pharmacy; a miss becomes [`CoreError::ItemNotFound`].
pub fn plan_sale<'a, F>(
    lines: &[SaleLine],
    prescription_id: Option<String>,
    today: NaiveDate,
    mut lookup: F,
) -> CoreResult<SalePlan>
where
    F: FnMut(&str) -> Option<&'a InventoryItem>,
{
    let merged = merge_lines(lines)?;
    let mut planned = Vec::with_capacity(merged.len());

    for line in &merged {
        let item = lookup(&line.item_id).ok_or_else(|| CoreError::ItemNotFound(line.item_id.clone()))?;
        planned.push(plan_line(item, line.quantity, today)?);
    }

    Ok(SalePlan {
        lines: planned,
        prescription_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn item(id: &str, quantity: i64, price_cents: i64, expiry: NaiveDate) -> InventoryItem {
        InventoryItem {
            id: id.to_string(),
            pharmacy_id: "ph".to_string(),
            name: format!("Item {}", id),
            batch: "B".to_string(),
            category: "General".to_string(),
            quantity,
            price_cents,
            expiry_date: expiry,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(id: &str, quantity: i64) -> SaleLine {
        SaleLine {
            item_id: id.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_merge_rejects_empty_and_bad_quantities() {
        assert!(matches!(merge_lines(&[]), Err(CoreError::EmptySale)));
        assert!(matches!(merge_lines(&[line("a", 0)]), Err(CoreError::Validation(_))));
        // Each line is fine, the merged total is not.
        assert!(merge_lines(&[line("a", 600), line("a", 600)]).is_err());
    }

    #[test]
    fn test_plan_line_prices_and_checks_stock() {
        let fresh = item("a", 10, 250, NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());

        let planned = plan_line(&fresh, 4, today()).unwrap();
        assert_eq!(planned.total_cents, 1000);
        assert_eq!(planned.unit_price_cents, 250);

        let err = plan_line(&fresh, 11, today()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                available: 10,
                requested: 11,
                ..
            }
        ));
    }

    #[test]
    fn test_plan_line_rejects_unrepresentable_total() {
        let gold = item("a", 10, i64::MAX / 2, NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
        let err = plan_line(&gold, 3, today()).unwrap_err();
        assert!(matches!(err, CoreError::AmountTooLarge { item } if item == "Item a"));
    }

    #[test]
    fn test_plan_line_rejects_expired() {
        let stale = item("a", 10, 250, NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
        assert!(matches!(plan_line(&stale, 1, today()), Err(CoreError::ItemExpired { .. })));

        // Expiring today is still sellable.
        let last_day = item("b", 10, 250, today());
        assert!(plan_line(&last_day, 1, today()).is_ok());
    }

    #[test]
    fn test_plan_sale_merges_and_totals() {
        let expiry = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        let stock = vec![item("a", 5, 100, expiry), item("b", 5, 300, expiry)];

        let plan = plan_sale(
            &[line("a", 2), line("b", 1), line("a", 1)],
            Some("rx-1".to_string()),
            today(),
            |id| stock.iter().find(|i| i.id == id),
        )
        .unwrap();

        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.lines[0].quantity, 3);
        assert_eq!(plan.total().cents(), 600);
        assert_eq!(plan.units(), 4);
        assert_eq!(plan.prescription_id.as_deref(), Some("rx-1"));
        assert_eq!(plan.describe(), "Sold 3 x Item a, 1 x Item b (total 6.00)");
    }

    #[test]
    fn test_plan_sale_unknown_item() {
        let stock: Vec<InventoryItem> = Vec::new();
        let err = plan_sale(&[line("ghost", 1)], None, today(), |id| {
            stock.iter().find(|i| i.id == id)
        })
        .unwrap_err();
        assert!(matches!(err, CoreError::ItemNotFound(id) if id == "ghost"));
    }
}
