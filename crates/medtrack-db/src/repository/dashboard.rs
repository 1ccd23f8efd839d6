//! # Dashboard Repository
//!
//! Read-only composition of the other repositories into the landing-page
//! summary. Status counts are derived with the pharmacy's own alert
//! thresholds.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::DbResult;
use crate::repository::{
    ActivityRepository, ExpenseRepository, InventoryFilter, InventoryRepository, PrescriptionRepository,
    SaleRepository, SettingsRepository,
};
use medtrack_core::inventory::{alerts, annotate, sellable_stock_value, InventoryThresholds, ItemWithStatus, StatusCounts};
use medtrack_core::reports::DateRange;
use medtrack_core::{ActivityLog, PrescriptionStatus, SaleDetail};

const RECENT_SALES: i64 = 5;
const RECENT_ACTIVITY: i64 = 10;
const ALERT_PREVIEW: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_items: i64,
    pub counts: StatusCounts,
    pub sellable_value_cents: i64,
    pub total_users: i64,
    pub pending_prescriptions: i64,
    pub today_revenue_cents: i64,
    pub today_sales: i64,
    pub month_revenue_cents: i64,
    pub month_expenses_cents: i64,
    /// Most urgent flagged items.
    pub alerts: Vec<ItemWithStatus>,
    pub recent_sales: Vec<SaleDetail>,
    pub recent_activity: Vec<ActivityLog>,
}

#[derive(Debug, Clone)]
pub struct DashboardRepository {
    pool: SqlitePool,
}

impl DashboardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DashboardRepository { pool }
    }

    pub async fn summary(&self, pharmacy_id: &str, today: NaiveDate) -> DbResult<DashboardSummary> {
        let alert_settings = SettingsRepository::new(self.pool.clone()).alerts(pharmacy_id).await?;
        let thresholds = InventoryThresholds::from(&alert_settings);

        let items = InventoryRepository::new(self.pool.clone())
            .list(pharmacy_id, &InventoryFilter::default())
            .await?;
        let annotated = annotate(items, today, &thresholds);
        let counts: StatusCounts = annotated.iter().collect();
        let sellable_value_cents = sellable_stock_value(&annotated).cents();
        let total_items = annotated.len() as i64;
        let flagged: Vec<ItemWithStatus> = alerts(annotated).into_iter().take(ALERT_PREVIEW).collect();

        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE pharmacy_id = ?1")
            .bind(pharmacy_id)
            .fetch_one(&self.pool)
            .await?;

        let pending_prescriptions = PrescriptionRepository::new(self.pool.clone())
            .count_by_status(pharmacy_id, PrescriptionStatus::Pending)
            .await?;

        let sales = SaleRepository::new(self.pool.clone());
        let day_start = today.and_time(NaiveTime::MIN).and_utc();
        let (today_revenue_cents, today_sales) = sales
            .revenue_between(pharmacy_id, day_start, day_start + Duration::days(1))
            .await?;

        let month = month_to_date(today);
        let (month_revenue_cents, _) = sales
            .revenue_between(pharmacy_id, month.start(), month.end_exclusive())
            .await?;
        let month_expenses_cents = ExpenseRepository::new(self.pool.clone())
            .total_in_range(pharmacy_id, &month)
            .await?;

        let recent_sales = sales.recent(pharmacy_id, RECENT_SALES).await?;
        let recent_activity = ActivityRepository::new(self.pool.clone())
            .recent(pharmacy_id, RECENT_ACTIVITY)
            .await?;

        Ok(DashboardSummary {
            total_items,
            counts,
            sellable_value_cents,
            total_users,
            pending_prescriptions,
            today_revenue_cents,
            today_sales,
            month_revenue_cents,
            month_expenses_cents,
            alerts: flagged,
            recent_sales,
            recent_activity,
        })
    }
}

/// First of the month through `today`.
fn month_to_date(today: NaiveDate) -> DateRange {
    let first = today.with_day(1).unwrap_or(today);
    DateRange { from: first, to: today }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{register, test_db};
    use crate::repository::{NewExpense, NewItem};
    use chrono::Utc;
    use medtrack_core::sale::{plan_sale, SaleLine};

    #[test]
    fn test_month_to_date() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 17).unwrap();
        let range = month_to_date(today);
        assert_eq!(range.from, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(range.to, today);
    }

    #[tokio::test]
    async fn test_summary_counts_and_revenue() {
        let db = test_db().await;
        let (pharmacy, admin) = register(&db, "dash").await;
        let today = Utc::now().date_naive();

        let healthy = db
            .inventory()
            .create(
                &pharmacy.id,
                NewItem {
                    name: "Aspirin".to_string(),
                    batch: "A1".to_string(),
                    category: "Analgesic".to_string(),
                    quantity: 100,
                    price_cents: 200,
                    expiry_date: today + Duration::days(365),
                },
            )
            .await
            .unwrap();
        db.inventory()
            .create(
                &pharmacy.id,
                NewItem {
                    name: "Old Syrup".to_string(),
                    batch: "S1".to_string(),
                    category: "Syrup".to_string(),
                    quantity: 4,
                    price_cents: 500,
                    expiry_date: today - Duration::days(1),
                },
            )
            .await
            .unwrap();

        let items = vec![healthy.clone()];
        let plan = plan_sale(
            &[SaleLine {
                item_id: healthy.id.clone(),
                quantity: 5,
            }],
            None,
            today,
            |id| items.iter().find(|i| i.id == id),
        )
        .unwrap();
        db.sales().record_sale(&pharmacy.id, &admin.id, &plan).await.unwrap();

        db.expenses()
            .create(
                &pharmacy.id,
                &admin.id,
                NewExpense {
                    category: "Utilities".to_string(),
                    amount_cents: 300,
                    description: None,
                    date: today,
                },
            )
            .await
            .unwrap();

        let summary = db.dashboard().summary(&pharmacy.id, today).await.unwrap();
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.counts.in_stock, 1);
        assert_eq!(summary.counts.expired, 1);
        assert_eq!(summary.sellable_value_cents, 95 * 200);
        assert_eq!(summary.total_users, 1);
        assert_eq!(summary.today_revenue_cents, 1000);
        assert_eq!(summary.today_sales, 1);
        assert_eq!(summary.month_revenue_cents, 1000);
        assert_eq!(summary.month_expenses_cents, 300);
        assert_eq!(summary.alerts.len(), 1);
        assert_eq!(summary.recent_sales.len(), 1);
        assert!(!summary.recent_activity.is_empty());
    }
}
