//! # Sale Repository
//!
//! Records checkouts and serves sale listings for reports and the dashboard.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       record_sale()                                    │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │   ├── prescription linked?  → must exist here, not CANCELLED           │
//! │   ├── for each planned line:                                           │
//! │   │     UPDATE inventory_items SET quantity = quantity - n             │
//! │   │       WHERE id = ? AND pharmacy_id = ? AND quantity >= n           │
//! │   │     0 rows? → re-read, InsufficientStock / ItemNotFound, ROLLBACK  │
//! │   │     INSERT INTO sales (...)                                        │
//! │   ├── prescription → DISPENSED                                         │
//! │   └── INSERT INTO activity_logs (SALE)                                 │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  Any error drops the transaction, which rolls everything back.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The plan is built from a snapshot read before the transaction, so the
//! guarded decrement is what actually protects against concurrent sales.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::activity::{insert_log, new_log};
use crate::repository::new_id;
use medtrack_core::reports::DateRange;
use medtrack_core::sale::SalePlan;
use medtrack_core::{ActivityType, CoreError, PrescriptionStatus, Sale, SaleDetail};

const DETAIL_SELECT: &str = r#"
    SELECT s.id, s.item_id, i.name AS item_name, i.category,
           s.quantity, s.total_price_cents,
           s.user_id, u.name AS user_name,
           s.prescription_id, s.created_at
    FROM sales s
    JOIN inventory_items i ON i.id = s.item_id
    JOIN users u ON u.id = s.user_id
"#;

/// Filters for [`SaleRepository::list`]. Time bounds are half-open.
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub from: Option<DateTime<Utc>>,
    pub to_exclusive: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub item_id: Option<String>,
    pub limit: Option<i64>,
}

impl SaleFilter {
    /// Whole calendar days of `range`.
    pub fn for_range(range: &DateRange) -> Self {
        SaleFilter {
            from: Some(range.start()),
            to_exclusive: Some(range.end_exclusive()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Records a planned checkout atomically.
    ///
    /// ## Returns
    /// One [`Sale`] row per planned line, in plan order.
    ///
    /// ## Errors
    /// - `Rule(InsufficientStock)` if stock dropped below a line's quantity
    /// - `Rule(ItemNotFound)` if an item vanished since planning
    /// - `NotFound` for an unknown prescription
    /// - `Rule(InvalidPrescriptionStatus)` for a cancelled prescription
    pub async fn record_sale(&self, pharmacy_id: &str, user_id: &str, plan: &SalePlan) -> DbResult<Vec<Sale>> {
        if plan.lines.is_empty() {
            return Err(CoreError::EmptySale.into());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if let Some(prescription_id) = &plan.prescription_id {
            let status: Option<PrescriptionStatus> =
                sqlx::query_scalar("SELECT status FROM prescriptions WHERE id = ?1 AND pharmacy_id = ?2")
                    .bind(prescription_id)
                    .bind(pharmacy_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            match status {
                None => return Err(DbError::not_found("Prescription", prescription_id)),
                Some(PrescriptionStatus::Cancelled) => {
                    return Err(CoreError::InvalidPrescriptionStatus {
                        id: prescription_id.clone(),
                        status: PrescriptionStatus::Cancelled.to_string(),
                    }
                    .into())
                }
                Some(_) => {}
            }
        }

        let mut sales = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            let result = sqlx::query(
                r#"
                UPDATE inventory_items
                SET quantity = quantity - ?3, updated_at = ?4
                WHERE id = ?1 AND pharmacy_id = ?2 AND quantity >= ?3
                "#,
            )
            .bind(&line.item_id)
            .bind(pharmacy_id)
            .bind(line.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let available: Option<i64> =
                    sqlx::query_scalar("SELECT quantity FROM inventory_items WHERE id = ?1 AND pharmacy_id = ?2")
                        .bind(&line.item_id)
                        .bind(pharmacy_id)
                        .fetch_optional(&mut *tx)
                        .await?;

                warn!(item_id = %line.item_id, requested = line.quantity, available = ?available, "Sale rejected");
                return Err(match available {
                    Some(available) => CoreError::InsufficientStock {
                        item: line.item_name.clone(),
                        available,
                        requested: line.quantity,
                    },
                    None => CoreError::ItemNotFound(line.item_id.clone()),
                }
                .into());
            }

            let sale = Sale {
                id: new_id(),
                pharmacy_id: pharmacy_id.to_string(),
                item_id: line.item_id.clone(),
                quantity: line.quantity,
                total_price_cents: line.total_cents,
                user_id: user_id.to_string(),
                prescription_id: plan.prescription_id.clone(),
                created_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO sales (
                    id, pharmacy_id, item_id, quantity, total_price_cents,
                    user_id, prescription_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&sale.id)
            .bind(&sale.pharmacy_id)
            .bind(&sale.item_id)
            .bind(sale.quantity)
            .bind(sale.total_price_cents)
            .bind(&sale.user_id)
            .bind(&sale.prescription_id)
            .bind(sale.created_at)
            .execute(&mut *tx)
            .await?;

            sales.push(sale);
        }

        if let Some(prescription_id) = &plan.prescription_id {
            sqlx::query("UPDATE prescriptions SET status = ?3, updated_at = ?4 WHERE id = ?1 AND pharmacy_id = ?2")
                .bind(prescription_id)
                .bind(pharmacy_id)
                .bind(PrescriptionStatus::Dispensed)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        let log = new_log(pharmacy_id, ActivityType::Sale, plan.describe(), Some(user_id));
        insert_log(&mut *tx, &log).await?;

        tx.commit().await?;

        info!(
            pharmacy_id = %pharmacy_id,
            lines = sales.len(),
            total_cents = plan.total().cents(),
            "Sale recorded"
        );
        Ok(sales)
    }

    /// Lists sales newest first.
    pub async fn list(&self, pharmacy_id: &str, filter: &SaleFilter) -> DbResult<Vec<SaleDetail>> {
        debug!(pharmacy_id = %pharmacy_id, filter = ?filter, "Listing sales");

        let sql = format!(
            r#"{}
            WHERE s.pharmacy_id = ?1
              AND (?2 IS NULL OR s.created_at >= ?2)
              AND (?3 IS NULL OR s.created_at < ?3)
              AND (?4 IS NULL OR s.user_id = ?4)
              AND (?5 IS NULL OR s.item_id = ?5)
            ORDER BY s.created_at DESC, s.rowid DESC
            LIMIT ?6
            "#,
            DETAIL_SELECT
        );

        let sales = sqlx::query_as::<_, SaleDetail>(&sql)
            .bind(pharmacy_id)
            .bind(filter.from)
            .bind(filter.to_exclusive)
            .bind(&filter.user_id)
            .bind(&filter.item_id)
            // SQLite treats a negative LIMIT as "no limit".
            .bind(filter.limit.unwrap_or(-1))
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }

    /// All sales on the calendar days of `range`.
    pub async fn in_range(&self, pharmacy_id: &str, range: &DateRange) -> DbResult<Vec<SaleDetail>> {
        self.list(pharmacy_id, &SaleFilter::for_range(range)).await
    }

    pub async fn recent(&self, pharmacy_id: &str, limit: i64) -> DbResult<Vec<SaleDetail>> {
        self.list(
            pharmacy_id,
            &SaleFilter {
                limit: Some(limit),
                ..Default::default()
            },
        )
        .await
    }

    /// Revenue in cents and number of sale rows in `[from, to_exclusive)`.
    pub async fn revenue_between(
        &self,
        pharmacy_id: &str,
        from: DateTime<Utc>,
        to_exclusive: DateTime<Utc>,
    ) -> DbResult<(i64, i64)> {
        let totals: (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(total_price_cents), 0), COUNT(*)
            FROM sales
            WHERE pharmacy_id = ?1 AND created_at >= ?2 AND created_at < ?3
            "#,
        )
        .bind(pharmacy_id)
        .bind(from)
        .bind(to_exclusive)
        .fetch_one(&self.pool)
        .await?;

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{register, test_db};
    use crate::repository::{NewItem, NewPrescription};
    use crate::Database;
    use chrono::NaiveDate;
    use medtrack_core::sale::{plan_sale, SaleLine};
    use medtrack_core::{Gender, InventoryItem, Pharmacy, User};

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    async fn stock(db: &Database, pharmacy: &Pharmacy, name: &str, quantity: i64, price_cents: i64) -> InventoryItem {
        db.inventory()
            .create(
                &pharmacy.id,
                NewItem {
                    name: name.to_string(),
                    batch: "B1".to_string(),
                    category: "General".to_string(),
                    quantity,
                    price_cents,
                    expiry_date: today() + chrono::Duration::days(365),
                },
            )
            .await
            .unwrap()
    }

    fn plan(items: &[InventoryItem], lines: &[(usize, i64)], prescription_id: Option<String>) -> SalePlan {
        let lines: Vec<SaleLine> = lines
            .iter()
            .map(|(idx, qty)| SaleLine {
                item_id: items[*idx].id.clone(),
                quantity: *qty,
            })
            .collect();
        plan_sale(&lines, prescription_id, today(), |id| items.iter().find(|i| i.id == id)).unwrap()
    }

    async fn quantity(db: &Database, pharmacy: &Pharmacy, item: &InventoryItem) -> i64 {
        db.inventory().require(&pharmacy.id, &item.id).await.unwrap().quantity
    }

    async fn seller(db: &Database, tag: &str) -> (Pharmacy, User) {
        register(db, tag).await
    }

    #[tokio::test]
    async fn test_record_sale_decrements_and_logs() {
        let db = test_db().await;
        let (pharmacy, admin) = seller(&db, "sale").await;
        let items = vec![
            stock(&db, &pharmacy, "Aspirin", 10, 150).await,
            stock(&db, &pharmacy, "Zinc", 5, 300).await,
        ];

        let sales = db
            .sales()
            .record_sale(&pharmacy.id, &admin.id, &plan(&items, &[(0, 3), (1, 2)], None))
            .await
            .unwrap();

        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].total_price_cents, 450);
        assert_eq!(sales[1].total_price_cents, 600);
        assert_eq!(quantity(&db, &pharmacy, &items[0]).await, 7);
        assert_eq!(quantity(&db, &pharmacy, &items[1]).await, 3);

        let listed = db.sales().recent(&pharmacy.id, 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|s| s.user_name == "Owner"));

        let logs = db.activity().recent(&pharmacy.id, 10).await.unwrap();
        assert_eq!(logs[0].activity_type, ActivityType::Sale);
        assert!(logs[0].message.contains("3 x Aspirin"));
    }

    #[tokio::test]
    async fn test_failed_line_rolls_back_everything() {
        let db = test_db().await;
        let (pharmacy, admin) = seller(&db, "rollback").await;
        let items = vec![
            stock(&db, &pharmacy, "Aspirin", 10, 100).await,
            stock(&db, &pharmacy, "Zinc", 5, 100).await,
        ];
        let checkout = plan(&items, &[(0, 4), (1, 5)], None);

        // Another sale drains the second item after planning.
        db.inventory().adjust(&pharmacy.id, &items[1].id, -2).await.unwrap();

        let err = db.sales().record_sale(&pharmacy.id, &admin.id, &checkout).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Rule(CoreError::InsufficientStock { available: 3, requested: 5, .. })
        ));

        assert_eq!(quantity(&db, &pharmacy, &items[0]).await, 10);
        assert_eq!(quantity(&db, &pharmacy, &items[1]).await, 3);
        assert!(db.sales().recent(&pharmacy.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sale_dispenses_prescription() {
        let db = test_db().await;
        let (pharmacy, admin) = seller(&db, "rx").await;
        let items = vec![stock(&db, &pharmacy, "Amoxicillin", 10, 900).await];
        let prescription = db
            .prescriptions()
            .create(
                &pharmacy.id,
                &admin.id,
                NewPrescription {
                    patient_name: "Jane Doe".to_string(),
                    age: 34,
                    gender: Gender::Female,
                    doctor: "Dr. Smith".to_string(),
                    medications: vec!["Amoxicillin 500mg".to_string()],
                    image_url: None,
                },
            )
            .await
            .unwrap();

        let sales = db
            .sales()
            .record_sale(&pharmacy.id, &admin.id, &plan(&items, &[(0, 1)], Some(prescription.id.clone())))
            .await
            .unwrap();
        assert_eq!(sales[0].prescription_id.as_deref(), Some(prescription.id.as_str()));

        let updated = db.prescriptions().require(&pharmacy.id, &prescription.id).await.unwrap();
        assert_eq!(updated.status, PrescriptionStatus::Dispensed);
    }

    #[tokio::test]
    async fn test_cancelled_or_foreign_prescription_is_rejected() {
        let db = test_db().await;
        let (pharmacy, admin) = seller(&db, "rxc").await;
        let (other, other_admin) = seller(&db, "rxo").await;
        let items = vec![stock(&db, &pharmacy, "Aspirin", 10, 100).await];

        let foreign = db
            .prescriptions()
            .create(
                &other.id,
                &other_admin.id,
                NewPrescription {
                    patient_name: "John Roe".to_string(),
                    age: 50,
                    gender: Gender::Male,
                    doctor: "Dr. Who".to_string(),
                    medications: vec!["Aspirin".to_string()],
                    image_url: None,
                },
            )
            .await
            .unwrap();

        let err = db
            .sales()
            .record_sale(&pharmacy.id, &admin.id, &plan(&items, &[(0, 1)], Some(foreign.id.clone())))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        db.prescriptions()
            .set_status(&other.id, &foreign.id, PrescriptionStatus::Cancelled)
            .await
            .unwrap();
        let err = db
            .sales()
            .record_sale(&other.id, &other_admin.id, &plan(&items, &[(0, 1)], Some(foreign.id.clone())))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidPrescriptionStatus { .. })));
        assert_eq!(quantity(&db, &pharmacy, &items[0]).await, 10);
    }

    #[tokio::test]
    async fn test_list_filters_and_revenue() {
        let db = test_db().await;
        let (pharmacy, admin) = seller(&db, "list").await;
        let items = vec![
            stock(&db, &pharmacy, "Aspirin", 10, 100).await,
            stock(&db, &pharmacy, "Zinc", 10, 250).await,
        ];
        db.sales()
            .record_sale(&pharmacy.id, &admin.id, &plan(&items, &[(0, 2)], None))
            .await
            .unwrap();
        db.sales()
            .record_sale(&pharmacy.id, &admin.id, &plan(&items, &[(1, 1)], None))
            .await
            .unwrap();

        let zinc_only = SaleFilter {
            item_id: Some(items[1].id.clone()),
            ..Default::default()
        };
        let listed = db.sales().list(&pharmacy.id, &zinc_only).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].item_name, "Zinc");

        let range = DateRange::last_days(today());
        assert_eq!(db.sales().in_range(&pharmacy.id, &range).await.unwrap().len(), 2);

        let (revenue, count) = db
            .sales()
            .revenue_between(&pharmacy.id, range.start(), range.end_exclusive())
            .await
            .unwrap();
        assert_eq!(revenue, 450);
        assert_eq!(count, 2);

        let limited = SaleFilter {
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(db.sales().list(&pharmacy.id, &limited).await.unwrap().len(), 1);
    }
}
