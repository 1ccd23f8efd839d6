//! # Expense Repository
//!
//! Operating expenses (rent, salaries, utilities...) dated by calendar day.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use medtrack_core::reports::DateRange;
use medtrack_core::Expense;

const EXPENSE_COLUMNS: &str = "id, pharmacy_id, category, amount_cents, description, date, user_id, created_at";

/// Inclusive date bounds and an optional exact category.
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub category: String,
    pub amount_cents: i64,
    pub description: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ExpenseRepository { pool }
    }

    /// Most recent date first.
    pub async fn list(&self, pharmacy_id: &str, filter: &ExpenseFilter) -> DbResult<Vec<Expense>> {
        let category = filter
            .category
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let sql = format!(
            r#"
            SELECT {}
            FROM expenses
            WHERE pharmacy_id = ?1
              AND (?2 IS NULL OR date >= ?2)
              AND (?3 IS NULL OR date <= ?3)
              AND (?4 IS NULL OR category = ?4 COLLATE NOCASE)
            ORDER BY date DESC, created_at DESC
            "#,
            EXPENSE_COLUMNS
        );

        let expenses = sqlx::query_as::<_, Expense>(&sql)
            .bind(pharmacy_id)
            .bind(filter.from)
            .bind(filter.to)
            .bind(category)
            .fetch_all(&self.pool)
            .await?;

        Ok(expenses)
    }

    pub async fn in_range(&self, pharmacy_id: &str, range: &DateRange) -> DbResult<Vec<Expense>> {
        self.list(
            pharmacy_id,
            &ExpenseFilter {
                from: Some(range.from),
                to: Some(range.to),
                category: None,
            },
        )
        .await
    }

    /// Sum of amounts dated within `range`.
    pub async fn total_in_range(&self, pharmacy_id: &str, range: &DateRange) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM expenses WHERE pharmacy_id = ?1 AND date >= ?2 AND date <= ?3",
        )
        .bind(pharmacy_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    pub async fn create(&self, pharmacy_id: &str, user_id: &str, new: NewExpense) -> DbResult<Expense> {
        let expense = Expense {
            id: new_id(),
            pharmacy_id: pharmacy_id.to_string(),
            category: new.category,
            amount_cents: new.amount_cents,
            description: new.description,
            date: new.date,
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };

        debug!(id = %expense.id, category = %expense.category, amount_cents = expense.amount_cents, "Inserting expense");

        sqlx::query(
            r#"
            INSERT INTO expenses (id, pharmacy_id, category, amount_cents, description, date, user_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.pharmacy_id)
        .bind(&expense.category)
        .bind(expense.amount_cents)
        .bind(&expense.description)
        .bind(expense.date)
        .bind(&expense.user_id)
        .bind(expense.created_at)
        .execute(&self.pool)
        .await?;

        Ok(expense)
    }

    pub async fn get(&self, pharmacy_id: &str, id: &str) -> DbResult<Option<Expense>> {
        let sql = format!("SELECT {} FROM expenses WHERE id = ?1 AND pharmacy_id = ?2", EXPENSE_COLUMNS);
        let expense = sqlx::query_as::<_, Expense>(&sql)
            .bind(id)
            .bind(pharmacy_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(expense)
    }

    /// Deletes an expense and returns the removed row.
    pub async fn delete(&self, pharmacy_id: &str, id: &str) -> DbResult<Expense> {
        let expense = self
            .get(pharmacy_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Expense", id))?;

        sqlx::query("DELETE FROM expenses WHERE id = ?1 AND pharmacy_id = ?2")
            .bind(id)
            .bind(pharmacy_id)
            .execute(&self.pool)
            .await?;

        info!(id = %id, category = %expense.category, "Expense deleted");
        Ok(expense)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{register, test_db};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn expense(category: &str, amount_cents: i64, on: NaiveDate) -> NewExpense {
        NewExpense {
            category: category.to_string(),
            amount_cents,
            description: None,
            date: on,
        }
    }

    #[tokio::test]
    async fn test_range_filters_are_inclusive() {
        let db = test_db().await;
        let (pharmacy, admin) = register(&db, "exp").await;
        let repo = db.expenses();

        repo.create(&pharmacy.id, &admin.id, expense("Rent", 100_000, date(2026, 2, 28))).await.unwrap();
        repo.create(&pharmacy.id, &admin.id, expense("Rent", 100_000, date(2026, 3, 1))).await.unwrap();
        repo.create(&pharmacy.id, &admin.id, expense("Utilities", 12_500, date(2026, 3, 31))).await.unwrap();
        repo.create(&pharmacy.id, &admin.id, expense("Utilities", 9_000, date(2026, 4, 1))).await.unwrap();

        let march = DateRange::new(date(2026, 3, 1), date(2026, 3, 31)).unwrap();
        let listed = repo.in_range(&pharmacy.id, &march).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].date, date(2026, 3, 31));
        assert_eq!(repo.total_in_range(&pharmacy.id, &march).await.unwrap(), 112_500);

        let utilities = ExpenseFilter {
            category: Some("utilities".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.list(&pharmacy.id, &utilities).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_is_tenant_scoped() {
        let db = test_db().await;
        let (pharmacy, admin) = register(&db, "expd").await;
        let (other, _) = register(&db, "expo").await;
        let repo = db.expenses();

        let created = repo
            .create(&pharmacy.id, &admin.id, expense("Salaries", 50_000, date(2026, 1, 15)))
            .await
            .unwrap();

        assert!(matches!(
            repo.delete(&other.id, &created.id).await,
            Err(DbError::NotFound { .. })
        ));
        let removed = repo.delete(&pharmacy.id, &created.id).await.unwrap();
        assert_eq!(removed.amount_cents, 50_000);
        assert!(repo.list(&pharmacy.id, &ExpenseFilter::default()).await.unwrap().is_empty());
    }
}
