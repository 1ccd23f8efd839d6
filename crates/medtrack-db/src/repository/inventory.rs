//! # Inventory Repository
//!
//! Database operations for stocked medicine batches.
//!
//! ## Key Operations
//! - Filtered listing (name/batch search, category)
//! - CRUD with tenant scoping
//! - Bulk import in one transaction
//! - Guarded stock adjustments that never go below zero
//!
//! Derived status (`LOW_STOCK`, `EXPIRED`, ...) is not stored; callers
//! annotate rows with `medtrack_core::inventory` using the pharmacy's
//! alert settings.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::{like_pattern, new_id};
use medtrack_core::{CoreError, InventoryItem, ValidationError, MAX_STOCK_LEVEL};

const ITEM_COLUMNS: &str =
    "id, pharmacy_id, name, batch, category, quantity, price_cents, expiry_date, created_at, updated_at";

/// Filters for [`InventoryRepository::list`]. Status filtering happens
/// after annotation since status is derived.
#[derive(Debug, Clone, Default)]
pub struct InventoryFilter {
    /// Case-insensitive substring of name or batch.
    pub search: Option<String>,
    pub category: Option<String>,
}

/// Validated data for a new batch.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub batch: String,
    pub category: String,
    pub quantity: i64,
    pub price_cents: i64,
    pub expiry_date: NaiveDate,
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub batch: Option<String>,
    pub category: Option<String>,
    pub quantity: Option<i64>,
    pub price_cents: Option<i64>,
    pub expiry_date: Option<NaiveDate>,
}

impl NewItem {
    fn into_item(self, pharmacy_id: &str) -> InventoryItem {
        let now = Utc::now();
        InventoryItem {
            id: new_id(),
            pharmacy_id: pharmacy_id.to_string(),
            name: self.name,
            batch: self.batch,
            category: self.category,
            quantity: self.quantity,
            price_cents: self.price_cents,
            expiry_date: self.expiry_date,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repository for inventory database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.inventory();
/// let items = repo.list(&pharmacy_id, &InventoryFilter { search: Some("amox".into()), ..Default::default() }).await?;
/// let item = repo.adjust(&pharmacy_id, &id, -3).await?;
/// ```
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Lists items ordered by name then expiry.
    pub async fn list(&self, pharmacy_id: &str, filter: &InventoryFilter) -> DbResult<Vec<InventoryItem>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);
        let category = filter
            .category
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        debug!(pharmacy_id = %pharmacy_id, search = ?search, category = ?category, "Listing inventory");

        let sql = format!(
            r#"
            SELECT {}
            FROM inventory_items
            WHERE pharmacy_id = ?1
              AND (?2 IS NULL OR name LIKE ?2 ESCAPE '\' OR batch LIKE ?2 ESCAPE '\')
              AND (?3 IS NULL OR category = ?3 COLLATE NOCASE)
            ORDER BY name COLLATE NOCASE, expiry_date
            "#,
            ITEM_COLUMNS
        );

        let items = sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(pharmacy_id)
            .bind(search)
            .bind(category)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    pub async fn get(&self, pharmacy_id: &str, id: &str) -> DbResult<Option<InventoryItem>> {
        let sql = format!("SELECT {} FROM inventory_items WHERE id = ?1 AND pharmacy_id = ?2", ITEM_COLUMNS);
        let item = sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(id)
            .bind(pharmacy_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    pub async fn require(&self, pharmacy_id: &str, id: &str) -> DbResult<InventoryItem> {
        self.get(pharmacy_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Inventory item", id))
    }

    /// Loads the given ids; ids from other pharmacies are silently absent.
    pub async fn get_many(&self, pharmacy_id: &str, ids: &[String]) -> DbResult<Vec<InventoryItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (0..ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM inventory_items WHERE pharmacy_id = ?1 AND id IN ({})",
            ITEM_COLUMNS, placeholders
        );

        let mut query = sqlx::query_as::<_, InventoryItem>(&sql).bind(pharmacy_id);
        for id in ids {
            query = query.bind(id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    pub async fn create(&self, pharmacy_id: &str, new_item: NewItem) -> DbResult<InventoryItem> {
        let item = new_item.into_item(pharmacy_id);
        debug!(id = %item.id, name = %item.name, "Inserting inventory item");
        insert_item(&self.pool, &item).await?;
        Ok(item)
    }

    /// Inserts all items or none.
    pub async fn insert_many(&self, pharmacy_id: &str, new_items: Vec<NewItem>) -> DbResult<Vec<InventoryItem>> {
        let items: Vec<InventoryItem> = new_items
            .into_iter()
            .map(|n| n.into_item(pharmacy_id))
            .collect();

        let mut tx = self.pool.begin().await?;
        for item in &items {
            insert_item(&mut *tx, item).await?;
        }
        tx.commit().await?;

        info!(pharmacy_id = %pharmacy_id, count = items.len(), "Bulk imported inventory");
        Ok(items)
    }

    pub async fn update(&self, pharmacy_id: &str, id: &str, update: ItemUpdate) -> DbResult<InventoryItem> {
        let current = self.require(pharmacy_id, id).await?;

        let updated = InventoryItem {
            name: update.name.unwrap_or(current.name),
            batch: update.batch.unwrap_or(current.batch),
            category: update.category.unwrap_or(current.category),
            quantity: update.quantity.unwrap_or(current.quantity),
            price_cents: update.price_cents.unwrap_or(current.price_cents),
            expiry_date: update.expiry_date.unwrap_or(current.expiry_date),
            updated_at: Utc::now(),
            ..current
        };

        sqlx::query(
            r#"
            UPDATE inventory_items
            SET name = ?3, batch = ?4, category = ?5, quantity = ?6,
                price_cents = ?7, expiry_date = ?8, updated_at = ?9
            WHERE id = ?1 AND pharmacy_id = ?2
            "#,
        )
        .bind(&updated.id)
        .bind(pharmacy_id)
        .bind(&updated.name)
        .bind(&updated.batch)
        .bind(&updated.category)
        .bind(updated.quantity)
        .bind(updated.price_cents)
        .bind(updated.expiry_date)
        .bind(updated.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(updated)
    }

    /// Adds `delta` (may be negative) to the stock level.
    ///
    /// ## Errors
    /// - `NotFound` if the item is not in this pharmacy
    /// - `Rule(InsufficientStock)` if the result would be negative
    pub async fn adjust(&self, pharmacy_id: &str, id: &str, delta: i64) -> DbResult<InventoryItem> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET quantity = quantity + ?3, updated_at = ?4
            WHERE id = ?1 AND pharmacy_id = ?2 AND quantity + ?3 BETWEEN 0 AND ?5
            "#,
        )
        .bind(id)
        .bind(pharmacy_id)
        .bind(delta)
        .bind(Utc::now())
        .bind(MAX_STOCK_LEVEL)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let item = self.require(pharmacy_id, id).await?;
            if delta > 0 {
                return Err(CoreError::from(ValidationError::OutOfRange {
                    field: "quantity".to_string(),
                    min: 0,
                    max: MAX_STOCK_LEVEL,
                })
                .into());
            }
            return Err(CoreError::InsufficientStock {
                item: item.name,
                available: item.quantity,
                requested: -delta,
            }
            .into());
        }

        debug!(id = %id, delta, "Adjusted stock");
        self.require(pharmacy_id, id).await
    }

    /// Deletes an item that has never been sold.
    pub async fn delete(&self, pharmacy_id: &str, id: &str) -> DbResult<()> {
        let item = self.require(pharmacy_id, id).await?;

        let sales = self.sale_count(id).await?;
        if sales > 0 {
            return Err(DbError::in_use(
                "Inventory item",
                format!("{} has {} recorded sale(s)", item.name, sales),
            ));
        }

        sqlx::query("DELETE FROM inventory_items WHERE id = ?1 AND pharmacy_id = ?2")
            .bind(id)
            .bind(pharmacy_id)
            .execute(&self.pool)
            .await?;

        info!(id = %id, name = %item.name, "Inventory item deleted");
        Ok(())
    }

    pub async fn sale_count(&self, item_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE item_id = ?1")
            .bind(item_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count(&self, pharmacy_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory_items WHERE pharmacy_id = ?1")
            .bind(pharmacy_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Distinct categories in use, for filter dropdowns.
    pub async fn categories(&self, pharmacy_id: &str) -> DbResult<Vec<String>> {
        let categories: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT category FROM inventory_items WHERE pharmacy_id = ?1 ORDER BY category COLLATE NOCASE",
        )
        .bind(pharmacy_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }
}

async fn insert_item<'e, E>(executor: E, item: &InventoryItem) -> DbResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO inventory_items (
            id, pharmacy_id, name, batch, category,
            quantity, price_cents, expiry_date, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&item.id)
    .bind(&item.pharmacy_id)
    .bind(&item.name)
    .bind(&item.batch)
    .bind(&item.category)
    .bind(item.quantity)
    .bind(item.price_cents)
    .bind(item.expiry_date)
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}
