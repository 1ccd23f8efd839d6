//! # Pharmacy Repository
//!
//! Tenants: registration, profile and full-tenant export.
//!
//! ## Registration Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  register(pharmacy, admin)                                              │
//! │       │                                                                 │
//! │       ├── license / email already taken? → DbError::UniqueViolation    │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │       ├── INSERT pharmacies                                             │
//! │       ├── INSERT users (role ADMIN)                                     │
//! │       ├── INSERT alert / security / backup / pharmacy settings          │
//! │       └── INSERT activity_logs (AUTH)                                   │
//! │  COMMIT  (any failure: nothing is written)                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::activity::{insert_log, new_log, ActivityFilter};
use crate::repository::expense::ExpenseFilter;
use crate::repository::inventory::InventoryFilter;
use crate::repository::prescription::PrescriptionFilter;
use crate::repository::{
    new_id, ActivityRepository, ExpenseRepository, InventoryRepository, PrescriptionRepository,
    SettingsRepository, UserRepository,
};
use medtrack_core::{
    ActivityLog, ActivityType, AlertSettings, BackupSettings, Expense, InventoryItem, Pharmacy,
    PharmacySettings, Prescription, Role, Sale, SecuritySettings, User, UserStatus,
};

/// Validated registration data for the pharmacy.
#[derive(Debug, Clone)]
pub struct NewPharmacy {
    pub name: String,
    pub license_number: String,
    pub owner_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
}

/// The first administrator, created with the pharmacy.
#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Profile fields an administrator may change. The license number is fixed.
#[derive(Debug, Clone, Default)]
pub struct PharmacyUpdate {
    pub name: Option<String>,
    pub owner_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
}

/// Everything a pharmacy owns, as exported by the backup endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub exported_at: DateTime<Utc>,
    pub pharmacy: Pharmacy,
    pub users: Vec<User>,
    pub inventory: Vec<InventoryItem>,
    pub sales: Vec<Sale>,
    pub prescriptions: Vec<Prescription>,
    pub expenses: Vec<Expense>,
    pub activity: Vec<ActivityLog>,
    pub alert_settings: AlertSettings,
    pub security_settings: SecuritySettings,
    pub backup_settings: BackupSettings,
    pub pharmacy_settings: PharmacySettings,
}

#[derive(Debug, Clone)]
pub struct PharmacyRepository {
    pool: SqlitePool,
}

impl PharmacyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PharmacyRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Pharmacy>> {
        let pharmacy = sqlx::query_as::<_, Pharmacy>(
            r#"
            SELECT id, name, license_number, owner_name, email, phone, location, created_at
            FROM pharmacies
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pharmacy)
    }

    pub async fn license_exists(&self, license_number: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pharmacies WHERE license_number = ?1")
            .bind(license_number)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Creates a pharmacy, its administrator and default settings in one
    /// transaction.
    pub async fn register(&self, pharmacy: NewPharmacy, admin: NewAdmin) -> DbResult<(Pharmacy, User)> {
        if self.license_exists(&pharmacy.license_number).await? {
            return Err(DbError::duplicate("licenseNumber", &pharmacy.license_number));
        }
        if UserRepository::new(self.pool.clone()).email_exists(&admin.email).await? {
            return Err(DbError::duplicate("email", &admin.email));
        }

        let now = Utc::now();
        let pharmacy = Pharmacy {
            id: new_id(),
            name: pharmacy.name,
            license_number: pharmacy.license_number,
            owner_name: pharmacy.owner_name,
            email: pharmacy.email,
            phone: pharmacy.phone,
            location: pharmacy.location,
            created_at: now,
        };
        let user = User {
            id: new_id(),
            email: admin.email,
            name: admin.name,
            role: Role::Admin,
            pharmacy_id: pharmacy.id.clone(),
            status: UserStatus::Active,
            last_login: None,
            created_at: now,
        };

        debug!(pharmacy_id = %pharmacy.id, license = %pharmacy.license_number, "Registering pharmacy");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO pharmacies (id, name, license_number, owner_name, email, phone, location, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&pharmacy.id)
        .bind(&pharmacy.name)
        .bind(&pharmacy.license_number)
        .bind(&pharmacy.owner_name)
        .bind(&pharmacy.email)
        .bind(&pharmacy.phone)
        .bind(&pharmacy.location)
        .bind(pharmacy.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, name, role, pharmacy_id, status, last_login, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&admin.password_hash)
        .bind(&user.name)
        .bind(user.role)
        .bind(&user.pharmacy_id)
        .bind(user.status)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await?;

        super::settings::insert_defaults(&mut *tx, &pharmacy.id).await?;

        let log = new_log(
            &pharmacy.id,
            ActivityType::Auth,
            format!("Pharmacy {} registered by {}", pharmacy.name, user.email),
            Some(&user.id),
        );
        insert_log(&mut *tx, &log).await?;

        tx.commit().await?;

        info!(pharmacy_id = %pharmacy.id, admin_id = %user.id, "Pharmacy registered");
        Ok((pharmacy, user))
    }

    /// Applies the given profile fields and returns the updated pharmacy.
    pub async fn update(&self, id: &str, update: PharmacyUpdate) -> DbResult<Pharmacy> {
        let current = self.get(id).await?.ok_or_else(|| DbError::not_found("Pharmacy", id))?;

        let updated = Pharmacy {
            name: update.name.unwrap_or(current.name),
            owner_name: update.owner_name.unwrap_or(current.owner_name),
            email: update.email.unwrap_or(current.email),
            phone: update.phone.unwrap_or(current.phone),
            location: update.location.unwrap_or(current.location),
            ..current
        };

        sqlx::query(
            r#"
            UPDATE pharmacies
            SET name = ?2, owner_name = ?3, email = ?4, phone = ?5, location = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&updated.id)
        .bind(&updated.name)
        .bind(&updated.owner_name)
        .bind(&updated.email)
        .bind(&updated.phone)
        .bind(&updated.location)
        .execute(&self.pool)
        .await?;

        Ok(updated)
    }

    /// Collects every row the pharmacy owns. Password hashes are not part
    /// of the export.
    pub async fn snapshot(&self, pharmacy_id: &str) -> DbResult<BackupSnapshot> {
        let pharmacy = self
            .get(pharmacy_id)
            .await?
            .ok_or_else(|| DbError::not_found("Pharmacy", pharmacy_id))?;

        let pool = self.pool.clone();
        let settings = SettingsRepository::new(pool.clone());

        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, pharmacy_id, item_id, quantity, total_price_cents, user_id, prescription_id, created_at
            FROM sales
            WHERE pharmacy_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(pharmacy_id)
        .fetch_all(&self.pool)
        .await?;

        let snapshot = BackupSnapshot {
            exported_at: Utc::now(),
            users: UserRepository::new(pool.clone()).list(pharmacy_id).await?,
            inventory: InventoryRepository::new(pool.clone())
                .list(pharmacy_id, &InventoryFilter::default())
                .await?,
            sales,
            prescriptions: PrescriptionRepository::new(pool.clone())
                .list(pharmacy_id, &PrescriptionFilter::default())
                .await?,
            expenses: ExpenseRepository::new(pool.clone())
                .list(pharmacy_id, &ExpenseFilter::default())
                .await?,
            activity: ActivityRepository::new(pool.clone())
                .list(
                    pharmacy_id,
                    &ActivityFilter {
                        limit: Some(super::activity::MAX_LOG_LIMIT),
                        ..Default::default()
                    },
                )
                .await?,
            alert_settings: settings.alerts(pharmacy_id).await?,
            security_settings: settings.security(pharmacy_id).await?,
            backup_settings: settings.backup(pharmacy_id).await?,
            pharmacy_settings: settings.general(pharmacy_id).await?,
            pharmacy,
        };

        debug!(
            pharmacy_id = %pharmacy_id,
            items = snapshot.inventory.len(),
            sales = snapshot.sales.len(),
            "Built backup snapshot"
        );
        Ok(snapshot)
    }

    /// Number of registered pharmacies.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pharmacies")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
