//! # Repository Module
//!
//! Database repository implementations for MedTrack.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Route handler                                                         │
//! │       │                                                                 │
//! │       │  db.inventory().get(&pharmacy_id, &id)                         │
//! │       ▼                                                                 │
//! │  InventoryRepository                                                   │
//! │  ├── list(&self, pharmacy_id, filter)                                  │
//! │  ├── get(&self, pharmacy_id, id)                                       │
//! │  ├── create(&self, pharmacy_id, item)                                  │
//! │  └── adjust(&self, pharmacy_id, id, delta)                             │
//! │       │                                                                 │
//! │       │  SQL, always scoped by pharmacy_id                             │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A row belonging to another pharmacy is indistinguishable from a missing
//! row: both come back as `None` / [`DbError::NotFound`](crate::DbError).
//!
//! ## Available Repositories
//!
//! - [`PharmacyRepository`] - Registration, pharmacy profile, backup export
//! - [`UserRepository`] - Accounts, credentials, permission replacement
//! - [`PermissionRepository`] - Per-module grants
//! - [`InventoryRepository`] - Stock CRUD, bulk import, adjustments
//! - [`SaleRepository`] - Atomic checkout and sale queries
//! - [`PrescriptionRepository`] - Prescription CRUD
//! - [`ExpenseRepository`] - Expense CRUD
//! - [`ActivityRepository`] - Audit trail
//! - [`SettingsRepository`] - Alert, security, backup and pharmacy settings
//! - [`DashboardRepository`] - Dashboard summary

pub mod activity;
pub mod dashboard;
pub mod expense;
pub mod inventory;
pub mod permission;
pub mod pharmacy;
pub mod prescription;
pub mod sale;
pub mod settings;
pub mod user;

pub use activity::{ActivityFilter, ActivityRepository};
pub use dashboard::{DashboardRepository, DashboardSummary};
pub use expense::{ExpenseFilter, ExpenseRepository, NewExpense};
pub use inventory::{InventoryFilter, InventoryRepository, ItemUpdate, NewItem};
pub use permission::PermissionRepository;
pub use pharmacy::{BackupSnapshot, NewAdmin, NewPharmacy, PharmacyRepository, PharmacyUpdate};
pub use prescription::{NewPrescription, PrescriptionFilter, PrescriptionRepository, PrescriptionUpdate};
pub use sale::{SaleFilter, SaleRepository};
pub use settings::SettingsRepository;
pub use user::{NewUser, UserCredentials, UserRepository, UserUpdate};

/// Generates a new row ID.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern and wraps
/// the term in wildcards.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for repository tests.

    use crate::repository::{NewAdmin, NewPharmacy};
    use crate::{Database, DbConfig};
    use medtrack_core::{Pharmacy, User};

    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    /// Registers a pharmacy with an admin; `tag` keeps emails and licenses unique.
    pub async fn register(db: &Database, tag: &str) -> (Pharmacy, User) {
        db.pharmacies()
            .register(
                NewPharmacy {
                    name: format!("{} Pharmacy", tag),
                    license_number: format!("LIC-{}", tag.to_uppercase()),
                    owner_name: "Owner".to_string(),
                    email: format!("contact@{}.test", tag),
                    phone: "555-0100".to_string(),
                    location: "Main Street".to_string(),
                },
                NewAdmin {
                    name: "Owner".to_string(),
                    email: format!("owner@{}.test", tag),
                    password_hash: "hash".to_string(),
                },
            )
            .await
            .unwrap()
    }
}
