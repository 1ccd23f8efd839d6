//! # Domain Types
//!
//! Entities and enumerations shared by the database layer and the API.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Pharmacy (tenant) ──┬── User ──── UserPermission (per module)         │
//! │                      ├── InventoryItem ◄── Sale ──► Prescription?      │
//! │                      ├── Prescription                                   │
//! │                      ├── Expense                                        │
//! │                      ├── ActivityLog                                    │
//! │                      └── Alert / Security / Backup / Pharmacy settings  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All ids are UUID v4 strings. Every tenant-owned entity carries
//! `pharmacy_id`; the database layer scopes every query by it.
//! Enums travel as SCREAMING_SNAKE_CASE text both in JSON and in SQLite.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::{DEFAULT_EXPIRY_WARNING_DAYS, DEFAULT_LOW_STOCK_THRESHOLD, DEFAULT_PASSWORD_MIN_LENGTH};

// =============================================================================
// Text Enum Helper
// =============================================================================

/// Implements `as_str`, `ALL`, `Display` and `FromStr` for a fieldless enum
/// whose wire form is a fixed upper-case string.
macro_rules! text_enum {
    ($ty:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            /// Wire representation (matches serde and the database column).
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let upper = s.trim().to_ascii_uppercase().replace('-', "_");
                match upper.as_str() {
                    $($text => Ok($ty::$variant),)+
                    _ => Err(ValidationError::NotAllowed {
                        field: $field.to_string(),
                        allowed: $ty::ALL.iter().map(|v| v.as_str().to_string()).collect(),
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Enumerations
// =============================================================================

/// Access tier of a user within a pharmacy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Role {
    /// Pharmacy owner/manager. Unrestricted within the tenant.
    Admin,
    /// Licensed staff: inventory, sales, prescriptions, reports.
    Pharmacist,
    /// Counter staff: sales, read-only inventory and prescriptions.
    Worker,
}

text_enum!(Role, "role", {
    Admin => "ADMIN",
    Pharmacist => "PHARMACIST",
    Worker => "WORKER",
});

/// Account status. Only active users may sign in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

text_enum!(UserStatus, "status", {
    Active => "ACTIVE",
    Inactive => "INACTIVE",
    Suspended => "SUSPENDED",
});

/// Feature area a permission applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Module {
    Dashboard,
    Inventory,
    Sales,
    Prescriptions,
    Expenses,
    Reports,
    Users,
    Settings,
    Logs,
}

text_enum!(Module, "module", {
    Dashboard => "DASHBOARD",
    Inventory => "INVENTORY",
    Sales => "SALES",
    Prescriptions => "PRESCRIPTIONS",
    Expenses => "EXPENSES",
    Reports => "REPORTS",
    Users => "USERS",
    Settings => "SETTINGS",
    Logs => "LOGS",
});

/// Lifecycle of a prescription.
///
/// ```text
/// PENDING ──(sale references it)──► DISPENSED
///    │
///    └──(manual)──► CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum PrescriptionStatus {
    #[default]
    Pending,
    Dispensed,
    Cancelled,
}

text_enum!(PrescriptionStatus, "status", {
    Pending => "PENDING",
    Dispensed => "DISPENSED",
    Cancelled => "CANCELLED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Gender {
    Male,
    Female,
    Other,
}

text_enum!(Gender, "gender", {
    Male => "MALE",
    Female => "FEMALE",
    Other => "OTHER",
});

/// Category of an audit trail entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ActivityType {
    Auth,
    Inventory,
    Sale,
    Prescription,
    Expense,
    User,
    Settings,
}

text_enum!(ActivityType, "type", {
    Auth => "AUTH",
    Inventory => "INVENTORY",
    Sale => "SALE",
    Prescription => "PRESCRIPTION",
    Expense => "EXPENSE",
    User => "USER",
    Settings => "SETTINGS",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum BackupFrequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

text_enum!(BackupFrequency, "frequency", {
    Daily => "DAILY",
    Weekly => "WEEKLY",
    Monthly => "MONTHLY",
});

/// Derived inventory state. Never stored; see [`crate::inventory::derive_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum InventoryStatus {
    InStock,
    LowStock,
    OutOfStock,
    ExpiringSoon,
    Expired,
}

text_enum!(InventoryStatus, "status", {
    InStock => "IN_STOCK",
    LowStock => "LOW_STOCK",
    OutOfStock => "OUT_OF_STOCK",
    ExpiringSoon => "EXPIRING_SOON",
    Expired => "EXPIRED",
});

/// Bucket width for sales-by-period reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ReportPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

text_enum!(ReportPeriod, "period", {
    Daily => "DAILY",
    Weekly => "WEEKLY",
    Monthly => "MONTHLY",
});

// =============================================================================
// Tenant & Users
// =============================================================================

/// A pharmacy (tenant).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Pharmacy {
    pub id: String,
    pub name: String,
    /// Government license number. Unique across all tenants.
    pub license_number: String,
    pub owner_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A user account. The password hash never leaves the database layer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: String,
    /// Unique across all tenants; stored lower-cased.
    pub email: String,
    pub name: String,
    pub role: Role,
    pub pharmacy_id: String,
    pub status: UserStatus,
    #[ts(as = "Option<String>")]
    pub last_login: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl User {
    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// A per-module grant overriding the role default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserPermission {
    pub user_id: String,
    pub module: Module,
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

// =============================================================================
// Inventory & Sales
// =============================================================================

/// A stocked medicine batch.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InventoryItem {
    pub id: String,
    pub pharmacy_id: String,
    pub name: String,
    /// Manufacturer batch/lot number.
    pub batch: String,
    pub category: String,
    /// Units on hand. Never negative.
    pub quantity: i64,
    /// Unit price in cents.
    pub price_cents: i64,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Value of the units on hand.
    #[inline]
    pub fn stock_value(&self) -> Money {
        self.price().multiply_quantity(self.quantity)
    }

    #[inline]
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date < today
    }
}

/// One sold line. A checkout with several items produces several rows.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub pharmacy_id: String,
    pub item_id: String,
    pub quantity: i64,
    /// Unit price at time of sale × quantity, in cents.
    pub total_price_cents: i64,
    pub user_id: String,
    pub prescription_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }
}

/// A sale joined with the item and seller names for listings and reports.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleDetail {
    pub id: String,
    pub item_id: String,
    pub item_name: String,
    pub category: String,
    pub quantity: i64,
    pub total_price_cents: i64,
    pub user_id: String,
    pub user_name: String,
    pub prescription_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleDetail {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }
}

// =============================================================================
// Prescriptions & Expenses
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Prescription {
    pub id: String,
    pub pharmacy_id: String,
    pub patient_name: String,
    pub age: i64,
    pub gender: Gender,
    pub doctor: String,
    /// Free-text medication lines ("Amoxicillin 500mg, 3x daily").
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub medications: Vec<String>,
    pub status: PrescriptionStatus,
    pub image_url: Option<String>,
    /// User who recorded the prescription.
    pub user_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub pharmacy_id: String,
    pub category: String,
    pub amount_cents: i64,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub user_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Expense {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Audit Trail
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ActivityLog {
    pub id: String,
    pub pharmacy_id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub message: String,
    /// None for system events (e.g. registration before the user exists).
    pub user_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AlertSettings {
    pub pharmacy_id: String,
    pub low_stock_threshold: i64,
    pub expiry_warning_days: i64,
    pub email_notifications: bool,
}

impl AlertSettings {
    pub fn defaults(pharmacy_id: impl Into<String>) -> Self {
        AlertSettings {
            pharmacy_id: pharmacy_id.into(),
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            expiry_warning_days: DEFAULT_EXPIRY_WARNING_DAYS,
            email_notifications: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SecuritySettings {
    pub pharmacy_id: String,
    pub session_timeout_minutes: i64,
    pub password_min_length: i64,
    /// Consecutive failed sign-ins before the account is locked for
    /// [`LOGIN_LOCKOUT_MINUTES`](crate::LOGIN_LOCKOUT_MINUTES).
    pub max_login_attempts: i64,
}

impl SecuritySettings {
    pub fn defaults(pharmacy_id: impl Into<String>) -> Self {
        SecuritySettings {
            pharmacy_id: pharmacy_id.into(),
            session_timeout_minutes: 480,
            password_min_length: DEFAULT_PASSWORD_MIN_LENGTH,
            max_login_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BackupSettings {
    pub pharmacy_id: String,
    pub auto_backup: bool,
    pub frequency: BackupFrequency,
    pub retention_days: i64,
    #[ts(as = "Option<String>")]
    pub last_backup_at: Option<DateTime<Utc>>,
}

impl BackupSettings {
    pub fn defaults(pharmacy_id: impl Into<String>) -> Self {
        BackupSettings {
            pharmacy_id: pharmacy_id.into(),
            auto_backup: false,
            frequency: BackupFrequency::Daily,
            retention_days: 30,
            last_backup_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PharmacySettings {
    pub pharmacy_id: String,
    /// ISO 4217 code shown by the frontend next to amounts.
    pub currency: String,
    pub receipt_footer: Option<String>,
}

impl PharmacySettings {
    pub fn defaults(pharmacy_id: impl Into<String>) -> Self {
        PharmacySettings {
            pharmacy_id: pharmacy_id.into(),
            currency: "USD".to_string(),
            receipt_footer: None,
        }
    }
}
