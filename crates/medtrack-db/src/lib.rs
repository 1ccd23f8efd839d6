//! # medtrack-db: Database Layer for MedTrack
//!
//! This crate provides database access for the MedTrack API.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MedTrack Data Flow                               │
//! │                                                                         │
//! │  HTTP handler (POST /api/sales)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   medtrack-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ InventoryRepo  │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SaleRepo       │    │ 0001_initial │  │   │
//! │  │   │ Connection    │    │ UserRepo       │    │   _schema    │  │   │
//! │  │   │ Management    │    │ ...            │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per table group, all tenant-scoped
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medtrack_db::{Database, DbConfig, InventoryFilter};
//!
//! // Migrations run on connect unless disabled in the config
//! let db = Database::new(DbConfig::new("path/to/medtrack.db")).await?;
//!
//! let items = db.inventory().list(&pharmacy_id, &InventoryFilter::default()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{
    ActivityFilter, ActivityRepository, BackupSnapshot, DashboardRepository, DashboardSummary, ExpenseFilter,
    ExpenseRepository, InventoryFilter, InventoryRepository, ItemUpdate, NewAdmin, NewExpense, NewItem, NewPharmacy,
    NewPrescription, NewUser, PermissionRepository, PharmacyRepository, PharmacyUpdate, PrescriptionFilter,
    PrescriptionRepository, PrescriptionUpdate, SaleFilter, SaleRepository, SettingsRepository, UserCredentials,
    UserRepository, UserUpdate,
};
