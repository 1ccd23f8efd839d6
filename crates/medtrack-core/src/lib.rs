//! # medtrack-core: Pure Business Rules for MedTrack
//!
//! This crate contains the business rules of the pharmacy system as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        MedTrack Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web Frontend                                 │   │
//! │  │    Inventory ──► Sales ──► Prescriptions ──► Reports           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP JSON                              │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/api (axum)                              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ medtrack-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌──────────┐  │   │
//! │  │   │ inventory │  │   sale    │  │permissions │  │ reports  │  │   │
//! │  │   │  status   │  │ planning  │  │  gating    │  │ P&L, bins│  │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 medtrack-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities and enums (User, InventoryItem, Sale, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation rules
//! - [`inventory`] - Inventory status derivation
//! - [`sale`] - Cart merging and sale line planning
//! - [`permissions`] - Role defaults and grant resolution
//! - [`reports`] - Profit/loss and sales-by-period aggregation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use medtrack_core::inventory::{derive_status, InventoryThresholds};
//! use medtrack_core::InventoryStatus;
//!
//! let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
//! let expiry = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
//!
//! let status = derive_status(5, expiry, today, &InventoryThresholds::default());
//! assert_eq!(status, InventoryStatus::LowStock);
//! ```

pub mod error;
pub mod inventory;
pub mod money;
pub mod permissions;
pub mod reports;
pub mod sale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single item in one sale line.
///
/// ## Business Reason
/// Prevents accidental over-dispensing (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum units on hand for one inventory record.
pub const MAX_STOCK_LEVEL: i64 = 1_000_000;

/// Maximum unit price in cents (1,000,000.00).
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Maximum single expense in cents (100,000,000.00).
pub const MAX_EXPENSE_CENTS: i64 = 10_000_000_000;

/// Maximum distinct lines in a single sale.
pub const MAX_SALE_LINES: usize = 100;

/// Stock level at or below which an item is reported as low stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Days before expiry at which an item is reported as expiring soon.
pub const DEFAULT_EXPIRY_WARNING_DAYS: i64 = 30;

/// Minimum password length when the pharmacy has not configured one.
pub const DEFAULT_PASSWORD_MIN_LENGTH: i64 = 8;

/// How long an account stays locked after too many failed sign-ins.
pub const LOGIN_LOCKOUT_MINUTES: i64 = 15;
