//! Route modules, one per feature area.
//!
//! Handlers follow the same shape: gate on the caller's permissions,
//! validate input with `medtrack_core::validation`, call a repository
//! scoped to the caller's pharmacy, then record an activity log entry
//! for writes.

use axum::Router;
use chrono::{NaiveDate, Utc};

use crate::SharedState;

pub mod auth;
pub mod dashboard;
pub mod expenses;
pub mod health;
pub mod inventory;
pub mod logs;
pub mod prescriptions;
pub mod reports;
pub mod sales;
pub mod settings;
pub mod users;

pub fn router() -> Router<SharedState> {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(dashboard::routes())
        .merge(inventory::routes())
        .merge(sales::routes())
        .merge(prescriptions::routes())
        .merge(expenses::routes())
        .merge(reports::routes())
        .merge(users::routes())
        .merge(settings::routes())
        .merge(logs::routes())
}

/// Server-local calendar day used for expiry and report ranges.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Treats blank query values as absent.
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
