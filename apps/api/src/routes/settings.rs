//! Pharmacy settings and backup export.
//!
//! Reads need SETTINGS view; changes need SETTINGS edit, which only
//! administrators can hold. Updates are partial: absent fields keep their
//! stored value.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::SharedState;
use medtrack_core::permissions::Action;
use medtrack_core::validation::{validate_email, validate_name, validate_range, validate_text};
use medtrack_core::{
    ActivityType, AlertSettings, BackupFrequency, BackupSettings, Module, Pharmacy, PharmacySettings,
    SecuritySettings, ValidationError,
};
use medtrack_db::{BackupSnapshot, PharmacyUpdate};

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/settings/alerts", get(get_alerts).put(update_alerts))
        .route("/api/settings/security", get(get_security).put(update_security))
        .route("/api/settings/backup", get(get_backup).put(update_backup))
        .route("/api/settings/backup/export", get(export_backup))
        .route("/api/settings/pharmacy", get(get_pharmacy).put(update_pharmacy))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsRequest {
    pub low_stock_threshold: Option<i64>,
    pub expiry_warning_days: Option<i64>,
    pub email_notifications: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRequest {
    pub session_timeout_minutes: Option<i64>,
    pub password_min_length: Option<i64>,
    pub max_login_attempts: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequest {
    pub auto_backup: Option<bool>,
    pub frequency: Option<BackupFrequency>,
    pub retention_days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PharmacyRequest {
    pub name: Option<String>,
    pub owner_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub currency: Option<String>,
    /// An empty string clears the footer.
    pub receipt_footer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PharmacyProfile {
    pub pharmacy: Pharmacy,
    pub settings: PharmacySettings,
}

async fn log_change(state: &SharedState, auth: &AuthUser, message: String) -> ApiResult<()> {
    state
        .db
        .activity()
        .log(auth.pharmacy_id(), ActivityType::Settings, message, Some(auth.id()))
        .await?;
    Ok(())
}

// =============================================================================
// Alerts
// =============================================================================

async fn get_alerts(State(state): State<SharedState>, auth: AuthUser) -> ApiResult<Json<AlertSettings>> {
    auth.require(Module::Settings, Action::View)?;
    Ok(Json(state.db.settings().alerts(auth.pharmacy_id()).await?))
}

async fn update_alerts(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<AlertsRequest>,
) -> ApiResult<Json<AlertSettings>> {
    auth.require(Module::Settings, Action::Edit)?;

    let current = state.db.settings().alerts(auth.pharmacy_id()).await?;
    let updated = AlertSettings {
        low_stock_threshold: req.low_stock_threshold.unwrap_or(current.low_stock_threshold),
        expiry_warning_days: req.expiry_warning_days.unwrap_or(current.expiry_warning_days),
        email_notifications: req.email_notifications.unwrap_or(current.email_notifications),
        ..current
    };
    validate_range("lowStockThreshold", updated.low_stock_threshold, 0, 100_000)?;
    validate_range("expiryWarningDays", updated.expiry_warning_days, 1, 365)?;

    let saved = state.db.settings().update_alerts(&updated).await?;
    log_change(
        &state,
        &auth,
        format!(
            "Alert settings changed: low stock below {}, expiry warning {} days",
            saved.low_stock_threshold, saved.expiry_warning_days
        ),
    )
    .await?;

    Ok(Json(saved))
}

// =============================================================================
// Security
// =============================================================================

async fn get_security(State(state): State<SharedState>, auth: AuthUser) -> ApiResult<Json<SecuritySettings>> {
    auth.require(Module::Settings, Action::View)?;
    Ok(Json(state.db.settings().security(auth.pharmacy_id()).await?))
}

async fn update_security(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<SecurityRequest>,
) -> ApiResult<Json<SecuritySettings>> {
    auth.require(Module::Settings, Action::Edit)?;

    let current = state.db.settings().security(auth.pharmacy_id()).await?;
    let updated = SecuritySettings {
        session_timeout_minutes: req.session_timeout_minutes.unwrap_or(current.session_timeout_minutes),
        password_min_length: req.password_min_length.unwrap_or(current.password_min_length),
        max_login_attempts: req.max_login_attempts.unwrap_or(current.max_login_attempts),
        ..current
    };
    validate_range("sessionTimeoutMinutes", updated.session_timeout_minutes, 5, 1440)?;
    validate_range("passwordMinLength", updated.password_min_length, 6, 128)?;
    validate_range("maxLoginAttempts", updated.max_login_attempts, 1, 100)?;

    let saved = state.db.settings().update_security(&updated).await?;
    log_change(
        &state,
        &auth,
        format!(
            "Security settings changed: session {} min, password min {} chars",
            saved.session_timeout_minutes, saved.password_min_length
        ),
    )
    .await?;

    Ok(Json(saved))
}

// =============================================================================
// Backup
// =============================================================================

async fn get_backup(State(state): State<SharedState>, auth: AuthUser) -> ApiResult<Json<BackupSettings>> {
    auth.require(Module::Settings, Action::View)?;
    Ok(Json(state.db.settings().backup(auth.pharmacy_id()).await?))
}

async fn update_backup(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<BackupRequest>,
) -> ApiResult<Json<BackupSettings>> {
    auth.require(Module::Settings, Action::Edit)?;

    let current = state.db.settings().backup(auth.pharmacy_id()).await?;
    let updated = BackupSettings {
        auto_backup: req.auto_backup.unwrap_or(current.auto_backup),
        frequency: req.frequency.unwrap_or(current.frequency),
        retention_days: req.retention_days.unwrap_or(current.retention_days),
        ..current
    };
    validate_range("retentionDays", updated.retention_days, 1, 3650)?;

    let saved = state.db.settings().update_backup(&updated).await?;
    log_change(
        &state,
        &auth,
        format!(
            "Backup settings changed: auto {}, {} retention {} days",
            if saved.auto_backup { "on" } else { "off" },
            saved.frequency,
            saved.retention_days
        ),
    )
    .await?;

    Ok(Json(saved))
}

/// Full JSON export of the tenant. Stamps `lastBackupAt`.
async fn export_backup(State(state): State<SharedState>, auth: AuthUser) -> ApiResult<Json<BackupSnapshot>> {
    auth.require(Module::Settings, Action::Edit)?;

    let snapshot = state.db.pharmacies().snapshot(auth.pharmacy_id()).await?;
    state
        .db
        .settings()
        .mark_backup(auth.pharmacy_id(), snapshot.exported_at)
        .await?;

    info!(
        pharmacy_id = %auth.pharmacy_id(),
        items = snapshot.inventory.len(),
        sales = snapshot.sales.len(),
        "Backup exported"
    );
    log_change(
        &state,
        &auth,
        format!("Exported backup at {}", snapshot.exported_at.format("%Y-%m-%d %H:%M UTC")),
    )
    .await?;

    Ok(Json(snapshot))
}

// =============================================================================
// Pharmacy profile
// =============================================================================

async fn get_pharmacy(State(state): State<SharedState>, auth: AuthUser) -> ApiResult<Json<PharmacyProfile>> {
    auth.require(Module::Settings, Action::View)?;

    let pharmacy = state
        .db
        .pharmacies()
        .get(auth.pharmacy_id())
        .await?
        .ok_or_else(|| ApiError::not_found("Pharmacy not found"))?;
    let settings = state.db.settings().general(auth.pharmacy_id()).await?;
    Ok(Json(PharmacyProfile { pharmacy, settings }))
}

fn validate_currency(code: &str) -> Result<String, ValidationError> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a three-letter ISO 4217 code".to_string(),
        });
    }
    Ok(code)
}

async fn update_pharmacy(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<PharmacyRequest>,
) -> ApiResult<Json<PharmacyProfile>> {
    auth.require(Module::Settings, Action::Edit)?;

    let update = PharmacyUpdate {
        name: req.name.as_deref().map(|v| validate_name("name", v)).transpose()?,
        owner_name: req
            .owner_name
            .as_deref()
            .map(|v| validate_name("ownerName", v))
            .transpose()?,
        email: req.email.as_deref().map(validate_email).transpose()?,
        phone: req.phone.as_deref().map(|v| validate_text("phone", v, 50)).transpose()?,
        location: req
            .location
            .as_deref()
            .map(|v| validate_text("location", v, 300))
            .transpose()?,
    };

    let current = state.db.settings().general(auth.pharmacy_id()).await?;
    let settings = PharmacySettings {
        currency: match req.currency.as_deref() {
            Some(code) => validate_currency(code)?,
            None => current.currency.clone(),
        },
        receipt_footer: match req.receipt_footer.as_deref().map(str::trim) {
            Some("") => None,
            Some(footer) => Some(validate_text("receiptFooter", footer, 500)?),
            None => current.receipt_footer.clone(),
        },
        ..current
    };

    let pharmacy = state.db.pharmacies().update(auth.pharmacy_id(), update).await?;
    let settings = state.db.settings().update_general(&settings).await?;
    log_change(&state, &auth, format!("Pharmacy profile of {} updated", pharmacy.name)).await?;

    Ok(Json(PharmacyProfile { pharmacy, settings }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_code_normalized() {
        assert_eq!(validate_currency(" pkr ").unwrap(), "PKR");
        assert!(validate_currency("US").is_err());
        assert!(validate_currency("U$D").is_err());
    }
}
