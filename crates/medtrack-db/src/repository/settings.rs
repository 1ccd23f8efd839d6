//! # Settings Repository
//!
//! Four single-row settings tables per pharmacy. Rows are created with
//! defaults at registration, so reads are `fetch_one` and a missing row
//! means the pharmacy itself does not exist.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use medtrack_core::{AlertSettings, BackupSettings, PharmacySettings, SecuritySettings};

/// Writes the default settings rows for a new pharmacy.
pub(crate) async fn insert_defaults(conn: &mut SqliteConnection, pharmacy_id: &str) -> DbResult<()> {
    let alerts = AlertSettings::defaults(pharmacy_id);
    sqlx::query(
        "INSERT INTO alert_settings (pharmacy_id, low_stock_threshold, expiry_warning_days, email_notifications)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(&alerts.pharmacy_id)
    .bind(alerts.low_stock_threshold)
    .bind(alerts.expiry_warning_days)
    .bind(alerts.email_notifications)
    .execute(&mut *conn)
    .await?;

    let security = SecuritySettings::defaults(pharmacy_id);
    sqlx::query(
        "INSERT INTO security_settings (pharmacy_id, session_timeout_minutes, password_min_length, max_login_attempts)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(&security.pharmacy_id)
    .bind(security.session_timeout_minutes)
    .bind(security.password_min_length)
    .bind(security.max_login_attempts)
    .execute(&mut *conn)
    .await?;

    let backup = BackupSettings::defaults(pharmacy_id);
    sqlx::query(
        "INSERT INTO backup_settings (pharmacy_id, auto_backup, frequency, retention_days, last_backup_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&backup.pharmacy_id)
    .bind(backup.auto_backup)
    .bind(backup.frequency)
    .bind(backup.retention_days)
    .bind(backup.last_backup_at)
    .execute(&mut *conn)
    .await?;

    let general = PharmacySettings::defaults(pharmacy_id);
    sqlx::query("INSERT INTO pharmacy_settings (pharmacy_id, currency, receipt_footer) VALUES (?1, ?2, ?3)")
        .bind(&general.pharmacy_id)
        .bind(&general.currency)
        .bind(&general.receipt_footer)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    // =========================================================================
    // Alerts
    // =========================================================================

    pub async fn alerts(&self, pharmacy_id: &str) -> DbResult<AlertSettings> {
        sqlx::query_as::<_, AlertSettings>(
            "SELECT pharmacy_id, low_stock_threshold, expiry_warning_days, email_notifications
             FROM alert_settings WHERE pharmacy_id = ?1",
        )
        .bind(pharmacy_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Alert settings", pharmacy_id))
    }

    pub async fn update_alerts(&self, settings: &AlertSettings) -> DbResult<AlertSettings> {
        debug!(pharmacy_id = %settings.pharmacy_id, "Updating alert settings");

        let result = sqlx::query(
            "UPDATE alert_settings
             SET low_stock_threshold = ?2, expiry_warning_days = ?3, email_notifications = ?4
             WHERE pharmacy_id = ?1",
        )
        .bind(&settings.pharmacy_id)
        .bind(settings.low_stock_threshold)
        .bind(settings.expiry_warning_days)
        .bind(settings.email_notifications)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Alert settings", &settings.pharmacy_id));
        }
        Ok(settings.clone())
    }

    // =========================================================================
    // Security
    // =========================================================================

    pub async fn security(&self, pharmacy_id: &str) -> DbResult<SecuritySettings> {
        sqlx::query_as::<_, SecuritySettings>(
            "SELECT pharmacy_id, session_timeout_minutes, password_min_length, max_login_attempts
             FROM security_settings WHERE pharmacy_id = ?1",
        )
        .bind(pharmacy_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Security settings", pharmacy_id))
    }

    pub async fn update_security(&self, settings: &SecuritySettings) -> DbResult<SecuritySettings> {
        debug!(pharmacy_id = %settings.pharmacy_id, "Updating security settings");

        let result = sqlx::query(
            "UPDATE security_settings
             SET session_timeout_minutes = ?2, password_min_length = ?3, max_login_attempts = ?4
             WHERE pharmacy_id = ?1",
        )
        .bind(&settings.pharmacy_id)
        .bind(settings.session_timeout_minutes)
        .bind(settings.password_min_length)
        .bind(settings.max_login_attempts)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Security settings", &settings.pharmacy_id));
        }
        Ok(settings.clone())
    }

    // =========================================================================
    // Backup
    // =========================================================================

    pub async fn backup(&self, pharmacy_id: &str) -> DbResult<BackupSettings> {
        sqlx::query_as::<_, BackupSettings>(
            "SELECT pharmacy_id, auto_backup, frequency, retention_days, last_backup_at
             FROM backup_settings WHERE pharmacy_id = ?1",
        )
        .bind(pharmacy_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Backup settings", pharmacy_id))
    }

    /// Updates the schedule. `last_backup_at` is only written by
    /// [`mark_backup`](Self::mark_backup).
    pub async fn update_backup(&self, settings: &BackupSettings) -> DbResult<BackupSettings> {
        debug!(pharmacy_id = %settings.pharmacy_id, "Updating backup settings");

        let result = sqlx::query(
            "UPDATE backup_settings
             SET auto_backup = ?2, frequency = ?3, retention_days = ?4
             WHERE pharmacy_id = ?1",
        )
        .bind(&settings.pharmacy_id)
        .bind(settings.auto_backup)
        .bind(settings.frequency)
        .bind(settings.retention_days)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Backup settings", &settings.pharmacy_id));
        }
        self.backup(&settings.pharmacy_id).await
    }

    pub async fn mark_backup(&self, pharmacy_id: &str, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE backup_settings SET last_backup_at = ?2 WHERE pharmacy_id = ?1")
            .bind(pharmacy_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Pharmacy preferences
    // =========================================================================

    pub async fn general(&self, pharmacy_id: &str) -> DbResult<PharmacySettings> {
        sqlx::query_as::<_, PharmacySettings>(
            "SELECT pharmacy_id, currency, receipt_footer FROM pharmacy_settings WHERE pharmacy_id = ?1",
        )
        .bind(pharmacy_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Pharmacy settings", pharmacy_id))
    }

    pub async fn update_general(&self, settings: &PharmacySettings) -> DbResult<PharmacySettings> {
        let result = sqlx::query(
            "UPDATE pharmacy_settings SET currency = ?2, receipt_footer = ?3 WHERE pharmacy_id = ?1",
        )
        .bind(&settings.pharmacy_id)
        .bind(&settings.currency)
        .bind(&settings.receipt_footer)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Pharmacy settings", &settings.pharmacy_id));
        }
        Ok(settings.clone())
    }
}
