//! # Activity Repository
//!
//! Audit trail of user actions. Transactional operations (registration,
//! checkout) write their log row through [`insert_log`] on the open
//! transaction so the entry commits or rolls back with the change.

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::new_id;
use medtrack_core::{ActivityLog, ActivityType};

/// Default and maximum page sizes for log listings.
pub const DEFAULT_LOG_LIMIT: i64 = 100;
pub const MAX_LOG_LIMIT: i64 = 500;

/// Filters for [`ActivityRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub activity_type: Option<ActivityType>,
    pub user_id: Option<String>,
    pub limit: Option<i64>,
}

/// Builds a log entry stamped now.
pub fn new_log(
    pharmacy_id: &str,
    activity_type: ActivityType,
    message: impl Into<String>,
    user_id: Option<&str>,
) -> ActivityLog {
    ActivityLog {
        id: new_id(),
        pharmacy_id: pharmacy_id.to_string(),
        activity_type,
        message: message.into(),
        user_id: user_id.map(str::to_string),
        created_at: Utc::now(),
    }
}

/// Inserts a log row on any executor (pool or open transaction).
pub(crate) async fn insert_log<'e, E>(executor: E, log: &ActivityLog) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO activity_logs (id, pharmacy_id, activity_type, message, user_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&log.id)
    .bind(&log.pharmacy_id)
    .bind(log.activity_type)
    .bind(&log.message)
    .bind(&log.user_id)
    .bind(log.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

#[derive(Debug, Clone)]
pub struct ActivityRepository {
    pool: SqlitePool,
}

impl ActivityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ActivityRepository { pool }
    }

    /// Records an action.
    pub async fn log(
        &self,
        pharmacy_id: &str,
        activity_type: ActivityType,
        message: impl Into<String>,
        user_id: Option<&str>,
    ) -> DbResult<ActivityLog> {
        let entry = new_log(pharmacy_id, activity_type, message, user_id);
        debug!(pharmacy_id = %pharmacy_id, activity_type = %activity_type, "Logging activity");
        insert_log(&self.pool, &entry).await?;
        Ok(entry)
    }

    /// Newest entries first.
    pub async fn list(&self, pharmacy_id: &str, filter: &ActivityFilter) -> DbResult<Vec<ActivityLog>> {
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_LOG_LIMIT)
            .clamp(1, MAX_LOG_LIMIT);

        let logs = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT id, pharmacy_id, activity_type, message, user_id, created_at
            FROM activity_logs
            WHERE pharmacy_id = ?1
              AND (?2 IS NULL OR activity_type = ?2)
              AND (?3 IS NULL OR user_id = ?3)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?4
            "#,
        )
        .bind(pharmacy_id)
        .bind(filter.activity_type)
        .bind(&filter.user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    pub async fn recent(&self, pharmacy_id: &str, limit: i64) -> DbResult<Vec<ActivityLog>> {
        self.list(
            pharmacy_id,
            &ActivityFilter {
                limit: Some(limit),
                ..Default::default()
            },
        )
        .await
    }
}
