//! # Permission Repository
//!
//! Read side of per-module grants. Writes go through
//! [`UserRepository::replace_permissions`](crate::UserRepository::replace_permissions)
//! so a user's grant set is always swapped as a whole.

use sqlx::SqlitePool;

use crate::error::DbResult;
use medtrack_core::UserPermission;

#[derive(Debug, Clone)]
pub struct PermissionRepository {
    pool: SqlitePool,
}

impl PermissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PermissionRepository { pool }
    }

    /// Explicit grants of a user, ordered by module name.
    pub async fn for_user(&self, user_id: &str) -> DbResult<Vec<UserPermission>> {
        let grants = sqlx::query_as::<_, UserPermission>(
            r#"
            SELECT user_id, module, can_view, can_edit, can_delete
            FROM user_permissions
            WHERE user_id = ?1
            ORDER BY module
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(grants)
    }
}
