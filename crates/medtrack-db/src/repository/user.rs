//! # User Repository
//!
//! Accounts within a pharmacy. Password hashes are produced by the API
//! layer (argon2) and only leave this module through [`UserCredentials`]
//! for verification at login.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use medtrack_core::permissions::normalize_grant;
use medtrack_core::{Role, User, UserPermission, UserStatus};

const USER_COLUMNS: &str = "id, email, name, role, pharmacy_id, status, last_login, created_at";

/// A user row with its password hash, for login and password changes.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserCredentials {
    #[sqlx(flatten)]
    pub user: User,
    pub password_hash: String,
    /// Set while the account is locked out after failed sign-ins.
    pub locked_until: Option<DateTime<Utc>>,
}

impl UserCredentials {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

/// Validated data for a staff account created by an administrator.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    /// New argon2 hash for an administrator password reset. Also lifts
    /// any login lockout.
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Gets a user of the given pharmacy.
    pub async fn get(&self, pharmacy_id: &str, id: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1 AND pharmacy_id = ?2", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(pharmacy_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Gets a user of the given pharmacy or fails with NotFound.
    pub async fn require(&self, pharmacy_id: &str, id: &str) -> DbResult<User> {
        self.get(pharmacy_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    pub async fn credentials_by_email(&self, email: &str) -> DbResult<Option<UserCredentials>> {
        let sql = format!("SELECT {}, password_hash, locked_until FROM users WHERE email = ?1", USER_COLUMNS);
        let creds = sqlx::query_as::<_, UserCredentials>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(creds)
    }

    pub async fn credentials_by_id(&self, id: &str) -> DbResult<Option<UserCredentials>> {
        let sql = format!("SELECT {}, password_hash, locked_until FROM users WHERE id = ?1", USER_COLUMNS);
        let creds = sqlx::query_as::<_, UserCredentials>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(creds)
    }

    pub async fn email_exists(&self, email: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// All users of a pharmacy, administrators first.
    pub async fn list(&self, pharmacy_id: &str) -> DbResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE pharmacy_id = ?1
             ORDER BY CASE role WHEN 'ADMIN' THEN 0 WHEN 'PHARMACIST' THEN 1 ELSE 2 END, name",
            USER_COLUMNS
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(pharmacy_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    pub async fn create(&self, pharmacy_id: &str, new_user: NewUser) -> DbResult<User> {
        if self.email_exists(&new_user.email).await? {
            return Err(DbError::duplicate("email", &new_user.email));
        }

        let user = User {
            id: new_id(),
            email: new_user.email,
            name: new_user.name,
            role: new_user.role,
            pharmacy_id: pharmacy_id.to_string(),
            status: UserStatus::Active,
            last_login: None,
            created_at: Utc::now(),
        };

        debug!(user_id = %user.id, pharmacy_id = %pharmacy_id, role = %user.role, "Creating user");

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, name, role, pharmacy_id, status, last_login, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&new_user.password_hash)
        .bind(&user.name)
        .bind(user.role)
        .bind(&user.pharmacy_id)
        .bind(user.status)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn update(&self, pharmacy_id: &str, id: &str, update: UserUpdate) -> DbResult<User> {
        let current = self.require(pharmacy_id, id).await?;

        let updated = User {
            name: update.name.unwrap_or(current.name),
            role: update.role.unwrap_or(current.role),
            status: update.status.unwrap_or(current.status),
            ..current
        };

        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = ?3, role = ?4, status = ?5,
                password_hash = COALESCE(?6, password_hash),
                failed_login_attempts = CASE WHEN ?6 IS NULL THEN failed_login_attempts ELSE 0 END,
                locked_until = CASE WHEN ?6 IS NULL THEN locked_until ELSE NULL END
            WHERE id = ?1 AND pharmacy_id = ?2
            "#,
        )
        .bind(&updated.id)
        .bind(pharmacy_id)
        .bind(&updated.name)
        .bind(updated.role)
        .bind(updated.status)
        .bind(update.password_hash.as_deref())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(updated)
    }

    pub async fn set_password(&self, id: &str, password_hash: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ?2 WHERE id = ?1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    /// Stamps a successful sign-in and clears the failed-attempt count.
    pub async fn record_login(&self, id: &str, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            "UPDATE users SET last_login = ?2, failed_login_attempts = 0, locked_until = NULL WHERE id = ?1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Counts a failed sign-in. The attempt that reaches `max_attempts`
    /// locks the account until `lock_until` and restarts the count.
    ///
    /// Returns true when this attempt engaged the lock.
    pub async fn record_failed_login(
        &self,
        id: &str,
        max_attempts: i64,
        lock_until: DateTime<Utc>,
    ) -> DbResult<bool> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET failed_login_attempts = CASE WHEN failed_login_attempts + 1 >= ?2 THEN 0
                                             ELSE failed_login_attempts + 1 END,
                locked_until = CASE WHEN failed_login_attempts + 1 >= ?2 THEN ?3 ELSE locked_until END
            WHERE id = ?1
            RETURNING failed_login_attempts
            "#,
        )
        .bind(id)
        .bind(max_attempts.max(1))
        .bind(lock_until)
        .fetch_optional(&self.pool)
        .await?;

        let attempts = remaining.ok_or_else(|| DbError::not_found("User", id))?;
        if attempts == 0 {
            info!(user_id = %id, until = %lock_until, "Account locked after failed sign-ins");
        }
        Ok(attempts == 0)
    }

    /// Deletes an account that has no recorded work. Users who made sales,
    /// recorded prescriptions or expenses must be deactivated instead so
    /// the history keeps its author.
    pub async fn delete(&self, pharmacy_id: &str, id: &str) -> DbResult<()> {
        self.require(pharmacy_id, id).await?;

        let references: i64 = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM sales WHERE user_id = ?1)
                 + (SELECT COUNT(*) FROM prescriptions WHERE user_id = ?1)
                 + (SELECT COUNT(*) FROM expenses WHERE user_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if references > 0 {
            return Err(DbError::in_use(
                "User",
                "user has recorded sales, prescriptions or expenses; deactivate the account instead",
            ));
        }

        sqlx::query("DELETE FROM users WHERE id = ?1 AND pharmacy_id = ?2")
            .bind(id)
            .bind(pharmacy_id)
            .execute(&self.pool)
            .await?;

        info!(user_id = %id, pharmacy_id = %pharmacy_id, "User deleted");
        Ok(())
    }

    /// Replaces every grant of a user in one transaction. Grants are
    /// normalized (edit or delete implies view) before they are stored.
    pub async fn replace_permissions(
        &self,
        pharmacy_id: &str,
        user_id: &str,
        grants: Vec<UserPermission>,
    ) -> DbResult<Vec<UserPermission>> {
        self.require(pharmacy_id, user_id).await?;

        let mut stored: Vec<UserPermission> = Vec::with_capacity(grants.len());
        for grant in grants {
            let grant = normalize_grant(UserPermission {
                user_id: user_id.to_string(),
                ..grant
            });
            match stored.iter_mut().find(|g| g.module == grant.module) {
                Some(existing) => *existing = grant,
                None => stored.push(grant),
            }
        }

        debug!(user_id = %user_id, grants = stored.len(), "Replacing permissions");

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_permissions WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for grant in &stored {
            sqlx::query(
                "INSERT INTO user_permissions (user_id, module, can_view, can_edit, can_delete)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&grant.user_id)
            .bind(grant.module)
            .bind(grant.can_view)
            .bind(grant.can_edit)
            .bind(grant.can_delete)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        stored.sort_by_key(|g| g.module);
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{register, test_db};
    use medtrack_core::Module;

    fn worker(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Counter Clerk".to_string(),
            role: Role::Worker,
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_list_and_credentials() {
        let db = test_db().await;
        let (pharmacy, admin) = register(&db, "users").await;
        let repo = db.users();

        let clerk = repo.create(&pharmacy.id, worker("clerk@users.test")).await.unwrap();
        assert_eq!(clerk.status, UserStatus::Active);

        let users = repo.list(&pharmacy.id).await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, admin.id);

        let creds = repo.credentials_by_email("clerk@users.test").await.unwrap().unwrap();
        assert_eq!(creds.user.id, clerk.id);
        assert_eq!(creds.password_hash, "hash");

        let dup = repo.create(&pharmacy.id, worker("clerk@users.test")).await.unwrap_err();
        assert!(matches!(dup, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_and_login_stamp() {
        let db = test_db().await;
        let (pharmacy, _) = register(&db, "upd").await;
        let repo = db.users();
        let clerk = repo.create(&pharmacy.id, worker("clerk@upd.test")).await.unwrap();

        let updated = repo
            .update(
                &pharmacy.id,
                &clerk.id,
                UserUpdate {
                    role: Some(Role::Pharmacist),
                    status: Some(UserStatus::Suspended),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Pharmacist);
        assert_eq!(updated.status, UserStatus::Suspended);
        assert_eq!(updated.name, "Counter Clerk");

        repo.record_login(&clerk.id, Utc::now()).await.unwrap();
        let reloaded = repo.require(&pharmacy.id, &clerk.id).await.unwrap();
        assert!(reloaded.last_login.is_some());
    }

    #[tokio::test]
    async fn test_update_with_password_reset_is_one_write() {
        let db = test_db().await;
        let (pharmacy, _) = register(&db, "reset").await;
        let repo = db.users();
        let clerk = repo.create(&pharmacy.id, worker("clerk@reset.test")).await.unwrap();

        let updated = repo
            .update(
                &pharmacy.id,
                &clerk.id,
                UserUpdate {
                    role: Some(Role::Pharmacist),
                    password_hash: Some("new-hash".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Pharmacist);

        let creds = repo.credentials_by_id(&clerk.id).await.unwrap().unwrap();
        assert_eq!(creds.password_hash, "new-hash");
        assert_eq!(creds.user.role, Role::Pharmacist);

        // Without a new hash the stored one is kept.
        repo.update(
            &pharmacy.id,
            &clerk.id,
            UserUpdate {
                name: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let creds = repo.credentials_by_id(&clerk.id).await.unwrap().unwrap();
        assert_eq!(creds.password_hash, "new-hash");
        assert_eq!(creds.user.name, "Renamed");
    }

    #[tokio::test]
    async fn test_failed_logins_lock_until_success_or_reset() {
        let db = test_db().await;
        let (pharmacy, _) = register(&db, "lock").await;
        let repo = db.users();
        let clerk = repo.create(&pharmacy.id, worker("clerk@lock.test")).await.unwrap();
        let now = Utc::now();
        let until = now + chrono::Duration::minutes(15);

        assert!(!repo.record_failed_login(&clerk.id, 3, until).await.unwrap());
        assert!(!repo.record_failed_login(&clerk.id, 3, until).await.unwrap());
        assert!(!repo.credentials_by_id(&clerk.id).await.unwrap().unwrap().is_locked(now));

        assert!(repo.record_failed_login(&clerk.id, 3, until).await.unwrap());
        let creds = repo.credentials_by_id(&clerk.id).await.unwrap().unwrap();
        assert!(creds.is_locked(now));
        assert!(!creds.is_locked(until + chrono::Duration::seconds(1)));

        // A password reset lifts the lock.
        repo.update(
            &pharmacy.id,
            &clerk.id,
            UserUpdate {
                password_hash: Some("fresh".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(!repo.credentials_by_id(&clerk.id).await.unwrap().unwrap().is_locked(now));

        // A successful sign-in restarts the count.
        assert!(!repo.record_failed_login(&clerk.id, 2, until).await.unwrap());
        repo.record_login(&clerk.id, now).await.unwrap();
        assert!(!repo.record_failed_login(&clerk.id, 2, until).await.unwrap());

        assert!(matches!(
            repo.record_failed_login("missing", 3, until).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_users_are_tenant_scoped() {
        let db = test_db().await;
        let (a, _) = register(&db, "ua").await;
        let (b, _) = register(&db, "ub").await;
        let clerk = db.users().create(&a.id, worker("clerk@ua.test")).await.unwrap();

        assert!(db.users().get(&b.id, &clerk.id).await.unwrap().is_none());
        assert!(db.users().delete(&b.id, &clerk.id).await.is_err());
    }

    #[tokio::test]
    async fn test_replace_permissions() {
        let db = test_db().await;
        let (pharmacy, _) = register(&db, "perm").await;
        let clerk = db.users().create(&pharmacy.id, worker("clerk@perm.test")).await.unwrap();

        let grant = |module, view, edit| UserPermission {
            user_id: String::new(),
            module,
            can_view: view,
            can_edit: edit,
            can_delete: false,
        };

        let stored = db
            .users()
            .replace_permissions(
                &pharmacy.id,
                &clerk.id,
                vec![grant(Module::Inventory, false, true), grant(Module::Reports, true, false)],
            )
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored[0].can_view, "edit implies view");

        db.users()
            .replace_permissions(&pharmacy.id, &clerk.id, vec![grant(Module::Expenses, true, false)])
            .await
            .unwrap();
        let current = db.permissions().for_user(&clerk.id).await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].module, Module::Expenses);
    }

    #[tokio::test]
    async fn test_delete_unused_user() {
        let db = test_db().await;
        let (pharmacy, _) = register(&db, "del").await;
        let clerk = db.users().create(&pharmacy.id, worker("clerk@del.test")).await.unwrap();

        db.users().delete(&pharmacy.id, &clerk.id).await.unwrap();
        assert!(db.users().get(&pharmacy.id, &clerk.id).await.unwrap().is_none());
    }
}
