//! Staff accounts and their per-module grants.
//!
//! Only administrators can create, change or remove accounts; an
//! administrator can never demote, deactivate or delete themselves.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{hash_password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::SharedState;
use medtrack_core::permissions::{effective_permissions, guard_self_change, AccountChange, Action, ModuleAccess};
use medtrack_core::validation::{validate_email, validate_name, validate_password};
use medtrack_core::{ActivityType, Module, Role, User, UserPermission, UserStatus};
use medtrack_db::{NewUser, UserUpdate};

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/users", get(list).post(create))
        .route("/api/users/{id}", get(get_user).put(update).delete(delete))
        .route("/api/users/{id}/permissions", get(get_permissions).put(set_permissions))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    /// Administrator password reset.
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantInput {
    pub module: Module,
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
}

#[derive(Debug, Deserialize)]
pub struct PermissionsRequest {
    pub permissions: Vec<GrantInput>,
}

#[derive(Debug, Serialize)]
pub struct UserWithPermissions {
    #[serde(flatten)]
    pub user: User,
    pub permissions: Vec<ModuleAccess>,
}

async fn with_permissions(state: &SharedState, user: User) -> ApiResult<UserWithPermissions> {
    let grants = state.db.permissions().for_user(&user.id).await?;
    Ok(UserWithPermissions {
        permissions: effective_permissions(user.role, &grants),
        user,
    })
}

async fn list(State(state): State<SharedState>, auth: AuthUser) -> ApiResult<Json<Vec<User>>> {
    auth.require(Module::Users, Action::View)?;
    let users = state.db.users().list(auth.pharmacy_id()).await?;
    Ok(Json(users))
}

async fn create(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserWithPermissions>)> {
    auth.require(Module::Users, Action::Edit)?;

    let email = validate_email(&req.email)?;
    let name = validate_name("name", &req.name)?;
    let security = state.db.settings().security(auth.pharmacy_id()).await?;
    validate_password(&req.password, security.password_min_length)?;

    if state.db.users().email_exists(&email).await? {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "DUPLICATE",
            format!("A user with email {} already exists", email),
        ));
    }

    let user = state
        .db
        .users()
        .create(
            auth.pharmacy_id(),
            NewUser {
                email,
                name,
                role: req.role,
                password_hash: hash_password(&req.password)?,
            },
        )
        .await?;

    info!(user_id = %user.id, role = %user.role, "User created");
    state
        .db
        .activity()
        .log(
            auth.pharmacy_id(),
            ActivityType::User,
            format!("Created {} account for {}", user.role, user.name),
            Some(auth.id()),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(with_permissions(&state, user).await?)))
}

async fn get_user(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<UserWithPermissions>> {
    auth.require(Module::Users, Action::View)?;
    let user = state.db.users().require(auth.pharmacy_id(), &id).await?;
    Ok(Json(with_permissions(&state, user).await?))
}

async fn update(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<UserWithPermissions>> {
    auth.require(Module::Users, Action::Edit)?;

    guard_self_change(
        &auth.user,
        &id,
        AccountChange {
            role: req.role,
            status: req.status,
            delete: false,
        },
    )?;

    let password_hash = match req.password.as_deref() {
        Some(password) => {
            let security = state.db.settings().security(auth.pharmacy_id()).await?;
            validate_password(password, security.password_min_length)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    let update = UserUpdate {
        name: req.name.as_deref().map(|v| validate_name("name", v)).transpose()?,
        role: req.role,
        status: req.status,
        password_hash,
    };
    let user = state.db.users().update(auth.pharmacy_id(), &id, update).await?;

    let mut changes = Vec::new();
    if let Some(role) = req.role {
        changes.push(format!("role {}", role));
    }
    if let Some(status) = req.status {
        changes.push(format!("status {}", status));
    }
    if req.password.is_some() {
        changes.push("password reset".to_string());
    }
    let message = if changes.is_empty() {
        format!("Updated account of {}", user.name)
    } else {
        format!("Updated account of {} ({})", user.name, changes.join(", "))
    };
    state
        .db
        .activity()
        .log(auth.pharmacy_id(), ActivityType::User, message, Some(auth.id()))
        .await?;

    Ok(Json(with_permissions(&state, user).await?))
}

async fn delete(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    auth.require(Module::Users, Action::Delete)?;

    guard_self_change(
        &auth.user,
        &id,
        AccountChange {
            delete: true,
            ..AccountChange::default()
        },
    )?;

    let user = state.db.users().require(auth.pharmacy_id(), &id).await?;
    state.db.users().delete(auth.pharmacy_id(), &id).await?;

    state
        .db
        .activity()
        .log(
            auth.pharmacy_id(),
            ActivityType::User,
            format!("Deleted account of {} ({})", user.name, user.email),
            Some(auth.id()),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn get_permissions(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<Vec<ModuleAccess>>> {
    auth.require(Module::Users, Action::View)?;
    let user = state.db.users().require(auth.pharmacy_id(), &id).await?;
    Ok(Json(with_permissions(&state, user).await?.permissions))
}

/// Replaces every grant of the user. Modules left out fall back to the
/// role defaults.
async fn set_permissions(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<PermissionsRequest>,
) -> ApiResult<Json<Vec<ModuleAccess>>> {
    auth.require(Module::Users, Action::Edit)?;

    let grants = req
        .permissions
        .into_iter()
        .map(|g| UserPermission {
            user_id: id.clone(),
            module: g.module,
            can_view: g.can_view,
            can_edit: g.can_edit,
            can_delete: g.can_delete,
        })
        .collect();

    let stored = state
        .db
        .users()
        .replace_permissions(auth.pharmacy_id(), &id, grants)
        .await?;
    let user = state.db.users().require(auth.pharmacy_id(), &id).await?;

    state
        .db
        .activity()
        .log(
            auth.pharmacy_id(),
            ActivityType::User,
            format!("Updated permissions of {} ({} grants)", user.name, stored.len()),
            Some(auth.id()),
        )
        .await?;

    Ok(Json(effective_permissions(user.role, &stored)))
}
