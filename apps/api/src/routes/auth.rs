//! Registration, sign-in and session management.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{clear_session_cookie, hash_password, session_cookie, verify_password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::SharedState;
use medtrack_core::permissions::{effective_permissions, ModuleAccess};
use medtrack_core::validation::{
    validate_email, validate_license_number, validate_name, validate_password, validate_text,
};
use medtrack_core::{ActivityType, Pharmacy, User, DEFAULT_PASSWORD_MIN_LENGTH, LOGIN_LOCKOUT_MINUTES};
use medtrack_db::{NewAdmin, NewPharmacy};

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route("/api/auth/change-password", post(change_password))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub pharmacy_name: String,
    pub license_number: String,
    pub owner_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: User,
    pub pharmacy: Pharmacy,
    pub permissions: Vec<ModuleAccess>,
    /// Same value as the session cookie, for non-browser clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

async fn register(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = validate_email(&req.email)?;
    let owner_name = validate_name("ownerName", &req.owner_name)?;
    validate_password(&req.password, DEFAULT_PASSWORD_MIN_LENGTH)?;

    let pharmacy = NewPharmacy {
        name: validate_name("pharmacyName", &req.pharmacy_name)?,
        license_number: validate_license_number(&req.license_number)?,
        owner_name: owner_name.clone(),
        email: email.clone(),
        phone: validate_text("phone", &req.phone, 50)?,
        location: validate_text("location", &req.location, 300)?,
    };
    let admin = NewAdmin {
        name: owner_name,
        email,
        password_hash: hash_password(&req.password)?,
    };

    let (pharmacy, user) = state.db.pharmacies().register(pharmacy, admin).await?;
    info!(pharmacy_id = %pharmacy.id, license = %pharmacy.license_number, "Pharmacy registered");

    let security = state.db.settings().security(&pharmacy.id).await?;
    let lifetime = state.jwt.lifetime_minutes(security.session_timeout_minutes);
    let token = state.jwt.issue(&user, lifetime)?;
    let cookie = session_cookie(&token, lifetime * 60, state.config.cookie_secure);

    let body = SessionResponse {
        permissions: effective_permissions(user.role, &[]),
        user,
        pharmacy,
        token: Some(token),
    };
    Ok((StatusCode::CREATED, [(SET_COOKIE, cookie)], Json(body)))
}

fn account_locked() -> ApiError {
    ApiError::new(
        StatusCode::TOO_MANY_REQUESTS,
        "ACCOUNT_LOCKED",
        format!(
            "Too many failed sign-ins. Try again in {} minutes or ask an administrator to reset your password",
            LOGIN_LOCKOUT_MINUTES
        ),
    )
}

async fn login(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let invalid = || ApiError::unauthorized("Invalid email or password");

    let email = validate_email(&req.email).map_err(|_| invalid())?;
    let credentials = state.db.users().credentials_by_email(&email).await?.ok_or_else(invalid)?;

    let now = Utc::now();
    if credentials.is_locked(now) {
        warn!(email = %email, "Login attempt on locked account");
        return Err(account_locked());
    }

    if !verify_password(&req.password, &credentials.password_hash) {
        warn!(email = %email, "Failed login attempt");
        let user = &credentials.user;
        let security = state.db.settings().security(&user.pharmacy_id).await?;
        let lock_until = now + Duration::minutes(LOGIN_LOCKOUT_MINUTES);
        if state
            .db
            .users()
            .record_failed_login(&user.id, security.max_login_attempts, lock_until)
            .await?
        {
            state
                .db
                .activity()
                .log(
                    &user.pharmacy_id,
                    ActivityType::Auth,
                    format!(
                        "{} locked out for {} minutes after {} failed sign-ins",
                        user.name, LOGIN_LOCKOUT_MINUTES, security.max_login_attempts
                    ),
                    Some(&user.id),
                )
                .await?;
            return Err(account_locked());
        }
        return Err(invalid());
    }

    let user = credentials.user;
    if !user.is_active() {
        return Err(ApiError::forbidden(format!("Account is {}", user.status)));
    }

    state.db.users().record_login(&user.id, now).await?;
    state
        .db
        .activity()
        .log(&user.pharmacy_id, ActivityType::Auth, format!("{} signed in", user.name), Some(&user.id))
        .await?;

    let pharmacy = state
        .db
        .pharmacies()
        .get(&user.pharmacy_id)
        .await?
        .ok_or_else(|| ApiError::internal(format!("Pharmacy {} missing for user {}", user.pharmacy_id, user.id)))?;
    let grants = state.db.permissions().for_user(&user.id).await?;
    let security = state.db.settings().security(&pharmacy.id).await?;

    let lifetime = state.jwt.lifetime_minutes(security.session_timeout_minutes);
    let token = state.jwt.issue(&user, lifetime)?;
    let cookie = session_cookie(&token, lifetime * 60, state.config.cookie_secure);

    info!(user_id = %user.id, pharmacy_id = %pharmacy.id, "User signed in");

    let body = SessionResponse {
        permissions: effective_permissions(user.role, &grants),
        user: User {
            last_login: Some(now),
            ..user
        },
        pharmacy,
        token: Some(token),
    };
    Ok(([(SET_COOKIE, cookie)], Json(body)))
}

async fn logout(State(state): State<SharedState>) -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(SET_COOKIE, clear_session_cookie(state.config.cookie_secure))],
    )
}

async fn me(State(state): State<SharedState>, auth: AuthUser) -> ApiResult<Json<SessionResponse>> {
    let pharmacy = state
        .db
        .pharmacies()
        .get(auth.pharmacy_id())
        .await?
        .ok_or_else(|| ApiError::not_found("Pharmacy not found"))?;

    Ok(Json(SessionResponse {
        permissions: effective_permissions(auth.user.role, &auth.grants),
        user: auth.user,
        pharmacy,
        token: None,
    }))
}

async fn change_password(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    let credentials = state
        .db
        .users()
        .credentials_by_id(auth.id())
        .await?
        .ok_or_else(|| ApiError::unauthorized("Session user no longer exists"))?;

    if !verify_password(&req.current_password, &credentials.password_hash) {
        return Err(ApiError::validation("Current password is incorrect"));
    }

    let security = state.db.settings().security(auth.pharmacy_id()).await?;
    validate_password(&req.new_password, security.password_min_length)?;

    state
        .db
        .users()
        .set_password(auth.id(), &hash_password(&req.new_password)?)
        .await?;
    state
        .db
        .activity()
        .log(auth.pharmacy_id(), ActivityType::Auth, format!("{} changed their password", auth.user.name), Some(auth.id()))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
