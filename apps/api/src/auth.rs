//! Session authentication.
//!
//! Sessions are HS256 JWTs carried either in the `medtrack_session`
//! cookie (browser) or an `Authorization: Bearer` header (scripts, tests).
//! Every authenticated request reloads the user so deactivation and
//! permission changes apply immediately.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::SharedState;
use medtrack_core::permissions::{self, Action};
use medtrack_core::{Module, User, UserPermission};

pub const SESSION_COOKIE: &str = "medtrack_session";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Tenant the user belongs to
    pub pharmacy_id: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// JWT token manager.
#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    max_lifetime_minutes: i64,
}

impl JwtManager {
    pub fn new(secret: &str, max_lifetime_minutes: i64) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            max_lifetime_minutes,
        }
    }

    /// Effective lifetime: the pharmacy's timeout, capped by the server maximum.
    pub fn lifetime_minutes(&self, pharmacy_timeout_minutes: i64) -> i64 {
        pharmacy_timeout_minutes.clamp(1, self.max_lifetime_minutes)
    }

    /// Issues a session token for `user`.
    pub fn issue(&self, user: &User, lifetime_minutes: i64) -> ApiResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            pharmacy_id: user.pharmacy_id.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(lifetime_minutes)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to generate token: {}", e)))
    }

    /// Validates signature and expiry.
    pub fn validate(&self, token: &str) -> ApiResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Rejected session token");
                ApiError::unauthorized("Invalid or expired session")
            })
    }
}

// =============================================================================
// Passwords
// =============================================================================

/// Hash a password for storage.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against its stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

// =============================================================================
// Cookies & Headers
// =============================================================================

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session.
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
}

/// Finds a cookie by name across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
        .or_else(|| cookie_value(headers, SESSION_COOKIE))
}

// =============================================================================
// Extractor
// =============================================================================

/// The signed-in user with their explicit grants.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub grants: Vec<UserPermission>,
}

impl AuthUser {
    #[inline]
    pub fn id(&self) -> &str {
        &self.user.id
    }

    #[inline]
    pub fn pharmacy_id(&self) -> &str {
        &self.user.pharmacy_id
    }

    /// Fails with 403 unless the user may perform `action` on `module`.
    pub fn require(&self, module: Module, action: Action) -> ApiResult<()> {
        permissions::require(self.user.role, &self.grants, module, action)?;
        Ok(())
    }
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or_else(|| ApiError::unauthorized("Not signed in"))?;
        let claims = state.jwt.validate(token)?;

        let user = state
            .db
            .users()
            .get(&claims.pharmacy_id, &claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Session user no longer exists"))?;

        if !user.is_active() {
            return Err(ApiError::forbidden(format!("Account is {}", user.status)));
        }

        let grants = state.db.permissions().for_user(&user.id).await?;
        Ok(AuthUser { user, grants })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use medtrack_core::{Role, UserStatus};

    fn user() -> User {
        User {
            id: "user-1".to_string(),
            email: "owner@pharmacy.test".to_string(),
            name: "Owner".to_string(),
            role: Role::Admin,
            pharmacy_id: "pharmacy-1".to_string(),
            status: UserStatus::Active,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret-0123456789", 60);
        let token = manager.issue(&user(), 30).unwrap();
        let claims = manager.validate(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.pharmacy_id, "pharmacy-1");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtManager::new("secret-a-0123456789", 60).issue(&user(), 30).unwrap();
        let err = JwtManager::new("secret-b-0123456789", 60).validate(&token).unwrap_err();
        assert_eq!(err.code, "UNAUTHORIZED");
    }

    #[test]
    fn test_lifetime_is_capped() {
        let manager = JwtManager::new("test-secret-0123456789", 120);
        assert_eq!(manager.lifetime_minutes(480), 120);
        assert_eq!(manager.lifetime_minutes(30), 30);
        assert_eq!(manager.lifetime_minutes(0), 1);
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn test_token_from_cookie_or_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; medtrack_session=abc.def"));
        assert_eq!(session_token(&headers), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(session_token(&headers), Some("xyz"));

        assert_eq!(extract_bearer_token("Basic abc"), None);
    }

    #[test]
    fn test_cookie_strings() {
        assert!(session_cookie("t", 60, true).ends_with("; Secure"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
    }
}
