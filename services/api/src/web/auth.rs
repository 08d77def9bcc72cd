//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user login, token refresh, logout, and the
//! admin console login.

use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use hospital_chat_core::domain::{derive_subject_id, Identity, ADMIN_SUBJECT_PREFIX};
use hospital_chat_core::session::{AdminSession, SessionData, SessionUser};
use hospital_chat_core::tokens::{TokenError, TokenPair};

use crate::web::middleware::session_cookie_value;
use crate::web::state::AppState;
use crate::web::{clear_session_cookie, reject, session_cookie, ErrorBody, Rejection};
use axum::Extension;

/// Product batches are 6-32 characters of letters, digits, and dashes.
static BATCH_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9-]{6,32}$").unwrap());

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub hospital_name: String,
    pub product_batch: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairBody {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in milliseconds.
    pub expires_in: i64,
}

impl From<TokenPair> for TokenPairBody {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub ok: bool,
    pub tokens: TokenPairBody,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub hospital_name: String,
    pub product_batch: String,
    pub has_conversation: bool,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct AdminLoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminLoginResponse {
    pub ok: bool,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/login - Login with a whitelisted (hospital, batch) pair
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 401, description = "Pair not whitelisted", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let hospital_name = req.hospital_name.trim();
    let product_batch = req.product_batch.trim();

    // 1. Validate the input shape before touching the directory.
    if hospital_name.is_empty() || product_batch.is_empty() {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "INVALID_INPUT",
            "Hospital name and product batch must not be empty",
        ));
    }
    if !BATCH_FORMAT.is_match(product_batch) {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "INVALID_INPUT",
            "Product batch format is invalid",
        ));
    }

    // 2. The whitelist gates login.
    let entry = state
        .directory
        .find_pair(hospital_name, product_batch)
        .await
        .map_err(|e| {
            error!("Whitelist lookup failed: {:?}", e);
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "Login failed",
            )
        })?;
    if entry.is_none() {
        warn!(hospital = %hospital_name, "login attempt with non-whitelisted pair");
        return Err(reject(
            StatusCode::UNAUTHORIZED,
            "AUTH_REQUIRED",
            "Hospital name or product batch not recognized",
        ));
    }

    // 3. Derive the opaque subject id and issue the credential pair.
    let subject_id = derive_subject_id(hospital_name, product_batch, &state.config.user_id_salt);
    let pair = state
        .tokens
        .issue(&subject_id, hospital_name, product_batch)
        .map_err(|e| {
            error!("Token issuance failed: {:?}", e);
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "Login failed",
            )
        })?;

    // 4. Establish the fallback session alongside the tokens.
    let sealed = state.sessions.seal(SessionData {
        user: Some(SessionUser {
            hospital_name: hospital_name.to_string(),
            product_batch: product_batch.to_string(),
            user_id: subject_id.clone(),
            conversation_id: None,
        }),
        ..Default::default()
    });
    let cookie = session_cookie(&sealed, state.sessions.ttl().num_seconds());

    info!(subject = %subject_id, "user login");
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            ok: true,
            tokens: pair.into(),
        }),
    ))
}

/// GET /api/auth/me - Current identity
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current identity", body = MeResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
) -> Json<MeResponse> {
    let has_conversation = session_cookie_value(&headers)
        .and_then(|value| state.sessions.open(value))
        .and_then(|session| session.user)
        .and_then(|user| user.conversation_id)
        .is_some();

    Json(MeResponse {
        hospital_name: identity.hospital_name,
        product_batch: identity.product_batch,
        has_conversation,
    })
}

/// POST /api/auth/refresh - Exchange a refresh token for a new pair
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New credential pair", body = LoginResponse),
        (status = 400, description = "Missing refresh token", body = ErrorBody),
        (status = 401, description = "Refresh token invalid or expired", body = ErrorBody)
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<LoginResponse>, Rejection> {
    let refresh_token = req
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            reject(
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                "Missing refresh token",
            )
        })?;

    let pair = state.tokens.refresh(&refresh_token).map_err(|e| {
        let code = match e {
            TokenError::Expired => "AUTH_EXPIRED",
            TokenError::Invalid => "AUTH_REQUIRED",
        };
        reject(
            StatusCode::UNAUTHORIZED,
            code,
            "Refresh token invalid or expired",
        )
    })?;

    Ok(Json(LoginResponse {
        ok: true,
        tokens: pair.into(),
    }))
}

/// POST /api/auth/logout - Discard the session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Logged out", body = OkResponse))
)]
pub async fn logout_handler() -> impl IntoResponse {
    // Tokens are client-side discarded; the cookie is all the server holds.
    (
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(OkResponse { ok: true }),
    )
}

/// POST /api/auth/admin/login - Admin console login
#[utoipa::path(
    post,
    path = "/api/auth/admin/login",
    request_body = AdminLoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AdminLoginResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn admin_login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<impl IntoResponse, Rejection> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "INVALID_INPUT",
            "Username and password must not be empty",
        ));
    }

    // 1. Look up the admin account.
    let admin = state
        .directory
        .find_admin(&req.username)
        .await
        .map_err(|e| {
            error!("Admin lookup failed: {:?}", e);
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "Login failed",
            )
        })?
        .ok_or_else(|| {
            reject(
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Invalid username or password",
            )
        })?;

    // 2. Verify the password against the stored argon2 hash.
    let parsed_hash = PasswordHash::new(&admin.password_hash).map_err(|e| {
        error!("Failed to parse admin password hash: {:?}", e);
        reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "Login failed",
        )
    })?;
    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        warn!(username = %req.username, "admin login with wrong password");
        return Err(reject(
            StatusCode::UNAUTHORIZED,
            "AUTH_REQUIRED",
            "Invalid username or password",
        ));
    }

    // 3. Issue an admin-marked pair and flag the session.
    let subject_id = format!("{}{}", ADMIN_SUBJECT_PREFIX, admin.username);
    let pair = state
        .tokens
        .issue(&subject_id, "admin", "admin")
        .map_err(|e| {
            error!("Token issuance failed: {:?}", e);
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "Login failed",
            )
        })?;

    let sealed = state.sessions.seal(SessionData {
        is_admin: true,
        admin_user: Some(AdminSession {
            username: admin.username.clone(),
            user_id: subject_id.clone(),
        }),
        ..Default::default()
    });
    let cookie = session_cookie(&sealed, state.sessions.ttl().num_seconds());

    info!(subject = %subject_id, "admin login");
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AdminLoginResponse {
            ok: true,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
        }),
    ))
}

/// POST /api/auth/admin/logout - Admin console logout
#[utoipa::path(
    post,
    path = "/api/auth/admin/logout",
    responses((status = 200, description = "Logged out", body = OkResponse))
)]
pub async fn admin_logout_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(OkResponse { ok: true }),
    )
}
