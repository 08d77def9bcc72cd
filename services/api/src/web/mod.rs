//! services/api/src/web/mod.rs
//!
//! The HTTP surface: handlers, auth middleware, and shared response shapes.

pub mod auth;
pub mod chat;
pub mod middleware;
pub mod rest;
pub mod state;
#[cfg(test)]
pub(crate) mod testutil;

pub use chat::send_handler;
pub use middleware::{require_admin, require_auth};
pub use rest::{list_pairs_handler, status_handler};

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Wire shape of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[schema(value_type = String)]
    pub code: &'static str,
}

/// The uniform handler rejection: an HTTP status plus a coded error body.
pub type Rejection = (StatusCode, Json<ErrorBody>);

pub fn reject(status: StatusCode, code: &'static str, message: impl Into<String>) -> Rejection {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
            code,
        }),
    )
}

/// Builds the session Set-Cookie value.
pub fn session_cookie(value: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, value, max_age_secs
    )
}

/// Overwrites the session with an immediately expiring, empty cookie.
pub fn clear_session_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}
