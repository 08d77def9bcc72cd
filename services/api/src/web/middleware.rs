//! services/api/src/web/middleware.rs
//!
//! The auth gate: per-request admission control for protected routes.
//!
//! Two credential extractors run in priority order: the bearer access token,
//! then the session cookie. The session path exists because the system moved
//! from session-only to JWT auth without breaking established sessions; both
//! must be honored concurrently. The gate never refreshes anything itself;
//! refreshing is the client's job via `/api/auth/refresh`.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use hospital_chat_core::domain::{Identity, Role, ADMIN_SUBJECT_PREFIX};
use hospital_chat_core::session::SessionCodec;
use hospital_chat_core::tokens::{TokenError, TokenService};

use crate::web::state::AppState;
use crate::web::{reject, Rejection};

/// Which route family a gate protects. The admin half of a session only
/// counts on admin routes; on user routes it reads as no session at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    User,
    Admin,
}

/// Middleware admitting authenticated users and inserting the admitted
/// `Identity` into request extensions for handlers to use.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Rejection> {
    let identity = authenticate(req.headers(), &state.tokens, &state.sessions, Gate::User)?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Middleware admitting admins only; an authenticated non-admin is forbidden,
/// not unauthenticated.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Rejection> {
    let identity = authenticate(req.headers(), &state.tokens, &state.sessions, Gate::Admin)?;
    if identity.role != Role::Admin {
        debug!(subject = %identity.subject_id, "non-admin rejected from admin route");
        return Err(reject(
            StatusCode::FORBIDDEN,
            "AUTH_FORBIDDEN",
            "Admin privileges required",
        ));
    }
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// The gate decision itself, kept pure over the request headers so it is
/// directly testable. Produces exactly one admitted identity or a rejection.
pub fn authenticate(
    headers: &HeaderMap,
    tokens: &TokenService,
    sessions: &SessionCodec,
    gate: Gate,
) -> Result<Identity, Rejection> {
    // 1. Bearer token takes precedence when present and valid. An invalid
    //    bearer does not preclude the session fallback.
    let mut bearer_expired = false;
    match bearer_identity(headers, tokens) {
        Bearer::Valid(identity) => return Ok(identity),
        Bearer::Expired => bearer_expired = true,
        Bearer::Invalid | Bearer::Missing => {}
    }

    // 2. Session cookie fallback.
    if let Some(identity) = session_identity(headers, sessions, gate) {
        return Ok(identity);
    }

    // 3. No usable credential. Expired bearers are distinguished so the
    //    client can attempt a refresh before redirecting to login.
    if bearer_expired {
        Err(reject(
            StatusCode::UNAUTHORIZED,
            "AUTH_EXPIRED",
            "Access token expired",
        ))
    } else {
        Err(reject(
            StatusCode::UNAUTHORIZED,
            "AUTH_REQUIRED",
            "Please log in first",
        ))
    }
}

enum Bearer {
    Missing,
    Valid(Identity),
    Expired,
    Invalid,
}

fn bearer_identity(headers: &HeaderMap, tokens: &TokenService) -> Bearer {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let Some(token) = token else {
        return Bearer::Missing;
    };

    match tokens.verify_access(token) {
        Ok(claims) => {
            let role = if claims.is_admin() {
                Role::Admin
            } else {
                Role::User
            };
            Bearer::Valid(Identity {
                subject_id: claims.sub,
                hospital_name: claims.hospital_name,
                product_batch: claims.product_batch,
                role,
            })
        }
        Err(TokenError::Expired) => Bearer::Expired,
        Err(TokenError::Invalid) => Bearer::Invalid,
    }
}

fn session_identity(headers: &HeaderMap, sessions: &SessionCodec, gate: Gate) -> Option<Identity> {
    let data = sessions.open(session_cookie_value(headers)?)?;

    if let Some(user) = data.user {
        return Some(Identity {
            subject_id: user.user_id,
            hospital_name: user.hospital_name,
            product_batch: user.product_batch,
            role: Role::User,
        });
    }
    if gate == Gate::Admin && data.is_admin {
        let subject_id = data
            .admin_user
            .map(|admin| admin.user_id)
            .unwrap_or_else(|| ADMIN_SUBJECT_PREFIX.to_string());
        return Some(Identity {
            subject_id,
            hospital_name: "admin".to_string(),
            product_batch: "admin".to_string(),
            role: Role::Admin,
        });
    }
    None
}

/// Extracts the raw session cookie value from the `Cookie` header.
pub fn session_cookie_value(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use hospital_chat_core::session::{AdminSession, SessionData, SessionUser};

    fn tokens() -> TokenService {
        TokenService::new(
            b"access-secret-for-tests",
            b"refresh-secret-for-tests",
            ChronoDuration::minutes(15),
            ChronoDuration::days(7),
        )
    }

    fn sessions() -> SessionCodec {
        SessionCodec::new(b"session-secret-for-tests", ChronoDuration::hours(24))
    }

    fn user_cookie(codec: &SessionCodec) -> String {
        let sealed = codec.seal(SessionData {
            user: Some(SessionUser {
                hospital_name: "City Hospital".to_string(),
                product_batch: "BATCH001X".to_string(),
                user_id: "user-42".to_string(),
                conversation_id: None,
            }),
            ..Default::default()
        });
        format!("session={}", sealed)
    }

    fn code(rejection: &Rejection) -> &'static str {
        rejection.1.code
    }

    #[test]
    fn valid_bearer_takes_precedence_over_a_stale_cookie() {
        let tokens = tokens();
        let sessions = sessions();
        let pair = tokens.issue("user-42", "City Hospital", "BATCH001X").unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", pair.access_token).parse().unwrap(),
        );
        headers.insert(header::COOKIE, "session=not-a-valid-session".parse().unwrap());

        let identity = authenticate(&headers, &tokens, &sessions, Gate::User).unwrap();
        assert_eq!(identity.subject_id, "user-42");
        assert_eq!(identity.role, Role::User);
    }

    #[test]
    fn session_cookie_admits_without_a_bearer() {
        let tokens = tokens();
        let sessions = sessions();

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, user_cookie(&sessions).parse().unwrap());

        let identity = authenticate(&headers, &tokens, &sessions, Gate::User).unwrap();
        assert_eq!(identity.subject_id, "user-42");
        assert_eq!(identity.hospital_name, "City Hospital");
    }

    #[test]
    fn invalid_bearer_falls_through_to_the_session() {
        let tokens = tokens();
        let sessions = sessions();

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer garbage".parse().unwrap());
        headers.insert(header::COOKIE, user_cookie(&sessions).parse().unwrap());

        let identity = authenticate(&headers, &tokens, &sessions, Gate::User).unwrap();
        assert_eq!(identity.subject_id, "user-42");
    }

    #[test]
    fn expired_bearer_without_a_session_reads_as_expired() {
        // A service whose access tokens are born expired.
        let expired_issuer = TokenService::new(
            b"access-secret-for-tests",
            b"refresh-secret-for-tests",
            ChronoDuration::seconds(-60),
            ChronoDuration::days(7),
        );
        let pair = expired_issuer
            .issue("user-42", "City Hospital", "BATCH001X")
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", pair.access_token).parse().unwrap(),
        );

        let rejection = authenticate(&headers, &tokens(), &sessions(), Gate::User).unwrap_err();
        assert_eq!(rejection.0, StatusCode::UNAUTHORIZED);
        assert_eq!(code(&rejection), "AUTH_EXPIRED");
    }

    #[test]
    fn no_credentials_reads_as_required() {
        let rejection =
            authenticate(&HeaderMap::new(), &tokens(), &sessions(), Gate::User).unwrap_err();
        assert_eq!(rejection.0, StatusCode::UNAUTHORIZED);
        assert_eq!(code(&rejection), "AUTH_REQUIRED");
    }

    #[test]
    fn admin_bearer_is_admin_role() {
        let tokens = tokens();
        let pair = tokens.issue("admin_root", "admin", "admin").unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", pair.access_token).parse().unwrap(),
        );

        let identity = authenticate(&headers, &tokens, &sessions(), Gate::User).unwrap();
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn admin_session_flag_is_admin_role() {
        let sessions = sessions();
        let sealed = sessions.seal(SessionData {
            is_admin: true,
            admin_user: Some(AdminSession {
                username: "root".to_string(),
                user_id: "admin_root".to_string(),
            }),
            ..Default::default()
        });

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            format!("session={}", sealed).parse().unwrap(),
        );

        let identity = authenticate(&headers, &tokens(), &sessions, Gate::Admin).unwrap();
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(identity.subject_id, "admin_root");
    }

    #[test]
    fn admin_only_session_is_not_admitted_on_user_routes() {
        let sessions = sessions();
        let sealed = sessions.seal(SessionData {
            is_admin: true,
            admin_user: Some(AdminSession {
                username: "root".to_string(),
                user_id: "admin_root".to_string(),
            }),
            ..Default::default()
        });

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            format!("session={}", sealed).parse().unwrap(),
        );

        let rejection = authenticate(&headers, &tokens(), &sessions, Gate::User).unwrap_err();
        assert_eq!(rejection.0, StatusCode::UNAUTHORIZED);
        assert_eq!(code(&rejection), "AUTH_REQUIRED");
    }
}
