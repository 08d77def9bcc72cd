//! services/api/src/web/chat.rs
//!
//! The chat endpoint. Forwards a message to the chat backend through the
//! polling gateway and carries the conversation id in the session cookie.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;

use hospital_chat_core::dedup::DedupError;
use hospital_chat_core::domain::Identity;
use hospital_chat_core::gateway::GatewayError;
use hospital_chat_core::session::SessionUser;

use crate::web::middleware::session_cookie_value;
use crate::web::state::AppState;
use crate::web::{reject, session_cookie, ErrorBody, Rejection};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SendRequest {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendResponse {
    pub answer: String,
    pub conversation_id: String,
}

//=========================================================================================
// Handler
//=========================================================================================

/// POST /api/chat/send - Send a message and wait for the answer
#[utoipa::path(
    post,
    path = "/api/chat/send",
    request_body = SendRequest,
    responses(
        (status = 200, description = "Answer from the backend", body = SendResponse),
        (status = 400, description = "Empty message", body = ErrorBody),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 429, description = "Duplicate or too-frequent request", body = ErrorBody),
        (status = 502, description = "Backend unavailable or rejected the request", body = ErrorBody),
        (status = 504, description = "Backend did not answer in time", body = ErrorBody)
    )
)]
pub async fn send_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    Json(req): Json<SendRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "INVALID_INPUT",
            "Message must not be empty",
        ));
    }

    // The guard stays alive for the whole backend exchange so an identical
    // message from the same subject is refused while this one is in flight.
    let _guard = state
        .dedup
        .begin(&identity.subject_id, message)
        .map_err(|e| match e {
            DedupError::DuplicateInFlight => reject(
                StatusCode::TOO_MANY_REQUESTS,
                "DUPLICATE_IN_FLIGHT",
                "An identical request is already being processed",
            ),
            DedupError::Cooldown => reject(
                StatusCode::TOO_MANY_REQUESTS,
                "DUPLICATE_COOLDOWN",
                "Identical request repeated too quickly",
            ),
        })?;

    // Continue an existing conversation if the session carries one.
    let session = session_cookie_value(&headers).and_then(|value| state.sessions.open(value));
    let conversation_id = session
        .as_ref()
        .and_then(|s| s.user.as_ref())
        .and_then(|u| u.conversation_id.clone());

    let reply = state
        .chat
        .send(&identity.subject_id, conversation_id.as_deref(), message)
        .await
        .map_err(|e| match e {
            GatewayError::BackendUnavailable(detail) => {
                warn!(%detail, "chat backend unavailable");
                reject(
                    StatusCode::BAD_GATEWAY,
                    "BACKEND_UNAVAILABLE",
                    "The chat backend could not be reached",
                )
            }
            GatewayError::BackendRejected(detail) => {
                warn!(%detail, "chat backend rejected the request");
                reject(
                    StatusCode::BAD_GATEWAY,
                    "BACKEND_REJECTED",
                    "The chat backend rejected the request",
                )
            }
            GatewayError::Timeout => reject(
                StatusCode::GATEWAY_TIMEOUT,
                "CHAT_TIMEOUT",
                "The chat backend did not answer in time",
            ),
        })?;

    // Re-seal the session so the next message continues this conversation.
    let mut session = session.unwrap_or_default();
    match session.user.as_mut() {
        Some(user) => user.conversation_id = Some(reply.conversation_id.clone()),
        None => {
            session.user = Some(SessionUser {
                hospital_name: identity.hospital_name.clone(),
                product_batch: identity.product_batch.clone(),
                user_id: identity.subject_id.clone(),
                conversation_id: Some(reply.conversation_id.clone()),
            })
        }
    }
    let sealed = state.sessions.seal(session);
    let cookie = session_cookie(&sealed, state.sessions.ttl().num_seconds());

    info!(subject = %identity.subject_id, conversation = %reply.conversation_id, "chat answered");
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(SendResponse {
            answer: reply.answer,
            conversation_id: reply.conversation_id,
        }),
    ))
}
