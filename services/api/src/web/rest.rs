//! services/api/src/web/rest.rs
//!
//! Service status, the admin whitelist listing, and the OpenAPI document.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

use crate::web::state::AppState;
use crate::web::{reject, ErrorBody, Rejection};

//=========================================================================================
// OpenAPI Document
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::login_handler,
        crate::web::auth::me_handler,
        crate::web::auth::refresh_handler,
        crate::web::auth::logout_handler,
        crate::web::auth::admin_login_handler,
        crate::web::auth::admin_logout_handler,
        crate::web::chat::send_handler,
        status_handler,
        list_pairs_handler,
    ),
    components(schemas(
        crate::web::auth::LoginRequest,
        crate::web::auth::LoginResponse,
        crate::web::auth::TokenPairBody,
        crate::web::auth::MeResponse,
        crate::web::auth::RefreshRequest,
        crate::web::auth::OkResponse,
        crate::web::auth::AdminLoginRequest,
        crate::web::auth::AdminLoginResponse,
        crate::web::chat::SendRequest,
        crate::web::chat::SendResponse,
        StatusResponse,
        PairBody,
        PairListResponse,
        ErrorBody,
    )),
    tags(
        (name = "auth", description = "Login, refresh, and logout"),
        (name = "chat", description = "Chat with the hospital assistant"),
        (name = "admin", description = "Whitelist administration"),
        (name = "status", description = "Service status")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Status
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub message: String,
    pub version: String,
    pub status: String,
}

/// GET /api/status - Service liveness and version
#[utoipa::path(
    get,
    path = "/api/status",
    tag = "status",
    responses((status = 200, description = "Service is up", body = StatusResponse))
)]
pub async fn status_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "Hospital chat service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
    })
}

//=========================================================================================
// Admin Whitelist Listing
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct PairListQuery {
    #[serde(default)]
    pub keyword: String,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

#[derive(Serialize, ToSchema)]
pub struct PairBody {
    pub id: i64,
    pub hospital_name: String,
    pub product_batch: String,
    pub created_at: String,
}

#[derive(Serialize, ToSchema)]
pub struct PairListResponse {
    pub pairs: Vec<PairBody>,
    pub total: i64,
}

/// GET /api/admin/pairs - List whitelisted pairs, filtered and paginated
#[utoipa::path(
    get,
    path = "/api/admin/pairs",
    tag = "admin",
    params(
        ("keyword" = Option<String>, Query, description = "Substring filter on either column"),
        ("page" = Option<u32>, Query, description = "1-based page number"),
        ("page_size" = Option<u32>, Query, description = "Rows per page")
    ),
    responses(
        (status = 200, description = "Matching whitelist entries", body = PairListResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody)
    )
)]
pub async fn list_pairs_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PairListQuery>,
) -> Result<Json<PairListResponse>, Rejection> {
    let page = query.page.max(1);
    let page_size = query.page_size.clamp(1, 100);

    let (entries, total) = state
        .directory
        .list_pairs(query.keyword.trim(), page, page_size)
        .await
        .map_err(|e| {
            error!("Whitelist listing failed: {:?}", e);
            reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "Failed to list whitelist entries",
            )
        })?;

    Ok(Json(PairListResponse {
        pairs: entries
            .into_iter()
            .map(|e| PairBody {
                id: e.id,
                hospital_name: e.hospital_name,
                product_batch: e.product_batch,
                created_at: e.created_at.to_rfc3339(),
            })
            .collect(),
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::testutil::{app_state, InMemoryDirectory, StubBackend};

    #[tokio::test]
    async fn status_reports_the_package_version() {
        let response = status_handler().await;
        assert_eq!(response.0.status, "running");
        assert_eq!(response.0.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn listing_filters_by_keyword() {
        let mut directory = InMemoryDirectory::with_pair("City Hospital", "BATCH001X");
        directory
            .pairs
            .push(("County Clinic".to_string(), "BATCH002Y".to_string()));
        let state = app_state(
            directory,
            StubBackend {
                answer: String::new(),
            },
        );

        let response = list_pairs_handler(
            State(state),
            Query(PairListQuery {
                keyword: "Clinic".to_string(),
                page: 1,
                page_size: 20,
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.0.total, 1);
        assert_eq!(response.0.pairs[0].hospital_name, "County Clinic");
    }
}
