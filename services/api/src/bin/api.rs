//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{coze::CozeAdapter, db::DirectoryAdapter},
    config::Config,
    error::ApiError,
    web::{
        auth::{
            admin_login_handler, admin_logout_handler, login_handler, logout_handler, me_handler,
            refresh_handler,
        },
        chat::send_handler,
        middleware::{require_admin, require_auth},
        rest::{list_pairs_handler, status_handler, ApiDoc},
        state::AppState,
    },
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use chrono::Duration;
use hospital_chat_core::{
    dedup::RequestDeduplicator, gateway::ChatGateway, session::SessionCodec, tokens::TokenService,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;
    let directory = Arc::new(DirectoryAdapter::new(db_pool));
    info!("Running database migrations...");
    directory.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Chat Backend ---
    let http_client = reqwest::Client::builder()
        .timeout(StdDuration::from_secs(10))
        .build()
        .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;
    let backend = Arc::new(CozeAdapter::new(
        http_client,
        config.coze_base_url.clone(),
        config.coze_api_key.clone(),
        config.coze_bot_id.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        directory,
        tokens: TokenService::new(
            config.jwt_access_secret.as_bytes(),
            config.jwt_refresh_secret.as_bytes(),
            Duration::seconds(config.access_token_ttl_secs),
            Duration::seconds(config.refresh_token_ttl_secs),
        ),
        sessions: SessionCodec::new(
            config.session_secret.as_bytes(),
            Duration::seconds(config.session_ttl_secs),
        ),
        chat: ChatGateway::new(backend),
        dedup: RequestDeduplicator::new(StdDuration::from_secs(1)),
        config: config.clone(),
    });

    let frontend_origin = config
        .frontend_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid FRONTEND_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/refresh", post(refresh_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/auth/admin/login", post(admin_login_handler))
        .route("/api/auth/admin/logout", post(admin_logout_handler));

    // Routes for authenticated users (token or session)
    let user_routes = Router::new()
        .route("/api/auth/me", get(me_handler))
        .route("/api/chat/send", post(send_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Routes for admins only
    let admin_routes = Router::new()
        .route("/api/admin/pairs", get(list_pairs_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_admin,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
