//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use hospital_chat_core::dedup::RequestDeduplicator;
use hospital_chat_core::gateway::ChatGateway;
use hospital_chat_core::ports::DirectoryService;
use hospital_chat_core::session::SessionCodec;
use hospital_chat_core::tokens::TokenService;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers behind an `Arc`.
///
/// Everything mutable in here (the deduplicator's maps) is concurrency-safe
/// internally; handlers never lock anything across an await point.
pub struct AppState {
    pub directory: Arc<dyn DirectoryService>,
    pub tokens: TokenService,
    pub sessions: SessionCodec,
    pub chat: ChatGateway,
    pub dedup: RequestDeduplicator,
    pub config: Arc<Config>,
}
