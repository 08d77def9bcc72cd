//! services/api/src/web/testutil.rs
//!
//! In-memory port implementations and state construction for handler tests.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use hospital_chat_core::dedup::RequestDeduplicator;
use hospital_chat_core::domain::{
    AdminUser, BackendMessage, Submission, SubmissionStatus, WhitelistEntry,
};
use hospital_chat_core::gateway::ChatGateway;
use hospital_chat_core::ports::{
    BackendError, ChatBackend, DirectoryService, PortResult,
};
use hospital_chat_core::session::SessionCodec;
use hospital_chat_core::tokens::TokenService;

use crate::config::Config;
use crate::web::state::AppState;

/// A whitelist and admin directory held in memory.
pub struct InMemoryDirectory {
    pub pairs: Vec<(String, String)>,
    pub admins: Vec<AdminUser>,
}

impl InMemoryDirectory {
    pub fn with_pair(hospital_name: &str, product_batch: &str) -> Self {
        Self {
            pairs: vec![(hospital_name.to_string(), product_batch.to_string())],
            admins: Vec::new(),
        }
    }
}

#[async_trait]
impl DirectoryService for InMemoryDirectory {
    async fn find_pair(
        &self,
        hospital_name: &str,
        product_batch: &str,
    ) -> PortResult<Option<WhitelistEntry>> {
        let found = self
            .pairs
            .iter()
            .position(|(h, b)| h == hospital_name.trim() && b == product_batch.trim());
        Ok(found.map(|i| WhitelistEntry {
            id: i as i64 + 1,
            hospital_name: hospital_name.to_string(),
            product_batch: product_batch.to_string(),
            created_at: Utc::now(),
        }))
    }

    async fn find_admin(&self, username: &str) -> PortResult<Option<AdminUser>> {
        Ok(self.admins.iter().find(|a| a.username == username).cloned())
    }

    async fn list_pairs(
        &self,
        keyword: &str,
        _page: u32,
        _page_size: u32,
    ) -> PortResult<(Vec<WhitelistEntry>, i64)> {
        let pairs: Vec<WhitelistEntry> = self
            .pairs
            .iter()
            .enumerate()
            .filter(|(_, (h, b))| h.contains(keyword) || b.contains(keyword))
            .map(|(i, (h, b))| WhitelistEntry {
                id: i as i64 + 1,
                hospital_name: h.clone(),
                product_batch: b.clone(),
                created_at: Utc::now(),
            })
            .collect();
        let total = pairs.len() as i64;
        Ok((pairs, total))
    }
}

/// A backend that completes on the first status poll with a fixed answer.
pub struct StubBackend {
    pub answer: String,
}

#[async_trait]
impl ChatBackend for StubBackend {
    async fn submit(
        &self,
        _user_id: &str,
        conversation_id: Option<&str>,
        _text: &str,
    ) -> Result<Submission, BackendError> {
        Ok(Submission {
            chat_id: "chat-stub".to_string(),
            conversation_id: conversation_id.unwrap_or("conv-stub").to_string(),
        })
    }

    async fn status(&self, _: &Submission) -> Result<SubmissionStatus, BackendError> {
        Ok(SubmissionStatus::Completed)
    }

    async fn messages(&self, _: &Submission) -> Result<Vec<BackendMessage>, BackendError> {
        Ok(vec![BackendMessage {
            role: "assistant".to_string(),
            kind: "answer".to_string(),
            content: self.answer.clone(),
        }])
    }
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "sqlite::memory:".to_string(),
        log_level: tracing::Level::INFO,
        frontend_origin: "http://localhost:5173".to_string(),
        jwt_access_secret: "access-secret-for-tests".to_string(),
        jwt_refresh_secret: "refresh-secret-for-tests".to_string(),
        session_secret: "session-secret-for-tests".to_string(),
        access_token_ttl_secs: 15 * 60,
        refresh_token_ttl_secs: 7 * 24 * 60 * 60,
        session_ttl_secs: 24 * 60 * 60,
        user_id_salt: "salt-for-tests".to_string(),
        coze_api_key: "test-key".to_string(),
        coze_bot_id: "bot-1".to_string(),
        coze_base_url: "http://localhost:0".to_string(),
    }
}

pub fn app_state(directory: InMemoryDirectory, backend: StubBackend) -> Arc<AppState> {
    let config = Arc::new(test_config());
    Arc::new(AppState {
        directory: Arc::new(directory),
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
        chat: ChatGateway::new(Arc::new(backend)),
        dedup: RequestDeduplicator::new(StdDuration::from_secs(1)),
        config,
    })
}
