//! crates/hospital_chat_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the gateway's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or the
//! vendor chat API.

use async_trait::async_trait;

use crate::domain::{AdminUser, BackendMessage, Submission, SubmissionStatus, WhitelistEntry};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for directory (persistence) operations.
/// This abstracts away the specific errors from the underlying store.
/// Lookup misses are `Ok(None)`, not errors.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// An error from the external conversational backend.
///
/// `Unavailable` is a transport failure (nothing reached the backend, or no
/// usable response came back). `Rejected` means the backend responded but
/// signaled failure or violated the protocol.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Backend unreachable: {0}")]
    Unavailable(String),
    #[error("Backend rejected the request: {0}")]
    Rejected(String),
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The login whitelist and admin user directory.
///
/// Consulted by the login handlers; the CRUD surface managing it lives outside
/// this service.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Looks up a whitelist entry by its exact (hospital, batch) pair.
    /// Inputs are matched trimmed.
    async fn find_pair(
        &self,
        hospital_name: &str,
        product_batch: &str,
    ) -> PortResult<Option<WhitelistEntry>>;

    /// Looks up an admin account by username.
    async fn find_admin(&self, username: &str) -> PortResult<Option<AdminUser>>;

    /// Lists whitelist entries for the admin console, newest first, with an
    /// optional keyword filter over both columns. Returns the page plus the
    /// total match count.
    async fn list_pairs(
        &self,
        keyword: &str,
        page: u32,
        page_size: u32,
    ) -> PortResult<(Vec<WhitelistEntry>, i64)>;
}

/// The asynchronous submit/poll protocol of the external chat backend.
///
/// `submit` hands one user message to the backend; `status` and `messages`
/// observe (never drive) the submission's progression.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Forwards one message. When `conversation_id` is `None` the backend
    /// mints a new conversation and reports it in the returned submission.
    async fn submit(
        &self,
        user_id: &str,
        conversation_id: Option<&str>,
        text: &str,
    ) -> Result<Submission, BackendError>;

    /// Queries the processing state of a submission.
    async fn status(&self, submission: &Submission) -> Result<SubmissionStatus, BackendError>;

    /// Fetches the ordered, role-tagged message list for a submission.
    async fn messages(&self, submission: &Submission)
        -> Result<Vec<BackendMessage>, BackendError>;
}
