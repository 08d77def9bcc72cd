//! crates/hospital_chat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the gateway.
//! These structs are independent of any database or wire format.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// The role a caller was admitted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

/// An admitted caller, produced by the auth gate and consumed by handlers.
#[derive(Debug, Clone)]
pub struct Identity {
    pub subject_id: String,
    pub hospital_name: String,
    pub product_batch: String,
    pub role: Role,
}

/// One (hospital, batch) pair from the login whitelist.
/// The (hospital_name, product_batch) combination is unique.
#[derive(Debug, Clone)]
pub struct WhitelistEntry {
    pub id: i64,
    pub hospital_name: String,
    pub product_batch: String,
    pub created_at: DateTime<Utc>,
}

// Only used internally for admin login - contains sensitive data
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

/// One in-flight message with the external backend: the backend-assigned
/// submission id plus the conversation the exchange accrues under.
#[derive(Debug, Clone)]
pub struct Submission {
    pub chat_id: String,
    pub conversation_id: String,
}

/// The backend-reported processing state of a submission.
/// A submission never regresses from a terminal state back to `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    InProgress,
    Completed,
    Failed,
}

/// One role-tagged entry from the backend's message list.
#[derive(Debug, Clone)]
pub struct BackendMessage {
    pub role: String,
    pub kind: String,
    pub content: String,
}

impl BackendMessage {
    /// Whether this entry is the assistant's actual answer, as opposed to an
    /// intermediate tool-call or reasoning message.
    pub fn is_answer(&self) -> bool {
        self.role == "assistant" && self.kind == "answer"
    }
}

/// The resolved result of one chat turn.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub answer: String,
    pub conversation_id: String,
}

/// Reserved prefix marking admin subjects.
pub const ADMIN_SUBJECT_PREFIX: &str = "admin_";

/// Derives the opaque subject id a (hospital, batch) pair chats under.
///
/// Stable across sessions and never exposes the raw business identifiers.
pub fn derive_subject_id(hospital_name: &str, product_batch: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", hospital_name, product_batch, salt));
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
