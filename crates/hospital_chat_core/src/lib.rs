pub mod backoff;
pub mod dedup;
pub mod domain;
pub mod gateway;
pub mod ports;
pub mod session;
pub mod tokens;

pub use backoff::BackoffPolicy;
pub use dedup::{DedupError, InflightGuard, RequestDeduplicator};
pub use domain::{
    derive_subject_id, AdminUser, BackendMessage, ChatReply, Identity, Role, Submission,
    SubmissionStatus, WhitelistEntry, ADMIN_SUBJECT_PREFIX,
};
pub use gateway::{ChatGateway, GatewayError, GatewayTuning};
pub use ports::{BackendError, ChatBackend, DirectoryService, PortError, PortResult};
pub use session::{AdminSession, SessionCodec, SessionData, SessionUser};
pub use tokens::{Claims, TokenError, TokenKind, TokenPair, TokenService};
