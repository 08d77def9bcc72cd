//! crates/hospital_chat_core/src/session.rs
//!
//! The cookie-carried session blob: a server-signed JSON payload with no
//! server-side persistence beyond the cookie itself.
//!
//! Sessions are the fallback identity carrier for browsers that logged in
//! before the token pair existed; once a credential pair is issued they are a
//! convenience, not the source of truth. Any decode failure reads as "absent",
//! never as an error.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The user half of a session: set by user login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionUser {
    pub hospital_name: String,
    pub product_batch: String,
    pub user_id: String,
    /// Correlation id of the backend conversation, once the first chat turn
    /// has established one.
    pub conversation_id: Option<String>,
}

/// The admin half of a session: set by admin login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminSession {
    pub username: String,
    pub user_id: String,
}

/// Everything the signed cookie carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionData {
    #[serde(default)]
    pub user: Option<SessionUser>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub admin_user: Option<AdminSession>,
    /// Absolute expiry, seconds since the epoch. Stamped by `seal`.
    #[serde(default)]
    pub expires_at: i64,
}

/// Seals and opens the signed session cookie value.
///
/// The cookie value is `base64url(payload) "." base64url(hmac-sha256(payload))`.
#[derive(Clone)]
pub struct SessionCodec {
    key: Vec<u8>,
    ttl: Duration,
}

impl SessionCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            key: secret.to_vec(),
            ttl,
        }
    }

    /// The session lifetime, independent of the token TTLs.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Signs the session state into a cookie value, stamping the absolute
    /// expiry.
    pub fn seal(&self, mut data: SessionData) -> String {
        data.expires_at = (Utc::now() + self.ttl).timestamp();
        // SessionData always serializes; its fields are plain data.
        let payload = serde_json::to_vec(&data).unwrap_or_default();
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(&payload);
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
        )
    }

    /// Opens a cookie value. Missing, malformed, mis-signed, or expired
    /// values all read as `None`; session absence is a normal state.
    pub fn open(&self, value: &str) -> Option<SessionData> {
        let (payload_b64, sig_b64) = value.split_once('.')?;
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let sig = URL_SAFE_NO_PAD.decode(sig_b64).ok()?;

        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(&payload);
        mac.verify_slice(&sig).ok()?;

        let data: SessionData = serde_json::from_slice(&payload).ok()?;
        if data.expires_at <= Utc::now().timestamp() {
            return None;
        }
        Some(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> SessionCodec {
        SessionCodec::new(b"session-secret-for-tests", Duration::hours(24))
    }

    fn user_session() -> SessionData {
        SessionData {
            user: Some(SessionUser {
                hospital_name: "City Hospital".to_string(),
                product_batch: "BATCH001X".to_string(),
                user_id: "user-42".to_string(),
                conversation_id: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn seal_then_open_round_trips() {
        let codec = codec();
        let sealed = codec.seal(user_session());
        let opened = codec.open(&sealed).unwrap();
        assert_eq!(opened.user.unwrap().hospital_name, "City Hospital");
        assert!(!opened.is_admin);
    }

    #[test]
    fn tampered_payload_reads_as_absent() {
        let codec = codec();
        let sealed = codec.seal(user_session());
        let (payload, sig) = sealed.split_once('.').unwrap();
        let mut forged = payload.to_string();
        forged.replace_range(0..1, if payload.starts_with('A') { "B" } else { "A" });
        assert!(codec.open(&format!("{}.{}", forged, sig)).is_none());
    }

    #[test]
    fn wrong_key_reads_as_absent() {
        let sealed = codec().seal(user_session());
        let other = SessionCodec::new(b"a-different-session-secret", Duration::hours(24));
        assert!(other.open(&sealed).is_none());
    }

    #[test]
    fn expired_session_reads_as_absent() {
        // Negative TTL stamps an expiry already in the past.
        let codec = SessionCodec::new(b"session-secret-for-tests", Duration::hours(-1));
        let sealed = codec.seal(user_session());
        assert!(codec.open(&sealed).is_none());
    }

    #[test]
    fn garbage_reads_as_absent() {
        let codec = codec();
        assert!(codec.open("").is_none());
        assert!(codec.open("not-a-session").is_none());
        assert!(codec.open("a.b.c").is_none());
    }

    #[test]
    fn admin_flag_survives_the_round_trip() {
        let codec = codec();
        let sealed = codec.seal(SessionData {
            is_admin: true,
            admin_user: Some(AdminSession {
                username: "root".to_string(),
                user_id: "admin_root".to_string(),
            }),
            ..Default::default()
        });
        let opened = codec.open(&sealed).unwrap();
        assert!(opened.is_admin);
        assert_eq!(opened.admin_user.unwrap().username, "root");
    }
}
