//! services/api/src/adapters/coze.rs
//!
//! This module contains the adapter for the Coze V3 chat API. It implements
//! the `ChatBackend` port from the `core` crate: one POST to submit a
//! message, then GET endpoints the gateway polls for status and messages.
//!
//! Every response arrives in an envelope `{code, msg, data}`; `code != 0`
//! means the backend accepted the connection but rejected the request.

use async_trait::async_trait;
use hospital_chat_core::domain::{BackendMessage, Submission, SubmissionStatus};
use hospital_chat_core::ports::{BackendError, ChatBackend};
use serde::Deserialize;
use serde_json::json;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatBackend` against the Coze V3 API.
#[derive(Clone)]
pub struct CozeAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    bot_id: String,
}

impl CozeAdapter {
    /// Creates a new `CozeAdapter`. The client should carry a transport-level
    /// timeout; each poll call is bounded by it.
    pub fn new(client: reqwest::Client, base_url: String, api_key: String, bot_id: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            bot_id,
        }
    }

    async fn get_envelope<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        submission: &Submission,
    ) -> Result<T, BackendError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(&[
                ("chat_id", submission.chat_id.as_str()),
                ("conversation_id", submission.conversation_id.as_str()),
            ])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        decode_envelope(response).await
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default = "Option::default")]
    data: Option<T>,
}

#[derive(Deserialize)]
struct ChatData {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Deserialize)]
struct StatusData {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct MessageData {
    #[serde(default)]
    role: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: String,
}

async fn decode_envelope<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::Rejected(format!(
            "backend returned HTTP {}",
            status
        )));
    }
    let envelope: Envelope<T> = response
        .json()
        .await
        .map_err(|e| BackendError::Rejected(format!("malformed backend response: {}", e)))?;
    if envelope.code != 0 {
        return Err(BackendError::Rejected(format!(
            "backend error {}: {}",
            envelope.code,
            envelope.msg.unwrap_or_else(|| "unknown".to_string())
        )));
    }
    envelope
        .data
        .ok_or_else(|| BackendError::Rejected("backend response missing data".to_string()))
}

//=========================================================================================
// `ChatBackend` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatBackend for CozeAdapter {
    async fn submit(
        &self,
        user_id: &str,
        conversation_id: Option<&str>,
        text: &str,
    ) -> Result<Submission, BackendError> {
        let mut request = self.client.post(format!("{}/v3/chat", self.base_url));
        if let Some(conversation_id) = conversation_id {
            request = request.query(&[("conversation_id", conversation_id)]);
        }

        let response = request
            .bearer_auth(&self.api_key)
            .json(&json!({
                "bot_id": self.bot_id,
                "user_id": user_id,
                "stream": false,
                "auto_save_history": true,
                "additional_messages": [{
                    "role": "user",
                    "content": text,
                    "content_type": "text",
                }],
            }))
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let data: ChatData = decode_envelope(response).await?;
        let chat_id = data
            .id
            .ok_or_else(|| BackendError::Rejected("backend response missing chat id".to_string()))?;
        let conversation_id = data
            .conversation_id
            .or_else(|| conversation_id.map(str::to_string))
            .ok_or_else(|| {
                BackendError::Rejected("backend response missing conversation id".to_string())
            })?;

        Ok(Submission {
            chat_id,
            conversation_id,
        })
    }

    async fn status(&self, submission: &Submission) -> Result<SubmissionStatus, BackendError> {
        let data: StatusData = self.get_envelope("/v3/chat/retrieve", submission).await?;
        Ok(match data.status.as_deref() {
            Some("completed") => SubmissionStatus::Completed,
            Some("failed") => SubmissionStatus::Failed,
            // created / in_progress / anything new the backend grows.
            _ => SubmissionStatus::InProgress,
        })
    }

    async fn messages(
        &self,
        submission: &Submission,
    ) -> Result<Vec<BackendMessage>, BackendError> {
        let data: Vec<MessageData> = self
            .get_envelope("/v3/chat/message/list", submission)
            .await?;
        Ok(data
            .into_iter()
            .map(|m| BackendMessage {
                role: m.role,
                kind: m.kind,
                content: m.content,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> CozeAdapter {
        CozeAdapter::new(
            reqwest::Client::new(),
            server.uri(),
            "test-key".to_string(),
            "bot-1".to_string(),
        )
    }

    #[tokio::test]
    async fn submit_captures_chat_and_conversation_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {"id": "chat-7", "conversation_id": "conv-9", "status": "in_progress"}
            })))
            .mount(&server)
            .await;

        let submission = adapter(&server)
            .submit("user-42", None, "hello")
            .await
            .unwrap();
        assert_eq!(submission.chat_id, "chat-7");
        assert_eq!(submission.conversation_id, "conv-9");
    }

    #[tokio::test]
    async fn submit_forwards_an_existing_conversation_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/chat"))
            .and(query_param("conversation_id", "conv-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {"id": "chat-8", "conversation_id": "conv-9"}
            })))
            .mount(&server)
            .await;

        let submission = adapter(&server)
            .submit("user-42", Some("conv-9"), "again")
            .await
            .unwrap();
        assert_eq!(submission.conversation_id, "conv-9");
    }

    #[tokio::test]
    async fn nonzero_envelope_code_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 4000,
                "msg": "bot not published"
            })))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .submit("user-42", None, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
    }

    #[tokio::test]
    async fn missing_chat_id_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {"conversation_id": "conv-9"}
            })))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .submit("user-42", None, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
    }

    #[tokio::test]
    async fn status_maps_the_backend_states() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/chat/retrieve"))
            .and(query_param("chat_id", "chat-7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {"status": "completed"}
            })))
            .mount(&server)
            .await;

        let submission = Submission {
            chat_id: "chat-7".to_string(),
            conversation_id: "conv-9".to_string(),
        };
        let status = adapter(&server).status(&submission).await.unwrap();
        assert_eq!(status, SubmissionStatus::Completed);
    }

    #[tokio::test]
    async fn unknown_status_reads_as_in_progress() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/chat/retrieve"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": {"status": "created"}
            })))
            .mount(&server)
            .await;

        let submission = Submission {
            chat_id: "chat-7".to_string(),
            conversation_id: "conv-9".to_string(),
        };
        let status = adapter(&server).status(&submission).await.unwrap();
        assert_eq!(status, SubmissionStatus::InProgress);
    }

    #[tokio::test]
    async fn message_list_maps_role_and_kind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/chat/message/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "data": [
                    {"role": "assistant", "type": "verbose", "content": "{}"},
                    {"role": "assistant", "type": "answer", "content": "hi there"}
                ]
            })))
            .mount(&server)
            .await;

        let submission = Submission {
            chat_id: "chat-7".to_string(),
            conversation_id: "conv-9".to_string(),
        };
        let messages = adapter(&server).messages(&submission).await.unwrap();
        assert_eq!(messages.len(), 2);
        let answer = messages.iter().find(|m| m.is_answer()).unwrap();
        assert_eq!(answer.content, "hi there");
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable() {
        // TEST-NET-1 address, guaranteed non-routable; the tight timeout
        // turns the connect attempt into a transport error.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(250))
            .build()
            .unwrap();
        let adapter = CozeAdapter::new(
            client,
            "http://192.0.2.1:9".to_string(),
            "test-key".to_string(),
            "bot-1".to_string(),
        );
        let err = adapter.submit("user-42", None, "hello").await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
    }

    #[tokio::test]
    async fn http_error_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/chat"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .submit("user-42", None, "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
    }
}
