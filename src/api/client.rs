use std::time::Duration;

use log::{debug, warn};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use super::types::{
    ConversationTurn, CreateSessionRequest, GenerateWhitepaperResponse, HistoryResponse,
    MessageRequest, Session, SessionList, WhitepaperData, DEFAULT_SESSION_NAME,
};
use crate::config::MindForgeConfig;
use crate::utils::errors::MindForgeError;

/// HTTP client for the session/whitepaper/brainstorm API.
///
/// Cheap to clone; the inner `reqwest::Client` is reference-counted. Streams
/// have no overall request timeout — the brainstorm endpoint stays open for
/// as long as the model produces output.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &MindForgeConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.api.connect_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: config.api.base_url.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// POST /sessions. Omitted names fall back to the server's placeholder.
    pub async fn create_session(&self, name: Option<&str>) -> Result<Session, MindForgeError> {
        let body = CreateSessionRequest {
            name: name.unwrap_or(DEFAULT_SESSION_NAME).to_string(),
        };
        let response = self
            .http
            .post(self.url("/sessions"))
            .json(&body)
            .send()
            .await?;
        Self::expect_json(response).await
    }

    /// GET /sessions
    pub async fn list_sessions(&self) -> Result<Vec<Session>, MindForgeError> {
        let response = self.http.get(self.url("/sessions")).send().await?;
        let list: SessionList = Self::expect_json(response).await?;
        Ok(list.sessions)
    }

    /// GET /sessions/{id}
    pub async fn get_session(&self, session_id: &str) -> Result<Session, MindForgeError> {
        let response = self
            .http
            .get(self.url(&format!("/sessions/{session_id}")))
            .send()
            .await?;
        Self::expect_json(response).await
    }

    /// PATCH /sessions/{id}, returns the updated session.
    pub async fn rename_session(
        &self,
        session_id: &str,
        name: &str,
    ) -> Result<Session, MindForgeError> {
        let body = CreateSessionRequest {
            name: name.to_string(),
        };
        let response = self
            .http
            .patch(self.url(&format!("/sessions/{session_id}")))
            .json(&body)
            .send()
            .await?;
        Self::expect_json(response).await
    }

    /// DELETE /sessions/{id}
    pub async fn delete_session(&self, session_id: &str) -> Result<(), MindForgeError> {
        let response = self
            .http
            .delete(self.url(&format!("/sessions/{session_id}")))
            .send()
            .await?;
        Self::expect_ok(response).await
    }

    /// GET /whitepaper/{session_id}. A session without a whitepaper yet is a
    /// 404 here; the controller treats that as empty state.
    pub async fn get_whitepaper(&self, session_id: &str) -> Result<WhitepaperData, MindForgeError> {
        let response = self
            .http
            .get(self.url(&format!("/whitepaper/{session_id}")))
            .send()
            .await?;
        Self::expect_json(response).await
    }

    /// POST /whitepaper/{session_id}/generate, returns the final markdown.
    pub async fn generate_whitepaper(&self, session_id: &str) -> Result<String, MindForgeError> {
        let response = self
            .http
            .post(self.url(&format!("/whitepaper/{session_id}/generate")))
            .send()
            .await?;
        let generated: GenerateWhitepaperResponse = Self::expect_json(response).await?;
        Ok(generated.whitepaper_markdown)
    }

    /// GET /brainstorm/{session_id}/history
    pub async fn get_history(
        &self,
        session_id: &str,
    ) -> Result<Vec<ConversationTurn>, MindForgeError> {
        let response = self
            .http
            .get(self.url(&format!("/brainstorm/{session_id}/history")))
            .send()
            .await?;
        let history: HistoryResponse = Self::expect_json(response).await?;
        Ok(history.turns)
    }

    /// POST /brainstorm/{session_id}/message. Returns the raw streaming
    /// response for the event decoder; a non-2xx status fails here, before
    /// any event is emitted.
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        is_voice: bool,
        raw_transcript: Option<&str>,
    ) -> Result<Response, MindForgeError> {
        let body = MessageRequest {
            text: text.to_string(),
            is_voice,
            raw_transcript: raw_transcript.map(str::to_string),
        };
        debug!("sending message to session {session_id} (voice: {is_voice})");
        let response = self
            .http
            .post(self.url(&format!("/brainstorm/{session_id}/message")))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            warn!("message endpoint returned {status}");
            return Err(Self::status_error(status, response).await);
        }
        Ok(response)
    }

    async fn expect_ok(response: Response) -> Result<(), MindForgeError> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status, response).await);
        }
        Ok(())
    }

    async fn expect_json<T: DeserializeOwned>(response: Response) -> Result<T, MindForgeError> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(status, response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|err| MindForgeError::ParseError(err.to_string()))
    }

    async fn status_error(status: StatusCode, response: Response) -> MindForgeError {
        let message = response.text().await.unwrap_or_default();
        MindForgeError::ApiError {
            status: status.as_u16(),
            message,
        }
    }
}
